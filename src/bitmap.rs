use crate::{error::Error, PRINTER_WIDTH};

/// Packed 1-bit-per-pixel image ready to be sent to the printer.
///
/// Rows are stored top to bottom, `width / 8` bytes each. Bit 7 of a byte is
/// the leftmost pixel of that byte. A set bit prints a dot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Bitmap {
    /// Blank bitmap. `width` must be a non-zero multiple of 8 no wider than
    /// the head.
    pub fn new(width: u32, height: u32) -> Result<Self, Error> {
        check_width(width)?;
        Ok(Self::blank(width, height))
    }

    pub(crate) fn blank(width: u32, height: u32) -> Self {
        Bitmap {
            width,
            height,
            data: vec![0x00; (width / 8 * height) as usize],
        }
    }

    /// Wrap already packed bytes, checking they match the dimensions.
    pub fn from_bytes(width: u32, height: u32, data: Vec<u8>) -> Result<Self, Error> {
        check_width(width)?;
        let expected = (width / 8) as usize * height as usize;
        if data.len() != expected {
            return Err(Error::InvalidBitmap(format!(
                "{}x{} needs {} bytes, got {}",
                width,
                height,
                expected,
                data.len()
            )));
        }
        Ok(Bitmap {
            width,
            height,
            data,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn bytes_per_row(&self) -> usize {
        (self.width / 8) as usize
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    pub fn get(&self, x: u32, y: u32) -> bool {
        let byte = self.data[y as usize * self.bytes_per_row() + (x / 8) as usize];
        byte & (0x80 >> (x % 8)) != 0
    }

    pub fn set(&mut self, x: u32, y: u32) {
        let index = y as usize * self.bytes_per_row() + (x / 8) as usize;
        self.data[index] |= 0x80 >> (x % 8);
    }

    /// Bytes of rows `start..start + count`, clipped to the bitmap.
    pub fn rows(&self, start: u32, count: u32) -> &[u8] {
        let start = start.min(self.height) as usize;
        let end = (start + count as usize).min(self.height as usize);
        let bpr = self.bytes_per_row();
        &self.data[start * bpr..end * bpr]
    }

    /// Split the bitmap into consecutive groups of at most `lines` rows.
    ///
    /// A `lines` value of zero is treated as one.
    pub fn batches(&self, lines: u32) -> Batches<'_> {
        Batches {
            bitmap: self,
            lines: lines.max(1),
            next: 0,
        }
    }
}

fn check_width(width: u32) -> Result<(), Error> {
    if width == 0 || width % 8 != 0 {
        return Err(Error::InvalidBitmap(format!(
            "width {} is not a multiple of 8",
            width
        )));
    }
    if width > PRINTER_WIDTH {
        return Err(Error::InvalidBitmap(format!(
            "width {} exceeds {} dots",
            width, PRINTER_WIDTH
        )));
    }
    Ok(())
}

/// A group of rows sent to the printer as one transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Batch<'a> {
    pub first_row: u32,
    pub rows: u32,
    pub data: &'a [u8],
}

pub struct Batches<'a> {
    bitmap: &'a Bitmap,
    lines: u32,
    next: u32,
}

impl<'a> Iterator for Batches<'a> {
    type Item = Batch<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.bitmap.height {
            return None;
        }
        let rows = self.lines.min(self.bitmap.height - self.next);
        let batch = Batch {
            first_row: self.next,
            rows,
            data: self.bitmap.rows(self.next, rows),
        };
        self.next += rows;
        Some(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn length_matches_dimensions() {
        for (w, h) in [(8, 1), (16, 3), (384, 50), (376, 0)] {
            let bitmap = Bitmap::new(w, h).unwrap();
            assert_eq!(bitmap.as_bytes().len(), (w / 8 * h) as usize);
        }
    }

    #[test]
    fn rejects_width_not_multiple_of_eight() {
        assert!(matches!(Bitmap::new(12, 4), Err(Error::InvalidBitmap(_))));
        assert!(matches!(Bitmap::new(0, 4), Err(Error::InvalidBitmap(_))));
        assert!(matches!(
            Bitmap::from_bytes(16, 2, vec![0; 3]),
            Err(Error::InvalidBitmap(_))
        ));
    }

    #[test]
    fn rejects_width_wider_than_head() {
        assert!(Bitmap::new(384, 1).is_ok());
        assert!(matches!(Bitmap::new(392, 1), Err(Error::InvalidBitmap(_))));
        assert!(matches!(Bitmap::new(800, 1), Err(Error::InvalidBitmap(_))));
        assert!(matches!(
            Bitmap::from_bytes(392, 1, vec![0; 49]),
            Err(Error::InvalidBitmap(_))
        ));
    }

    #[test]
    fn bit_seven_is_leftmost_pixel() {
        let mut bitmap = Bitmap::new(16, 2).unwrap();
        bitmap.set(0, 0);
        bitmap.set(9, 1);
        assert_eq!(bitmap.as_bytes(), &[0x80, 0x00, 0x00, 0x40]);
        assert!(bitmap.get(0, 0));
        assert!(bitmap.get(9, 1));
        assert!(!bitmap.get(1, 0));
    }

    #[test]
    fn batches_cover_every_row_once() {
        let data: Vec<u8> = (0..120u8).collect();
        let bitmap = Bitmap::from_bytes(16, 60, data.clone()).unwrap();

        let batches: Vec<Batch> = bitmap.batches(25).collect();
        assert_eq!(batches.len(), 3);
        assert_eq!(
            batches.iter().map(|b| b.rows).collect::<Vec<_>>(),
            vec![25, 25, 10]
        );
        assert_eq!(batches[1].first_row, 25);
        assert_eq!(batches[1].data, &data[50..100]);

        let joined: Vec<u8> = batches.iter().flat_map(|b| b.data.to_vec()).collect();
        assert_eq!(joined, data);
    }

    #[test]
    fn zero_lines_per_batch_sends_one_row_at_a_time() {
        let bitmap = Bitmap::new(8, 3).unwrap();
        assert_eq!(bitmap.batches(0).count(), 3);
    }

    #[test]
    fn empty_bitmap_has_no_batches() {
        let bitmap = Bitmap::new(8, 0).unwrap();
        assert_eq!(bitmap.batches(50).count(), 0);
    }
}
