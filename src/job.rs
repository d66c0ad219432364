//! Complete print jobs built from the printer primitives.

use log::debug;

use crate::{
    bitmap::Bitmap,
    command::{Alignment, BitmapMode, PrintStyle},
    dither,
    error::Error,
    printer::Printer,
    raster::{GrayscaleBuffer, RasterImage},
    transport::Transport,
};

/// Lines fed after an image so it clears the tear bar.
pub const IMAGE_FEED_LINES: u8 = 5;

/// Scale, convert and dither a decoded image for a head `max_width` dots wide.
pub fn prepare_image(image: &RasterImage, max_width: u32) -> Bitmap {
    let gray = GrayscaleBuffer::from_raster(image, max_width);
    dither::floyd_steinberg(&gray)
}

/// Print a bitmap centered, then feed it out. Returns the bytes sent.
pub fn print_image<T: Transport>(
    printer: &mut Printer<T>,
    bitmap: &Bitmap,
) -> Result<usize, Error> {
    let mut sent = printer.reset()?;
    sent += printer.set_alignment(Alignment::Center)?;
    sent += printer.print_bitmap_lines(BitmapMode::Normal, bitmap)?;
    sent += printer.feed_lines(IMAGE_FEED_LINES)?;
    sent += printer.reset()?;
    debug!("image job sent {} bytes", sent);
    Ok(sent)
}

/// Formatting for a plain text job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextJob {
    pub alignment: Alignment,
    pub style: PrintStyle,
    pub feed_lines: u8,
}

impl Default for TextJob {
    fn default() -> Self {
        TextJob {
            alignment: Alignment::Left,
            style: PrintStyle::empty(),
            feed_lines: 2,
        }
    }
}

impl TextJob {
    /// Print `lines` joined by newlines, followed by two blank lines.
    ///
    /// Lines are raw bytes in the printer's code page and are sent unchanged.
    pub fn print<T, I, S>(&self, printer: &mut Printer<T>, lines: I) -> Result<usize, Error>
    where
        T: Transport,
        I: IntoIterator<Item = S>,
        S: AsRef<[u8]>,
    {
        let mut text = Vec::new();
        for (i, line) in lines.into_iter().enumerate() {
            if i > 0 {
                text.push(b'\n');
            }
            text.extend_from_slice(line.as_ref());
        }

        let mut sent = printer.reset()?;
        sent += printer.set_alignment(self.alignment)?;
        if !self.style.is_empty() {
            sent += printer.set_print_style(self.style)?;
        }
        sent += printer.write_bytes(&text)?;
        sent += printer.write_bytes(b"\n\n")?;
        sent += printer.feed_lines(self.feed_lines)?;
        sent += printer.reset()?;
        debug!("text job sent {} bytes", sent);
        Ok(sent)
    }
}
