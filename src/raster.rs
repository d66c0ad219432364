//! Decoded images and their grayscale, printer-sized counterpart.
//!
//! A [`RasterImage`] is what the image decoder hands over: dimensions, a
//! channel count and interleaved 8-bit samples. [`GrayscaleBuffer`] is that
//! image resampled to fit the print head and mapped to luminance in `[0, 1]`,
//! ready for [`crate::dither`].

use image::{DynamicImage, GenericImageView};
use log::debug;
use std::path::Path;

use crate::{error::Error, PRINTER_WIDTH};

/// Decoded image with 1 (gray), 2 (gray + alpha), 3 (RGB) or 4 (RGBA)
/// interleaved 8-bit channels, rows top to bottom.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterImage {
    width: u32,
    height: u32,
    channels: u8,
    data: Vec<u8>,
}

impl RasterImage {
    pub fn new(width: u32, height: u32, channels: u8, data: Vec<u8>) -> Result<Self, Error> {
        if width == 0 || height == 0 {
            return Err(Error::InvalidImage(format!(
                "empty image {}x{}",
                width, height
            )));
        }
        if !(1..=4).contains(&channels) {
            return Err(Error::InvalidImage(format!(
                "unsupported channel count {}",
                channels
            )));
        }
        let expected = width as usize * height as usize * channels as usize;
        if data.len() != expected {
            return Err(Error::InvalidImage(format!(
                "{}x{}x{} needs {} bytes, got {}",
                width,
                height,
                channels,
                expected,
                data.len()
            )));
        }
        Ok(RasterImage {
            width,
            height,
            channels,
            data,
        })
    }

    /// Decode an image file. The format is guessed from the file contents.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let img = image::open(path.as_ref()).map_err(|e| Error::Decode(e.to_string()))?;
        Self::from_dynamic(img)
    }

    /// Decode an in-memory encoded image.
    pub fn from_memory(bytes: &[u8]) -> Result<Self, Error> {
        let img = image::load_from_memory(bytes).map_err(|e| Error::Decode(e.to_string()))?;
        Self::from_dynamic(img)
    }

    /// Keep the channel layout of a decoded image, narrowing samples to 8 bits.
    pub fn from_dynamic(img: DynamicImage) -> Result<Self, Error> {
        let (width, height) = img.dimensions();
        let (channels, data) = match img.color().channel_count() {
            1 => (1, img.into_luma8().into_raw()),
            2 => (2, img.into_luma_alpha8().into_raw()),
            3 => (3, img.into_rgb8().into_raw()),
            _ => (4, img.into_rgba8().into_raw()),
        };
        Self::new(width, height, channels, data)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Luminance of pixel (x, y). Alpha is ignored, never composited.
    pub fn gray_at(&self, x: u32, y: u32) -> f32 {
        let index = (y as usize * self.width as usize + x as usize) * self.channels as usize;
        match self.channels {
            1 | 2 => {
                let l = self.data[index];
                rgb_to_gray(l, l, l)
            }
            _ => rgb_to_gray(
                self.data[index],
                self.data[index + 1],
                self.data[index + 2],
            ),
        }
    }
}

/// Gamma corrected luminance of an RGB pixel, 0.0 for black and 1.0 for white.
pub fn rgb_to_gray(r: u8, g: u8, b: u8) -> f32 {
    let luma = 0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32;
    (luma / 255.0).powf(1.0 / 2.2).clamp(0.0, 1.0)
}

/// Output size of an image fitted to the print head.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaledSize {
    pub width: u32,
    pub height: u32,
    pub scale: f32,
}

impl ScaledSize {
    /// Shrink (never enlarge) `width` x `height` to at most `max_width` dots,
    /// itself capped at the head width.
    ///
    /// The width is rounded down to a multiple of 8, with 8 as the floor.
    /// The height is not given a floor, so a very flat image can end up
    /// with no rows at all.
    pub fn fit(width: u32, height: u32, max_width: u32) -> Self {
        let max_width = max_width.min(PRINTER_WIDTH);
        let scale = if width > max_width {
            max_width as f32 / width as f32
        } else {
            1.0
        };
        // Products are taken in f32 and truncated. Widths such as 592 land a
        // hair under 384 and round down to 376.
        let scaled_width = (width as f32 * scale) as u32 / 8 * 8;
        let scaled_height = (height as f32 * scale) as u32;

        ScaledSize {
            width: if scaled_width == 0 { 8 } else { scaled_width },
            height: scaled_height,
            scale,
        }
    }

    /// Nearest source coordinate for output coordinate `v`, clamped to `len`.
    pub fn source(&self, v: u32, len: u32) -> u32 {
        ((v as f32 / self.scale) as u32).min(len - 1)
    }
}

/// Luminance values in `[0, 1]`, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct GrayscaleBuffer {
    width: u32,
    height: u32,
    values: Vec<f32>,
}

impl GrayscaleBuffer {
    /// `width` must be between 1 and the head width.
    pub fn new(width: u32, height: u32, values: Vec<f32>) -> Result<Self, Error> {
        let expected = width as usize * height as usize;
        if width == 0 || width > PRINTER_WIDTH || values.len() != expected {
            return Err(Error::InvalidImage(format!(
                "{}x{} grayscale buffer with {} values",
                width,
                height,
                values.len()
            )));
        }
        Ok(GrayscaleBuffer {
            width,
            height,
            values,
        })
    }

    /// Resample `image` with nearest neighbour to fit `max_width` and convert
    /// every sampled pixel to luminance.
    pub fn from_raster(image: &RasterImage, max_width: u32) -> Self {
        let size = ScaledSize::fit(image.width, image.height, max_width);
        debug!(
            "scaling {}x{} by {} to {}x{}",
            image.width, image.height, size.scale, size.width, size.height
        );

        let mut values = Vec::with_capacity(size.width as usize * size.height as usize);
        for y in 0..size.height {
            let src_y = size.source(y, image.height);
            for x in 0..size.width {
                let src_x = size.source(x, image.width);
                values.push(image.gray_at(src_x, src_y));
            }
        }

        GrayscaleBuffer {
            width: size.width,
            height: size.height,
            values,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn get(&self, x: u32, y: u32) -> f32 {
        self.values[y as usize * self.width as usize + x as usize]
    }
}
