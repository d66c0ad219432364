//! EM5820 Thermal Printer Driver
//!
//! This crate drives the EM5820 (and compatible) 58mm thermal receipt
//! printers over USB using their ESC/POS command set. Images are scaled to
//! the 384-dot head, converted to gamma corrected grayscale and dithered with
//! Floyd-Steinberg before being streamed to the printer in small batches.
//!
//! # Example
//!
//! ```rust,no_run
//! use em5820::{job, Config, Printer, RasterImage, PRINTER_WIDTH};
//!
//! let image = RasterImage::open("photo.jpg").unwrap();
//! let bitmap = job::prepare_image(&image, PRINTER_WIDTH);
//!
//! let mut printer = Printer::new(Config::new()).unwrap();
//! job::print_image(&mut printer, &bitmap).unwrap();
//! printer.close().unwrap();
//! ```

mod bitmap;
pub mod command;
pub mod dither;
mod error;
pub mod job;
mod printer;
mod raster;
mod transport;

pub use crate::{
    bitmap::{Batch, Batches, Bitmap},
    command::{Alignment, BitmapMode, PrintStyle},
    error::Error,
    job::TextJob,
    printer::{Config, Printer, PRODUCT_ID, VENDOR_ID},
    raster::{rgb_to_gray, GrayscaleBuffer, RasterImage, ScaledSize},
    transport::{Transport, UsbTransport},
};

/// Width of the print head in dots.
///
/// One row of a full width bitmap is 48 bytes (384 / 8).
pub const PRINTER_WIDTH: u32 = 384;
