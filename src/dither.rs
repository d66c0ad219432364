//! Floyd-Steinberg error diffusion.
//!
//! Pixels are visited in raster order. Each one is quantized against 0.5 and
//! its error pushed to the unvisited neighbours:
//!
//! ```text
//!          *    7/16
//!  3/16  5/16   1/16
//! ```
//!
//! Contributions falling outside the image are dropped.

use log::debug;

use crate::{bitmap::Bitmap, raster::GrayscaleBuffer};

/// Neighbour offsets and weights, in the order they are applied.
pub const WEIGHTS: [(i64, i64, f32); 4] = [
    (1, 0, 7.0 / 16.0),
    (-1, 1, 3.0 / 16.0),
    (0, 1, 5.0 / 16.0),
    (1, 1, 1.0 / 16.0),
];

/// Dither `gray` into a printable bitmap. Dark pixels become dots.
///
/// The bitmap width is `gray.width()` rounded up to a multiple of 8; the
/// padding bits stay blank. `gray` itself is left untouched.
pub fn floyd_steinberg(gray: &GrayscaleBuffer) -> Bitmap {
    let width = gray.width() as i64;
    let height = gray.height() as i64;
    debug!("dithering {}x{}", width, height);

    let mut working = gray.values().to_vec();
    let mut bitmap = Bitmap::blank((gray.width() + 7) / 8 * 8, gray.height());

    for y in 0..height {
        for x in 0..width {
            let old = working[(y * width + x) as usize];
            let new = if old > 0.5 { 1.0 } else { 0.0 };
            if new == 0.0 {
                bitmap.set(x as u32, y as u32);
            }

            let error = old - new;
            if error == 0.0 {
                continue;
            }
            for (dx, dy, weight) in WEIGHTS {
                let (nx, ny) = (x + dx, y + dy);
                if nx >= 0 && nx < width && ny < height {
                    working[(ny * width + nx) as usize] += error * weight;
                }
            }
        }
    }

    bitmap
}
