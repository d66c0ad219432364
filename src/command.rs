//! ESC/POS command encoding.
//!
//! Every function here is pure and returns the complete byte sequence for one
//! instruction. Nothing is written to the device from this module; see
//! [`crate::Printer`] for that.

use bitflags::bitflags;

/// ESC, prefix of most commands.
pub const ESC: u8 = 0x1B;
/// GS, prefix of the extended command group.
pub const GS: u8 = 0x1D;

/// Horizontal text and bitmap alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Alignment {
    #[default]
    Left = 0,
    Center = 1,
    Right = 2,
}

/// Device-side scaling applied to a raster bitmap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BitmapMode {
    #[default]
    Normal = 0,
    Wide = 1,
    Tall = 2,
    Huge = 3,
}

bitflags! {
    /// Print mode bits sent with `ESC !`.
    ///
    /// The empty set selects the 12x24 font with no decoration.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct PrintStyle: u8 {
        /// Alternate 9x17 font.
        const FONT_9X17 = 0x01;
        const BOLD = 0x08;
        const DOUBLE_HEIGHT = 0x10;
        const DOUBLE_WIDTH = 0x20;
        const UNDERLINE = 0x80;
    }
}

/// `ESC @`
pub fn reset() -> Vec<u8> {
    vec![ESC, 0x40]
}

/// `GS ! n`, character size multipliers in the range 0..=15.
pub fn set_text_scale(horizontal: u8, vertical: u8) -> Vec<u8> {
    let scale = (vertical & 0x0F) | ((horizontal & 0x0F) << 4);
    vec![GS, 0x21, scale]
}

/// `ESC ! n`
pub fn set_print_style(style: PrintStyle) -> Vec<u8> {
    vec![ESC, 0x21, style.bits()]
}

/// `ESC J n`, feed paper by `dots`.
pub fn feed_dots(dots: u8) -> Vec<u8> {
    vec![ESC, 0x4A, dots]
}

/// `ESC d n`, feed paper by `lines` text lines.
pub fn feed_lines(lines: u8) -> Vec<u8> {
    vec![ESC, 0x64, lines]
}

/// `ESC $ nL nH`, absolute print position in dots from the left margin.
pub fn set_horizontal_position(position: u16) -> Vec<u8> {
    let [low, high] = position.to_le_bytes();
    vec![ESC, 0x24, low, high]
}

/// `ESC a n`
pub fn set_alignment(alignment: Alignment) -> Vec<u8> {
    vec![ESC, 0x61, alignment as u8]
}

/// `ESC - n`. Thicknesses above 2 are clamped to 2.
pub fn set_underline(thickness: u8) -> Vec<u8> {
    vec![ESC, 0x2D, thickness.min(2)]
}

/// `GS v 0 m xL xH yL yH`, header of a raster bitmap.
///
/// `width` is in dots and is sent as a byte count (`width / 8`); `height` is
/// in rows. The header must be followed by exactly `width / 8 * height`
/// bytes of bitmap data.
pub fn bitmap_header(mode: BitmapMode, width: u16, height: u16) -> Vec<u8> {
    let [width_low, width_high] = (width / 8).to_le_bytes();
    let [height_low, height_high] = height.to_le_bytes();
    vec![
        GS,
        0x76,
        0x30,
        mode as u8,
        width_low,
        width_high,
        height_low,
        height_high,
    ]
}

/// Raw text, byte for byte. ESC and GS are not escaped.
pub fn text(s: &str) -> Vec<u8> {
    s.as_bytes().to_vec()
}
