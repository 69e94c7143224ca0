//! Pixel primitive shared by LED arrays, masks and frames.

use bytemuck::{Pod, Zeroable};

/// One LED color sample
///
/// `a` is only meaningful in mask buffers, where it drives attenuation.
/// The layout is four tightly packed bytes so whole arrays can be
/// zeroed or copied in bulk.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Pod, Zeroable)]
pub struct Pixel {
    /// Red channel
    pub r: u8,
    /// Green channel
    pub g: u8,
    /// Blue channel
    pub b: u8,
    /// Alpha channel (masks only)
    pub a: u8,
}

impl Pixel {
    /// All channels at zero (the cleared mask state)
    pub const BLACK: Pixel = Pixel::new(0, 0, 0, 0);
    /// All channels at full scale
    pub const WHITE: Pixel = Pixel::new(255, 255, 255, 255);

    /// Create a pixel from its channels
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Create an opaque RGB pixel
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::new(r, g, b, 255)
    }

    /// Unpack a 32-bit sample laid out as `r | g << 8 | b << 16 | a << 24`
    pub const fn from_packed(raw: u32) -> Self {
        Self {
            r: raw as u8,
            g: (raw >> 8) as u8,
            b: (raw >> 16) as u8,
            a: (raw >> 24) as u8,
        }
    }

    /// Pack into a 32-bit sample, inverse of [`Pixel::from_packed`]
    pub const fn to_packed(self) -> u32 {
        self.r as u32 | (self.g as u32) << 8 | (self.b as u32) << 16 | (self.a as u32) << 24
    }

    /// True when every channel, alpha included, is zero
    pub const fn is_zero(self) -> bool {
        self.to_packed() == 0
    }

    /// Multiply the color channels by `factor / 255`, leaving alpha untouched
    #[inline]
    pub fn scale(&mut self, factor: u8) {
        self.r = scale_channel(self.r, factor);
        self.g = scale_channel(self.g, factor);
        self.b = scale_channel(self.b, factor);
    }
}

/// Multiply a channel by `factor / 255`, truncating
///
/// Exact integer form of `(value as f32 * (factor as f32 / 255.0)) as u8`;
/// the result never exceeds `value`.
#[inline]
pub fn scale_channel(value: u8, factor: u8) -> u8 {
    ((value as u16 * factor as u16) / 255) as u8
}
