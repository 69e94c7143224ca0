//! Decoded animation assets
//!
//! A [`FrameStore`] is a rectangular grid of packed RGBA samples. The
//! animation engine reads one row per tick; the first `led_count` samples
//! of that row map one-to-one onto the LED array.

use crate::pixel::Pixel;
use crate::{CoreError, Result};

/// Immutable decoded animation asset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameStore {
    width: usize,
    height: usize,
    pixels: Vec<u32>,
}

impl FrameStore {
    /// Build a frame from row-major packed samples (`r | g << 8 | b << 16 | a << 24`)
    pub fn new(width: usize, height: usize, pixels: Vec<u32>) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(CoreError::InvalidFrame(format!(
                "empty frame ({} x {})",
                width, height
            )));
        }

        if pixels.len() != width * height {
            return Err(CoreError::InvalidFrame(format!(
                "expected {} samples for {} x {}, got {}",
                width * height,
                width,
                height,
                pixels.len()
            )));
        }

        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// Build a frame from interleaved 8-bit RGBA bytes
    pub fn from_rgba8(width: usize, height: usize, bytes: &[u8]) -> Result<Self> {
        let pixels = bytes
            .chunks_exact(4)
            .map(|px| Pixel::new(px[0], px[1], px[2], px[3]).to_packed())
            .collect();
        Self::new(width, height, pixels)
    }

    /// Samples per row
    pub fn width(&self) -> usize {
        self.width
    }

    /// Number of rows, the animation loop length
    pub fn height(&self) -> usize {
        self.height
    }

    /// Total sample count (`width * height`)
    pub fn len(&self) -> usize {
        self.pixels.len()
    }

    /// Always false for a constructed frame
    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    /// Raw packed samples
    pub fn pixels(&self) -> &[u32] {
        &self.pixels
    }

    /// Check that one row covers the whole LED array
    pub fn ensure_covers(&self, led_count: usize) -> Result<()> {
        if self.width < led_count {
            return Err(CoreError::InvalidFrame(format!(
                "frame width {} is narrower than the {} LED array",
                self.width, led_count
            )));
        }
        Ok(())
    }

    /// Copy the leading `dst.len()` samples of a row into an LED buffer
    ///
    /// The row index wraps modulo the frame height.
    pub fn copy_row_into(&self, row: usize, dst: &mut [Pixel]) {
        let start = (row % self.height) * self.width;
        let count = dst.len().min(self.width);
        let src = &self.pixels[start..start + count];

        for (out, &raw) in dst.iter_mut().zip(src) {
            *out = Pixel::from_packed(raw);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(width: usize, height: usize) -> FrameStore {
        let pixels = (0..width * height)
            .map(|i| Pixel::new((i % width) as u8, (i / width) as u8, 0, 255).to_packed())
            .collect();
        FrameStore::new(width, height, pixels).unwrap()
    }

    #[test]
    fn test_rejects_mismatched_length() {
        assert!(FrameStore::new(4, 2, vec![0; 7]).is_err());
        assert!(FrameStore::new(0, 2, vec![]).is_err());
    }

    #[test]
    fn test_from_rgba8() {
        let frame = FrameStore::from_rgba8(2, 1, &[1, 2, 3, 4, 5, 6, 7, 8]).unwrap();
        assert_eq!(frame.pixels()[1], Pixel::new(5, 6, 7, 8).to_packed());
    }

    #[test]
    fn test_copy_row_wraps() {
        let frame = gradient(6, 3);
        let mut leds = [Pixel::BLACK; 4];

        frame.copy_row_into(4, &mut leds);
        assert_eq!(leds[0], Pixel::new(0, 1, 0, 255));
        assert_eq!(leds[3], Pixel::new(3, 1, 0, 255));
    }

    #[test]
    fn test_ensure_covers() {
        let frame = gradient(6, 1);
        assert!(frame.ensure_covers(6).is_ok());
        assert!(frame.ensure_covers(7).is_err());
    }
}
