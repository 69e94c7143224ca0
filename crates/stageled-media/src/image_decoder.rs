//! Preset and mask decoding
//!
//! Assets are RGBA PNG files. Each image row is one animation step and
//! the first `led_count` pixels of a row map onto the LED array, so an
//! image narrower than the array is rejected. Wider images are accepted
//! with a warning, the extra columns are never shown.

use crate::{MediaError, Result};
use stageled_core::{AssetConfig, FrameStore};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Source of decoded frames, keyed by asset name
pub trait AssetDecoder: Send {
    /// Decode an asset into a frame
    fn decode(&self, name: &str) -> Result<FrameStore>;
}

/// Decoder for PNG assets of the configured library
#[derive(Debug, Clone)]
pub struct PngAssetDecoder {
    assets: AssetConfig,
    led_count: usize,
}

impl PngAssetDecoder {
    /// Create a decoder resolving names through the asset configuration
    pub fn new(assets: AssetConfig, led_count: usize) -> Self {
        Self { assets, led_count }
    }

    /// Decoder for a bare directory with default slot lists
    pub fn in_directory(directory: impl Into<PathBuf>, led_count: usize) -> Self {
        Self::new(
            AssetConfig {
                directory: directory.into(),
                ..AssetConfig::default()
            },
            led_count,
        )
    }

    /// Directory assets are read from
    pub fn directory(&self) -> &Path {
        &self.assets.directory
    }

    /// Decode an image file
    pub fn open<P: AsRef<Path>>(&self, path: P) -> Result<FrameStore> {
        let path = path.as_ref();
        let name = path.display().to_string();

        if !path.exists() {
            return Err(MediaError::FileOpen(format!("File not found: {}", name)));
        }

        let image = image::open(path)
            .map_err(|e| MediaError::DecoderError(format!("Failed to load {}: {}", name, e)))?;

        if !image.color().has_alpha() {
            return Err(MediaError::MissingAlpha(name));
        }

        let width = image.width() as usize;
        let height = image.height() as usize;

        if width < self.led_count {
            return Err(MediaError::TooNarrow {
                name,
                width,
                required: self.led_count,
            });
        }

        if width != self.led_count {
            warn!(
                "{}: width {} does not match LED count {}, extra columns ignored",
                name, width, self.led_count
            );
        }

        let frame = FrameStore::from_rgba8(width, height, image.to_rgba8().as_raw())?;
        info!("Asset loaded: {}x{} from {}", width, height, name);

        Ok(frame)
    }
}

impl AssetDecoder for PngAssetDecoder {
    fn decode(&self, name: &str) -> Result<FrameStore> {
        self.open(self.assets.resolve(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage, RgbImage};

    #[test]
    fn test_decode_rgba() {
        let dir = tempfile::tempdir().unwrap();
        let mut img = RgbaImage::new(4, 3);
        img.put_pixel(1, 2, Rgba([10, 20, 30, 40]));
        img.save(dir.path().join("anim.png")).unwrap();

        let decoder = PngAssetDecoder::in_directory(dir.path(), 4);
        let frame = decoder.decode("anim.png").unwrap();
        assert_eq!(frame.width(), 4);
        assert_eq!(frame.height(), 3);
        assert_eq!(frame.pixels()[2 * 4 + 1], 0x281e_140a);
    }

    #[test]
    fn test_rejects_missing_alpha() {
        let dir = tempfile::tempdir().unwrap();
        RgbImage::new(4, 1).save(dir.path().join("flat.png")).unwrap();

        let decoder = PngAssetDecoder::in_directory(dir.path(), 4);
        let err = decoder.decode("flat.png").unwrap_err();
        assert!(err.to_string().contains("alpha channel required"));
    }

    #[test]
    fn test_rejects_narrow() {
        let dir = tempfile::tempdir().unwrap();
        RgbaImage::new(3, 1).save(dir.path().join("narrow.png")).unwrap();

        let decoder = PngAssetDecoder::in_directory(dir.path(), 4);
        assert!(matches!(
            decoder.decode("narrow.png"),
            Err(MediaError::TooNarrow { width: 3, .. })
        ));
    }

    #[test]
    fn test_accepts_wider() {
        let dir = tempfile::tempdir().unwrap();
        RgbaImage::new(6, 2).save(dir.path().join("wide.png")).unwrap();

        let decoder = PngAssetDecoder::in_directory(dir.path(), 4);
        assert_eq!(decoder.decode("wide.png").unwrap().width(), 6);
    }

    #[test]
    fn test_names_resolve_against_configured_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("templates")).unwrap();
        RgbaImage::new(4, 1)
            .save(dir.path().join("templates").join("nested.png"))
            .unwrap();

        let assets = AssetConfig {
            directory: dir.path().join("templates"),
            ..AssetConfig::default()
        };
        let decoder = PngAssetDecoder::new(assets, 4);
        assert_eq!(decoder.directory(), dir.path().join("templates"));
        assert_eq!(decoder.decode("nested.png").unwrap().height(), 1);
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let decoder = PngAssetDecoder::in_directory(dir.path(), 4);
        assert!(matches!(
            decoder.decode("nope.png"),
            Err(MediaError::FileOpen(_))
        ));
    }
}
