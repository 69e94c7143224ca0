//! StageLED Media - Animation Asset Loading
//!
//! This crate turns the preset and mask PNG files into decoded frames:
//! - PNG decoding with alpha and width checks
//! - Background loader threads woken by the preset/mask selection signals

use stageled_core::CoreError;
use thiserror::Error;

pub mod image_decoder;
pub mod loader;

pub use image_decoder::{AssetDecoder, PngAssetDecoder};
pub use loader::{AssetKind, Loader};

/// Media errors
#[derive(Error, Debug)]
pub enum MediaError {
    #[error("Failed to open file: {0}")]
    FileOpen(String),

    #[error("Decoder error: {0}")]
    DecoderError(String),

    #[error("{0}: alpha channel required")]
    MissingAlpha(String),

    #[error("{name}: {width} pixels wide, at least {required} required")]
    TooNarrow {
        name: String,
        width: usize,
        required: usize,
    },

    #[error("Invalid frame: {0}")]
    Frame(#[from] CoreError),

    #[error("Failed to spawn loader thread: {0}")]
    Thread(#[from] std::io::Error),
}

/// Result type for media operations
pub type Result<T> = std::result::Result<T, MediaError>;
