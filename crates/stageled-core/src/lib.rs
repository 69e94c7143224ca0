//! StageLED Core - Pixel Pipeline and Shared State
//!
//! This crate contains the real-time core of the LED installation controller:
//! - Pixel and LED array primitives, decoded animation frames
//! - Control parameters driven by the control surface (master, segments, tint, strobe)
//! - The layered color transform applied before every network dispatch
//! - Remote telemetry and local dispatch statistics
//! - The shared context guarded by a single lock, with pending frame slots
//!   and the preset/mask wake signals
//! - Configuration and log configuration

#![warn(missing_docs)]

use thiserror::Error;

pub mod config;
pub mod context;
pub mod frame;
pub mod layout;
pub mod logging;
pub mod params;
pub mod pixel;
pub mod stats;
pub mod transform;

// --- Re-exports grouped by category ---

// Pixels & Frames
pub use frame::FrameStore;
pub use layout::{LedLayout, SegmentGroups};
pub use pixel::Pixel;

// Control
pub use params::{expand_slider, ControlParams, SliderRoles, StrobeState, StrobeTiming};

// Pipeline
pub use transform::{TransformInput, Transformer};

// Statistics
pub use stats::{format_uptime, LocalStats, RemoteHealth, RemoteStats, TelemetryRecord};

// Shared state
pub use context::{InterfaceState, Pending, Selection, Signal, StageContext, StageState};

// Configuration & Logging
pub use config::{AssetConfig, FullOnMode, NetworkConfig, StageConfig, SurfaceConfig, SurfaceLayout};
pub use logging::LogConfig;

/// Target dispatch rate of the transform engine, in frames per second
pub const TARGET_FPS: u32 = 30;

/// Core error types
#[derive(Error, Debug)]
pub enum CoreError {
    /// Configuration file could not be read
    #[error("Config IO error: {0}")]
    ConfigIo(#[from] std::io::Error),

    /// Configuration file could not be parsed
    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Configuration is structurally invalid
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// Frame geometry does not fit the LED layout
    #[error("Invalid frame: {0}")]
    InvalidFrame(String),
}

/// Result type for core operations
pub type Result<T> = std::result::Result<T, CoreError>;
