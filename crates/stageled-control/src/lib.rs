//! StageLED Control - Control Surface and Network Transport
//!
//! This crate connects the shared context to the outside world:
//! - **MIDI**: message codec, indicator commands for the APC mini mk2,
//!   event mapping onto control parameters, connection state machine
//! - **Net**: bitmap transmission to the remote driver and telemetry
//!   reception
//!
//! ## Feature Flags
//!
//! - `midi`: `midir` backend for the surface driver (enabled by default)
//!
//! ## Modules
//!
//! - [`midi`] - control surface
//! - [`net`] - remote driver transport
//! - [`error`] - Error types

#![allow(missing_docs)]

/// Error types
pub mod error;
/// Control surface input/output and state mapping
pub mod midi;
/// Remote driver transport
pub mod net;

// Re-exports
pub use error::{ControlError, Result};
pub use midi::{Indicator, LightMode, MidiMessage, SurfaceDriver, SurfaceMapper};
pub use net::{BitmapSender, FeedbackReceiver};

#[cfg(feature = "midi")]
pub use midi::MidirBackend;
