//! Error types for the control system
use thiserror::Error;

/// Control system errors
#[derive(Error, Debug)]
pub enum ControlError {
    /// MIDI port connection error
    ///
    /// Only the message is kept; the failed port handle is not `Sync`.
    #[error("MIDI connection error: {0}")]
    MidiConnectionError(String),

    /// MIDI initialization error
    #[error("MIDI init error: {0}")]
    #[cfg(feature = "midi")]
    MidiInitError(#[from] midir::InitError),

    /// MIDI transmission error
    #[error("MIDI send error: {0}")]
    #[cfg(feature = "midi")]
    MidiSendError(#[from] midir::SendError),

    /// Surface not present
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    /// Surface went away mid-session
    #[error("Device lost: {0}")]
    DeviceLost(String),

    /// I/O error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Address could not be resolved
    #[error("Invalid address: {0}")]
    InvalidAddress(String),
}

#[cfg(feature = "midi")]
impl<T> From<midir::ConnectError<T>> for ControlError {
    fn from(e: midir::ConnectError<T>) -> Self {
        Self::MidiConnectionError(e.to_string())
    }
}

/// Result type for control operations
pub type Result<T> = std::result::Result<T, ControlError>;
