//! Remote driver transport
//!
//! Bitmaps go out as one headerless UDP datagram per dispatch cycle;
//! telemetry comes back on a fixed port and tells us where to send.

mod feedback;
mod sender;

pub use feedback::*;
pub use sender::*;
