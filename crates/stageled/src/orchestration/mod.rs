//! Worker loops wiring the shared context together

pub mod animation;
pub mod dispatch;
pub mod status;
