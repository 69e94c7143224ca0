//! Control parameters derived from the control surface
//!
//! Mutated only by the control surface driver, read by the animation
//! engine (playback speed) and the transform engine (everything else).

use crate::TARGET_FPS;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Number of faders on the surface (excluding master)
pub const SLIDER_COUNT: usize = 8;

/// Expand a 7-bit controller value to the 0-255 range
///
/// The top raw value maps to exactly 255 so full scale is reachable.
pub fn expand_slider(raw: u8) -> u8 {
    if raw >= 127 {
        return 255;
    }
    raw * 2
}

/// Which sliders drive the derived parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SliderRoles {
    /// Strobe duty ("flash") slider
    pub strobe_duty: usize,
    /// Strobe rate slider
    pub strobe_rate: usize,
    /// Playback speed slider
    pub speed: usize,
}

impl Default for SliderRoles {
    fn default() -> Self {
        Self {
            strobe_duty: 5,
            strobe_rate: 6,
            speed: 7,
        }
    }
}

/// Strobe timing constants
///
/// `divider = (base - value) / step + 1`, computed for both rate and duty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrobeTiming {
    /// Value subtracted from
    pub base: u32,
    /// Cycles per divider unit
    pub step: u32,
}

impl Default for StrobeTiming {
    fn default() -> Self {
        Self { base: 256, step: 20 }
    }
}

impl StrobeTiming {
    /// Cycles represented by a slider value, never below 1
    pub fn divider(&self, value: u8) -> u32 {
        (self.base.saturating_sub(value as u32) / self.step.max(1) + 1).max(1)
    }
}

/// Strobe gate state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StrobeState {
    /// Strobe rate, 0 disables strobing
    pub rate: u8,
    /// Duty ("flash") value, caps the on-time
    pub duty: u8,
    /// Cycles since the last flip
    pub phase: u32,
    /// Gate currently lit
    pub on: bool,
}

impl StrobeState {
    /// Set rate and duty; a zero rate pins phase and state
    pub fn configure(&mut self, rate: u8, duty: u8) {
        self.rate = rate;
        self.duty = duty;

        if rate == 0 {
            self.phase = 0;
            self.on = false;
        }
    }

    /// Advance one dispatch cycle, returning whether output may be lit
    ///
    /// With strobe disabled the gate is always open. While blacked out
    /// the phase keeps counting but the state does not flip.
    pub fn tick(&mut self, blackout: bool, timing: &StrobeTiming) -> bool {
        if self.rate == 0 {
            return true;
        }

        let phase = self.phase;
        self.phase = self.phase.wrapping_add(1);

        if blackout {
            return false;
        }

        let mut divider = timing.divider(self.rate);
        let on_time = timing.divider(self.duty);

        if self.on && on_time < divider {
            divider = on_time;
        }

        if phase % divider == 0 {
            self.phase = 1;
            self.on = !self.on;
        }

        self.on
    }
}

/// Live control parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlParams {
    /// Expanded fader values
    pub sliders: [u8; SLIDER_COUNT],
    /// Fader role assignment
    pub roles: SliderRoles,
    /// Master level
    pub master: u8,
    /// Per-channel tint toggles (0 or 255)
    pub tint: [u8; 3],
    /// Blackout armed
    pub blackout: bool,
    /// Full-on override armed
    pub full_on: bool,
    /// Strobe gate
    pub strobe: StrobeState,
    /// Strobe constants
    pub strobe_timing: StrobeTiming,
    /// Delay between animation rows
    pub frame_delay: Duration,
}

impl Default for ControlParams {
    fn default() -> Self {
        Self {
            sliders: [0; SLIDER_COUNT],
            roles: SliderRoles::default(),
            master: 255,
            tint: [0; 3],
            blackout: false,
            full_on: false,
            strobe: StrobeState::default(),
            strobe_timing: StrobeTiming::default(),
            frame_delay: default_frame_delay(),
        }
    }
}

/// Row delay used when the speed slider sits at zero
pub fn default_frame_delay() -> Duration {
    Duration::from_micros(1_000_000 / TARGET_FPS as u64)
}

impl ControlParams {
    /// Set a slider by index, ignoring out-of-range indices
    pub fn set_slider(&mut self, index: usize, value: u8) {
        if let Some(slot) = self.sliders.get_mut(index) {
            *slot = value;
        }
    }

    /// Value of a slider, 0 for unknown indices
    pub fn slider(&self, index: usize) -> u8 {
        self.sliders.get(index).copied().unwrap_or(0)
    }

    /// Recompute playback delay and strobe configuration from the sliders
    pub fn recompute_derived(&mut self) {
        let speed = self.slider(self.roles.speed);
        self.frame_delay = if speed > 0 {
            Duration::from_micros(1_000_000 / speed as u64)
        } else {
            default_frame_delay()
        };

        let rate = self.slider(self.roles.strobe_rate);
        let duty = self.slider(self.roles.strobe_duty);
        self.strobe.configure(rate, duty);
    }

    /// Flip a tint channel between 0 and 255, returning the armed state
    pub fn toggle_tint(&mut self, channel: usize) -> bool {
        match self.tint.get_mut(channel) {
            Some(value) => {
                *value = if *value == 0 { 255 } else { 0 };
                *value != 0
            }
            None => false,
        }
    }
}
