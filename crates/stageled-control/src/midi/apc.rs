//! APC mini mk2 indicator protocol
//!
//! The device has no dedicated "set light" message: a note-on sent back
//! to it sets a button light. For RGB pads the status byte selects the
//! lighting mode (channel 0..15) and the velocity selects a palette
//! color. Single-color buttons use channel 0 with velocity 0/1/2.

use super::MidiMessage;
use std::ops::Range;

/// Palette indices
pub mod color {
    pub const BLACK: u8 = 0;
    pub const WHITE: u8 = 3;
    pub const RED: u8 = 5;
    pub const YELLOW: u8 = 13;
    pub const GREEN: u8 = 21;
    pub const LIGHT_BLUE: u8 = 36;
    pub const BLUE: u8 = 45;
    pub const PURPLE: u8 = 53;

    pub const PRESETS: u8 = YELLOW;
    pub const MASKS: u8 = PURPLE;
    pub const BLACKOUT: u8 = WHITE;
    pub const FULL_ON: u8 = WHITE;
    pub const TINT: [u8; 3] = [RED, GREEN, BLUE];
}

/// RGB pad lighting mode, encoded as the note-on status byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum LightMode {
    Solid10 = 0x90,
    Solid25 = 0x91,
    Solid50 = 0x92,
    Solid65 = 0x93,
    Solid75 = 0x94,
    Solid90 = 0x95,
    Solid100 = 0x96,
    Pulse1_16 = 0x97,
    Pulse1_8 = 0x98,
    Pulse1_4 = 0x99,
    Pulse1_2 = 0x9A,
    Blink1_24 = 0x9B,
    Blink1_16 = 0x9C,
    Blink1_8 = 0x9D,
    Blink1_4 = 0x9E,
    Blink1_2 = 0x9F,
}

impl LightMode {
    /// Status byte on the wire
    pub fn status(self) -> u8 {
        self as u8
    }
}

/// Single-color button state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SingleLight {
    Off = 0,
    On = 1,
    Blink = 2,
}

/// Status byte used for single-color buttons
const SINGLE_MODE: u8 = 0x90;

/// Buttons cleared when a session opens
pub const CLEARED_BUTTONS: [Range<u8>; 3] = [0x00..0x40, 0x64..0x6b, 0x70..0x7a];

/// One "set indicator" command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Indicator {
    /// Lighting mode status byte
    pub mode: u8,
    /// Target button (note number)
    pub button: u8,
    /// Palette index, or single-button state
    pub value: u8,
}

impl Indicator {
    /// Light an RGB pad
    pub fn pad(mode: LightMode, button: u8, color: u8) -> Self {
        Self {
            mode: mode.status(),
            button,
            value: color,
        }
    }

    /// Light a single-color button
    pub fn single(button: u8, light: SingleLight) -> Self {
        Self {
            mode: SINGLE_MODE,
            button,
            value: light as u8,
        }
    }

    /// The note-on message carrying this command
    pub fn to_message(&self) -> MidiMessage {
        MidiMessage::NoteOn {
            channel: self.mode & 0x0F,
            note: self.button,
            velocity: self.value,
        }
    }

    /// Raw bytes sent to the device
    pub fn to_bytes(&self) -> [u8; 3] {
        [self.mode, self.button, self.value]
    }
}
