//! Control surface input/output system

mod apc;
mod driver;
mod mapper;
#[cfg(feature = "midi")]
mod midir_backend;

pub use apc::*;
pub use driver::*;
pub use mapper::*;
#[cfg(feature = "midi")]
pub use midir_backend::*;

use serde::{Deserialize, Serialize};

/// MIDI message types used by the surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MidiMessage {
    NoteOn {
        channel: u8,
        note: u8,
        velocity: u8,
    },
    NoteOff {
        channel: u8,
        note: u8,
    },
    ControlChange {
        channel: u8,
        controller: u8,
        value: u8,
    },
}

impl MidiMessage {
    /// Parse a MIDI message from raw bytes
    ///
    /// Anything other than note and controller messages is ignored.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < 3 {
            return None;
        }

        let status = bytes[0];
        let message_type = status & 0xF0;
        let channel = status & 0x0F;

        match message_type {
            0x90 => {
                let velocity = bytes[2];
                if velocity == 0 {
                    // Note On with velocity 0 is treated as Note Off
                    Some(MidiMessage::NoteOff {
                        channel,
                        note: bytes[1],
                    })
                } else {
                    Some(MidiMessage::NoteOn {
                        channel,
                        note: bytes[1],
                        velocity,
                    })
                }
            }
            0x80 => Some(MidiMessage::NoteOff {
                channel,
                note: bytes[1],
            }),
            0xB0 => Some(MidiMessage::ControlChange {
                channel,
                controller: bytes[1],
                value: bytes[2],
            }),
            _ => None,
        }
    }

    /// Convert to raw MIDI bytes
    pub fn to_bytes(&self) -> [u8; 3] {
        match self {
            MidiMessage::NoteOn {
                channel,
                note,
                velocity,
            } => [0x90 | channel, *note, *velocity],
            MidiMessage::NoteOff { channel, note } => [0x80 | channel, *note, 0],
            MidiMessage::ControlChange {
                channel,
                controller,
                value,
            } => [0xB0 | channel, *controller, *value],
        }
    }
}
