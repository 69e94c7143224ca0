//! `midir` surface backend
//!
//! Input arrives on the midir callback thread and is forwarded through a
//! channel so the driver can poll it with a timeout. midir has no
//! unplug notification, so an open session periodically checks that the
//! device is still listed.

use super::apc::Indicator;
use super::driver::{SurfaceBackend, SurfaceSession};
use super::MidiMessage;
use crate::{ControlError, Result};
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError};
use midir::{MidiInput, MidiInputConnection, MidiOutput, MidiOutputConnection};
use std::time::{Duration, Instant};
use tracing::{info, trace};

const CLIENT_NAME: &str = "stageled";

/// Opens sessions through the system MIDI API
#[derive(Debug, Clone)]
pub struct MidirBackend {
    liveness_interval: Duration,
}

impl MidirBackend {
    /// Create a backend checking device presence every `liveness_interval`
    pub fn new(liveness_interval: Duration) -> Self {
        Self { liveness_interval }
    }
}

/// First port whose name contains the device name
fn find_port<P>(
    ports: Vec<P>,
    name_of: impl Fn(&P) -> Option<String>,
    device: &str,
) -> Option<(P, String)> {
    ports.into_iter().find_map(|port| {
        let name = name_of(&port)?;
        name.contains(device).then_some((port, name))
    })
}

fn device_present(device: &str) -> Result<bool> {
    let probe = MidiInput::new(CLIENT_NAME)?;
    let found = probe
        .ports()
        .iter()
        .filter_map(|p| probe.port_name(p).ok())
        .any(|name| name.contains(device));
    Ok(found)
}

impl SurfaceBackend for MidirBackend {
    type Session = MidirSession;

    fn connect(&mut self, device: &str) -> Result<MidirSession> {
        let input = MidiInput::new(CLIENT_NAME)?;
        let (in_port, in_name) = find_port(input.ports(), |p| input.port_name(p).ok(), device)
            .ok_or_else(|| ControlError::DeviceNotFound(device.to_string()))?;

        let output = MidiOutput::new(CLIENT_NAME)?;
        let (out_port, _) = find_port(output.ports(), |p| output.port_name(p).ok(), device)
            .ok_or_else(|| ControlError::DeviceNotFound(device.to_string()))?;

        let (tx, rx) = unbounded();
        let input_conn = input.connect(
            &in_port,
            "stageled-in",
            move |stamp, bytes, _| {
                trace!("MIDI message: {}, {:?}", stamp, bytes);
                if let Some(message) = MidiMessage::from_bytes(bytes) {
                    // receiver gone means the session is closing
                    let _ = tx.send(message);
                }
            },
            (),
        )?;
        let output_conn = output.connect(&out_port, "stageled-out")?;

        info!("Connected to MIDI port {}", in_name);

        Ok(MidirSession {
            device: device.to_string(),
            _input: input_conn,
            output: output_conn,
            events: rx,
            liveness_interval: self.liveness_interval,
            last_check: Instant::now(),
        })
    }
}

/// An open `midir` session; dropping it closes both ports
pub struct MidirSession {
    device: String,
    _input: MidiInputConnection<()>,
    output: MidiOutputConnection,
    events: Receiver<MidiMessage>,
    liveness_interval: Duration,
    last_check: Instant,
}

impl MidirSession {
    fn check_liveness(&mut self) -> Result<()> {
        if self.last_check.elapsed() < self.liveness_interval {
            return Ok(());
        }
        self.last_check = Instant::now();

        if device_present(&self.device)? {
            Ok(())
        } else {
            Err(ControlError::DeviceLost(self.device.clone()))
        }
    }
}

impl SurfaceSession for MidirSession {
    fn poll(&mut self, timeout: Duration) -> Result<Option<MidiMessage>> {
        self.check_liveness()?;

        match self.events.recv_timeout(timeout) {
            Ok(message) => Ok(Some(message)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => {
                Err(ControlError::DeviceLost(self.device.clone()))
            }
        }
    }

    fn send(&mut self, indicator: &Indicator) -> Result<()> {
        self.output.send(&indicator.to_bytes())?;
        Ok(())
    }
}
