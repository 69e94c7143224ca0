//! Remote telemetry and local dispatch statistics
//!
//! The remote driver reports a fixed binary record after rendering. Only
//! counters relative to the first record received are meaningful, so the
//! first record captures a baseline and restarts local frame counting.

use bytemuck::{Pod, Zeroable};
use std::time::{Duration, Instant};

/// Seconds without feedback after which the remote is considered gone
pub const FEEDBACK_TIMEOUT: Duration = Duration::from_secs(2);

/// Wire layout of one telemetry datagram
///
/// Fields are in host byte order, as sent by the remote driver.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Pod, Zeroable)]
pub struct TelemetryRecord {
    /// Driver state, 0 while starting up
    pub state: u64,
    /// Frame counter at the previous report
    pub old_frames: u64,
    /// Total frames rendered by the driver
    pub frames: u64,
    /// Instantaneous render rate
    pub fps: u64,
    /// Timestamp of the last rendered frame (ms)
    pub time_last_frame: u64,
    /// Driver uptime (ms)
    pub time_current: u64,
    /// Mains voltage (hundredths of volt)
    pub main_ac_voltage: u16,
    /// Main core temperature (hundredths of degree)
    pub main_core_temperature: u16,
    /// Monitor core temperature
    pub mon_core_temperature: u16,
    /// Power stage temperature
    pub ext_power_temperature: u16,
    /// Compute enclosure temperature
    pub ext_compute_temperature: u16,
    /// PSU 0 voltage (hundredths)
    pub psu0_volt: u16,
    /// PSU 0 current (hundredths)
    pub psu0_amps: u16,
    /// PSU 1 voltage
    pub psu1_volt: u16,
    /// PSU 1 current
    pub psu1_amps: u16,
    /// PSU 2 voltage
    pub psu2_volt: u16,
    /// PSU 2 current
    pub psu2_amps: u16,
    /// Unused
    pub padding: u16,
}

impl TelemetryRecord {
    /// Size of a complete record on the wire
    pub const WIRE_SIZE: usize = std::mem::size_of::<TelemetryRecord>();

    /// Overwrite the record with the leading bytes of a datagram
    ///
    /// Bytes beyond the datagram keep their previous value. Returns the
    /// number of bytes copied.
    pub fn absorb(&mut self, datagram: &[u8]) -> usize {
        let target = bytemuck::bytes_of_mut(self);
        let count = datagram.len().min(target.len());
        target[..count].copy_from_slice(&datagram[..count]);
        count
    }

    /// Serialize to wire bytes
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }
}

/// One power supply reading
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PsuReading {
    /// Volts
    pub volts: f32,
    /// Amperes
    pub amps: f32,
}

impl PsuReading {
    /// Power draw in watts
    pub fn watts(&self) -> f32 {
        self.volts * self.amps
    }
}

/// Last telemetry snapshot from the remote driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RemoteStats {
    /// Raw record, updated byte-for-byte
    pub record: TelemetryRecord,
}

impl RemoteStats {
    /// Remote frame counter
    pub fn frames(&self) -> u64 {
        self.record.frames
    }

    /// Remote render rate
    pub fn fps(&self) -> u64 {
        self.record.fps
    }

    /// Remote uptime in milliseconds
    pub fn uptime_ms(&self) -> u64 {
        self.record.time_current
    }

    /// Mains voltage in volts
    pub fn main_voltage(&self) -> f32 {
        self.record.main_ac_voltage as f32 / 100.0
    }

    /// Readings of the three PSUs
    pub fn psus(&self) -> [PsuReading; 3] {
        let r = &self.record;
        [
            (r.psu0_volt, r.psu0_amps),
            (r.psu1_volt, r.psu1_amps),
            (r.psu2_volt, r.psu2_amps),
        ]
        .map(|(v, a)| PsuReading {
            volts: v as f32 / 100.0,
            amps: a as f32 / 100.0,
        })
    }

    /// Temperatures in degrees: main core, monitor core, power, compute
    pub fn temperatures(&self) -> [f32; 4] {
        let r = &self.record;
        [
            r.main_core_temperature,
            r.mon_core_temperature,
            r.ext_power_temperature,
            r.ext_compute_temperature,
        ]
        .map(|t| t as f32 / 100.0)
    }
}

/// Health of the remote driver as seen from here
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteHealth {
    /// Nothing useful received yet
    Waiting,
    /// Reporting normally
    Online,
    /// Reported before but silent for longer than [`FEEDBACK_TIMEOUT`]
    TimedOut,
}

impl std::fmt::Display for RemoteHealth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Waiting => write!(f, "waiting"),
            Self::Online => write!(f, "online"),
            Self::TimedOut => write!(f, "timed out"),
        }
    }
}

/// Dispatch statistics maintained by this process
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LocalStats {
    /// Frames dispatched since the baseline
    pub frames: u64,
    /// Remote frame counter at first telemetry
    pub baseline_frames: u64,
    /// Remote uptime at first telemetry
    pub baseline_uptime: u64,
    /// Frames the remote rendered since the baseline
    pub shown: u64,
    /// Dispatched frames the remote never rendered
    pub dropped: u64,
    /// `dropped / frames` as a percentage
    pub drop_rate: f64,
    /// Time of the last telemetry datagram
    pub last_feedback: Option<Instant>,
    /// Duration of the last transform pass
    pub transform_time: Duration,
}

impl LocalStats {
    /// True once a baseline has been captured
    pub fn has_baseline(&self) -> bool {
        self.last_feedback.is_some()
    }

    /// Capture the relative baseline and restart dispatch counting
    pub fn capture_baseline(&mut self, first: &TelemetryRecord) {
        self.frames = 0;
        self.baseline_frames = first.frames;
        self.baseline_uptime = first.time_current;
    }

    /// Recompute shown / dropped / drop rate against the current remote counters
    pub fn recompute(&mut self, remote: &RemoteStats) {
        self.shown = remote.frames().saturating_sub(self.baseline_frames);
        self.dropped = self.frames.saturating_sub(self.shown);

        if self.frames > 0 {
            self.drop_rate = self.dropped as f64 / self.frames as f64 * 100.0;
        }
    }

    /// Remote uptime since the baseline, in milliseconds
    pub fn session_uptime_ms(&self, remote: &RemoteStats) -> u64 {
        remote.uptime_ms().saturating_sub(self.baseline_uptime)
    }

    /// Remote health at `now`
    pub fn health(&self, remote: &RemoteStats, now: Instant) -> RemoteHealth {
        match self.last_feedback {
            _ if remote.record.state == 0 => RemoteHealth::Waiting,
            None => RemoteHealth::Waiting,
            Some(last) if now.saturating_duration_since(last) > FEEDBACK_TIMEOUT => {
                RemoteHealth::TimedOut
            }
            Some(_) => RemoteHealth::Online,
        }
    }
}

/// Format a millisecond uptime as `HH hrs, MM min, SS sec`
pub fn format_uptime(ms: u64) -> String {
    let total = ms / 1000;
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;
    format!("{:02} hrs, {:02} min, {:02} sec", hours, minutes, seconds)
}
