//! Telemetry reception
//!
//! The remote driver reports a fixed binary record after rendering.
//! The first record captures the relative baseline; every record tells
//! us which host to send bitmaps to.

use std::io::ErrorKind;
use std::net::{SocketAddr, UdpSocket};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use stageled_core::{StageContext, StageState, TelemetryRecord};

use crate::Result;

/// What a datagram changed, for logging outside the lock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Ingested {
    /// Baseline captured from this datagram
    pub first: bool,
    /// New transmit target adopted from the sender
    pub new_target: Option<SocketAddr>,
}

/// Apply one telemetry datagram to the shared state
///
/// Only the sender IP matters; bitmaps always go to `remote_port` on it.
/// A short datagram overwrites only the leading fields.
pub fn ingest(
    state: &mut StageState,
    datagram: &[u8],
    from: SocketAddr,
    remote_port: u16,
    now: Instant,
) -> Ingested {
    let mut outcome = Ingested::default();

    if !state.local.has_baseline() {
        let mut initial = TelemetryRecord::default();
        initial.absorb(datagram);
        state.local.capture_baseline(&initial);
        outcome.first = true;
    }

    if state.remote_addr.map(|addr| addr.ip()) != Some(from.ip()) {
        let target = SocketAddr::new(from.ip(), remote_port);
        state.remote_addr = Some(target);
        outcome.new_target = Some(target);
    }

    state.remote.record.absorb(datagram);
    state.local.recompute(&state.remote);
    state.local.last_feedback = Some(now);

    outcome
}

/// Listener for remote telemetry
pub struct FeedbackReceiver {
    socket: UdpSocket,
    remote_port: u16,
}

impl FeedbackReceiver {
    /// Bind the listener on all interfaces
    ///
    /// `timeout` bounds every receive so the loop notices shutdown.
    pub fn bind(port: u16, timeout: Duration, remote_port: u16) -> Result<Self> {
        let socket = UdpSocket::bind(("0.0.0.0", port))?;
        socket.set_read_timeout(Some(timeout))?;

        tracing::info!("Feedback: waiting for incoming packets on port {}", port);

        Ok(Self {
            socket,
            remote_port,
        })
    }

    /// Local address the listener is bound to
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Receive one datagram, `None` on timeout
    pub fn recv(&self, buf: &mut [u8]) -> Result<Option<(usize, SocketAddr)>> {
        match self.socket.recv_from(buf) {
            Ok((len, from)) => Ok(Some((len, from))),
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Receive and apply telemetry until shutdown
    pub fn run(&self, ctx: &StageContext) {
        // room for a record from a newer driver revision
        let mut buf = [0u8; 2 * TelemetryRecord::WIRE_SIZE];

        while ctx.is_running() {
            let (len, from) = match self.recv(&mut buf) {
                Ok(Some((len, from))) if len > 0 => (len, from),
                Ok(_) => continue,
                Err(e) => {
                    tracing::warn!("Feedback: receive failed: {}", e);
                    thread::sleep(Duration::from_millis(10));
                    continue;
                }
            };

            let (outcome, baseline) = {
                let mut state = ctx.lock();
                let outcome = ingest(&mut state, &buf[..len], from, self.remote_port, Instant::now());
                (outcome, (state.local.baseline_frames, state.local.baseline_uptime))
            };

            if outcome.first {
                tracing::info!(
                    "Feedback: first message received, relative frames: {}, time: {}",
                    baseline.0,
                    baseline.1
                );
            }
            if let Some(target) = outcome.new_target {
                tracing::info!("Feedback: received from {}, updating target", target.ip());
            }
            if len < TelemetryRecord::WIRE_SIZE {
                tracing::debug!("Feedback: short datagram ({} bytes) from {}", len, from);
            }
        }

        tracing::info!("Feedback receiver stopped");
    }

    /// Run the receiver on a named thread
    pub fn spawn(self, ctx: Arc<StageContext>) -> Result<JoinHandle<()>> {
        let handle = thread::Builder::new()
            .name("feedback".to_string())
            .spawn(move || self.run(&ctx))?;
        Ok(handle)
    }
}
