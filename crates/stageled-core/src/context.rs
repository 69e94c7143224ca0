//! Shared context: the single source of truth between worker threads
//!
//! Every field of [`StageState`] is reached through one coarse lock.
//! Blocking work (decoding, network, device I/O) always happens on a
//! thread-local copy taken under the lock and released before the call.
//!
//! Two wake signals carry no payload: the control surface fires them after
//! recording a new preset/mask selection and the loader re-reads the
//! selection from the state. A signal holds at most one pending wakeup, so
//! repeated requests collapse and the last recorded selection wins.

use crate::frame::FrameStore;
use crate::layout::LedLayout;
use crate::params::ControlParams;
use crate::pixel::Pixel;
use crate::stats::{LocalStats, RemoteStats};
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use parking_lot::{Mutex, MutexGuard};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Hand-off slot between a loader and the animation engine
#[derive(Debug, Default)]
pub enum Pending {
    /// Nothing waiting
    #[default]
    None,
    /// A decoded frame waiting to replace the current one
    Frame(FrameStore),
    /// Clear the mask layer instead of loading a frame
    ResetMask,
}

impl Pending {
    /// Take the slot content, leaving it empty
    pub fn take(&mut self) -> Pending {
        std::mem::take(self)
    }

    /// True when nothing is waiting
    pub fn is_none(&self) -> bool {
        matches!(self, Pending::None)
    }

    /// Replace the slot, returning a superseded frame that was never consumed
    fn replace(&mut self, next: Pending) -> Option<FrameStore> {
        match std::mem::replace(self, next) {
            Pending::Frame(stale) => Some(stale),
            _ => None,
        }
    }
}

/// Control surface connectivity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InterfaceState {
    /// Never found since startup
    #[default]
    Disconnected,
    /// Looking for the device
    Connecting,
    /// Session open
    Connected,
    /// Session dropped, waiting to reconnect
    Lost,
}

impl std::fmt::Display for InterfaceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "offline"),
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "online"),
            Self::Lost => write!(f, "lost"),
        }
    }
}

/// A selected asset and the surface slot it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    /// Slot index in the preset or mask list
    pub slot: usize,
    /// Asset name
    pub name: String,
}

/// Everything guarded by the context lock
#[derive(Debug)]
pub struct StageState {
    /// Current animation row
    pub live: Vec<Pixel>,
    /// Current mask row
    pub mask: Vec<Pixel>,
    /// Last dispatched output (post transform)
    pub monitor: Vec<Pixel>,
    /// Last dispatched input (pre transform)
    pub preview: Vec<Pixel>,
    /// Preset frame waiting for the animation engine
    pub pending_preset: Pending,
    /// Mask frame (or reset) waiting for the animation engine
    pub pending_mask: Pending,
    /// Control surface parameters
    pub params: ControlParams,
    /// Selected preset
    pub preset: Option<Selection>,
    /// Selected mask
    pub mask_selection: Option<Selection>,
    /// Preset last staged by the loader
    pub loaded_preset: Option<Selection>,
    /// Mask last staged by the loader, cleared by a reset
    pub loaded_mask: Option<Selection>,
    /// Surface indicators no longer match the selections
    pub surface_stale: bool,
    /// Last telemetry received
    pub remote: RemoteStats,
    /// Local dispatch statistics
    pub local: LocalStats,
    /// Where bitmaps are sent, learned from telemetry
    pub remote_addr: Option<SocketAddr>,
    /// Control surface connectivity
    pub interface: InterfaceState,
}

impl StageState {
    fn new(layout: &LedLayout) -> Self {
        let leds = layout.led_count();
        Self {
            live: vec![Pixel::BLACK; leds],
            mask: vec![Pixel::BLACK; leds],
            monitor: vec![Pixel::BLACK; leds],
            preview: vec![Pixel::BLACK; leds],
            pending_preset: Pending::None,
            pending_mask: Pending::None,
            params: ControlParams::default(),
            preset: None,
            mask_selection: None,
            loaded_preset: None,
            loaded_mask: None,
            surface_stale: false,
            remote: RemoteStats::default(),
            local: LocalStats::default(),
            remote_addr: None,
            interface: InterfaceState::default(),
        }
    }

    /// Queue a decoded preset, returning the stale pending frame it replaces
    pub fn stage_preset(&mut self, frame: FrameStore) -> Option<FrameStore> {
        self.pending_preset.replace(Pending::Frame(frame))
    }

    /// Queue a decoded mask, returning the stale pending frame it replaces
    pub fn stage_mask(&mut self, frame: FrameStore) -> Option<FrameStore> {
        self.pending_mask.replace(Pending::Frame(frame))
    }

    /// Queue a mask reset, returning the stale pending frame it replaces
    pub fn stage_mask_reset(&mut self) -> Option<FrameStore> {
        self.loaded_mask = None;
        self.pending_mask.replace(Pending::ResetMask)
    }
}

/// Wake-up signal without payload, holding at most one pending wakeup
#[derive(Debug, Clone)]
pub struct Signal {
    tx: Sender<()>,
    rx: Receiver<()>,
}

impl Signal {
    fn new() -> Self {
        let (tx, rx) = bounded(1);
        Self { tx, rx }
    }

    /// Wake the waiting side; a wakeup already pending absorbs this one
    pub fn notify(&self) {
        match self.tx.try_send(()) {
            Ok(()) | Err(TrySendError::Full(())) => {}
            Err(TrySendError::Disconnected(())) => {
                tracing::warn!("Signal receiver disconnected");
            }
        }
    }

    /// Block until woken or the timeout expires; true when woken
    pub fn wait(&self, timeout: Duration) -> bool {
        self.rx.recv_timeout(timeout).is_ok()
    }
}

/// Shared context handed to every worker thread
#[derive(Debug)]
pub struct StageContext {
    layout: LedLayout,
    state: Mutex<StageState>,
    keep_running: AtomicBool,
    preset_ready: Signal,
    mask_ready: Signal,
}

impl StageContext {
    /// Create the context with every buffer sized for the layout
    pub fn new(layout: LedLayout) -> Self {
        Self {
            layout,
            state: Mutex::new(StageState::new(&layout)),
            keep_running: AtomicBool::new(true),
            preset_ready: Signal::new(),
            mask_ready: Signal::new(),
        }
    }

    /// Fixed LED layout
    pub fn layout(&self) -> &LedLayout {
        &self.layout
    }

    /// Acquire the context lock
    pub fn lock(&self) -> MutexGuard<'_, StageState> {
        self.state.lock()
    }

    /// Cooperative shutdown flag, readable without the lock
    pub fn is_running(&self) -> bool {
        self.keep_running.load(Ordering::Acquire)
    }

    /// Ask every worker loop to stop
    pub fn shutdown(&self) {
        self.keep_running.store(false, Ordering::Release);
    }

    /// Signal fired when a new preset has been selected
    pub fn preset_ready(&self) -> &Signal {
        &self.preset_ready
    }

    /// Signal fired when a new mask has been selected
    pub fn mask_ready(&self) -> &Signal {
        &self.mask_ready
    }
}
