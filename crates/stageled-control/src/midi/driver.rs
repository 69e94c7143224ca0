//! Control surface connection state machine
//!
//! `Disconnected -> Connecting -> Connected -> (Lost -> Connecting)`.
//! The driver owns the session; the backend only knows how to open one.
//! Control parameters are never reset when the device goes away.

use super::apc::Indicator;
use super::mapper::SurfaceMapper;
use super::MidiMessage;
use crate::Result;
use stageled_core::config::SurfaceConfig;
use stageled_core::{InterfaceState, StageContext};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Opens sessions with a device
pub trait SurfaceBackend: Send {
    /// Session type produced by this backend
    type Session: SurfaceSession;

    /// Open a session with the named device
    fn connect(&mut self, device: &str) -> Result<Self::Session>;
}

/// An open device session
pub trait SurfaceSession {
    /// Wait up to `timeout` for the next event
    ///
    /// `Ok(None)` on timeout; an error means the session is unusable.
    fn poll(&mut self, timeout: Duration) -> Result<Option<MidiMessage>>;

    /// Send one indicator command
    fn send(&mut self, indicator: &Indicator) -> Result<()>;
}

/// Drives one control surface
pub struct SurfaceDriver<B: SurfaceBackend> {
    backend: B,
    mapper: SurfaceMapper,
    device_name: String,
    reconnect_interval: Duration,
    poll_timeout: Duration,
    state: InterfaceState,
    session: Option<B::Session>,
}

impl<B: SurfaceBackend> SurfaceDriver<B> {
    /// Create a driver, initially disconnected
    pub fn new(backend: B, mapper: SurfaceMapper, config: &SurfaceConfig) -> Self {
        Self {
            backend,
            mapper,
            device_name: config.device_name.clone(),
            reconnect_interval: Duration::from_millis(config.reconnect_interval_ms),
            poll_timeout: Duration::from_millis(config.poll_timeout_ms),
            state: InterfaceState::Disconnected,
            session: None,
        }
    }

    /// Current connectivity
    pub fn state(&self) -> InterfaceState {
        self.state
    }

    fn transition(&mut self, ctx: &StageContext, next: InterfaceState) {
        if self.state == next {
            return;
        }

        debug!("Surface {} -> {}", self.state, next);
        self.state = next;
        ctx.lock().interface = next;
    }

    /// Run one step of the state machine
    ///
    /// Never blocks longer than the reconnect interval or the poll timeout.
    pub fn step(&mut self, ctx: &StageContext) {
        if self.session.is_none() {
            self.connect(ctx);
            return;
        }

        let polled = match self.session.as_mut() {
            Some(session) => session.poll(self.poll_timeout),
            None => return,
        };

        match polled {
            Ok(Some(message)) => {
                let indicators = self.mapper.handle(ctx, message);
                if let Err(e) = self.send_all(&indicators) {
                    self.lose(ctx, e);
                }
            }
            Ok(None) => {}
            Err(e) => {
                self.lose(ctx, e);
                return;
            }
        }

        self.refresh_if_stale(ctx);
    }

    /// Resend the full light state after a selection was rolled back
    fn refresh_if_stale(&mut self, ctx: &StageContext) {
        let indicators = {
            let mut state = ctx.lock();
            if !state.surface_stale {
                return;
            }
            state.surface_stale = false;
            self.mapper.initial_indicators(&state)
        };

        debug!("Refreshing surface indicators");
        if let Err(e) = self.send_all(&indicators) {
            self.lose(ctx, e);
        }
    }

    fn connect(&mut self, ctx: &StageContext) {
        if self.state != InterfaceState::Connecting {
            info!("Looking for control surface '{}'", self.device_name);
        }
        self.transition(ctx, InterfaceState::Connecting);

        let session = match self.backend.connect(&self.device_name) {
            Ok(session) => session,
            Err(e) => {
                debug!("Surface not available: {}", e);
                thread::sleep(self.reconnect_interval);
                return;
            }
        };
        self.session = Some(session);

        let indicators = {
            let mut state = ctx.lock();
            state.surface_stale = false;
            self.mapper.initial_indicators(&state)
        };

        match self.send_all(&indicators) {
            Ok(()) => {
                info!("Control surface '{}' initialized", self.device_name);
                self.transition(ctx, InterfaceState::Connected);
            }
            Err(e) => self.lose(ctx, e),
        }
    }

    fn send_all(&mut self, indicators: &[Indicator]) -> Result<()> {
        if let Some(session) = self.session.as_mut() {
            for indicator in indicators {
                session.send(indicator)?;
            }
        }
        Ok(())
    }

    fn lose(&mut self, ctx: &StageContext, error: crate::ControlError) {
        warn!("Control surface disconnected, closing session: {}", error);
        self.session = None;
        self.transition(ctx, InterfaceState::Lost);
    }

    /// Step until shutdown
    pub fn run(&mut self, ctx: &StageContext) {
        info!("Surface driver started");

        while ctx.is_running() {
            self.step(ctx);
        }

        self.session = None;
        info!("Surface driver stopped");
    }
}

impl<B> SurfaceDriver<B>
where
    B: SurfaceBackend + 'static,
{
    /// Build a driver on a named thread and run it until shutdown
    ///
    /// The session never leaves the driver thread.
    pub fn spawn(
        backend: B,
        mapper: SurfaceMapper,
        config: &SurfaceConfig,
        ctx: Arc<StageContext>,
    ) -> Result<JoinHandle<()>> {
        let config = config.clone();
        let handle = thread::Builder::new()
            .name("surface-driver".to_string())
            .spawn(move || Self::new(backend, mapper, &config).run(&ctx))?;
        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ControlError;
    use stageled_core::config::AssetConfig;
    use stageled_core::LedLayout;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Script {
        available: bool,
        events: VecDeque<Result<Option<MidiMessage>>>,
        sent: Vec<Indicator>,
        connects: usize,
    }

    #[derive(Clone, Default)]
    struct MockBackend(Arc<Mutex<Script>>);

    struct MockSession(Arc<Mutex<Script>>);

    impl SurfaceBackend for MockBackend {
        type Session = MockSession;

        fn connect(&mut self, device: &str) -> Result<MockSession> {
            let mut script = self.0.lock().unwrap();
            script.connects += 1;
            if script.available {
                Ok(MockSession(Arc::clone(&self.0)))
            } else {
                Err(ControlError::DeviceNotFound(device.to_string()))
            }
        }
    }

    impl SurfaceSession for MockSession {
        fn poll(&mut self, _timeout: Duration) -> Result<Option<MidiMessage>> {
            self.0.lock().unwrap().events.pop_front().unwrap_or(Ok(None))
        }

        fn send(&mut self, indicator: &Indicator) -> Result<()> {
            self.0.lock().unwrap().sent.push(*indicator);
            Ok(())
        }
    }

    fn driver(backend: MockBackend) -> SurfaceDriver<MockBackend> {
        let config = SurfaceConfig {
            reconnect_interval_ms: 1,
            poll_timeout_ms: 1,
            ..Default::default()
        };
        let mapper = SurfaceMapper::new(&config, &AssetConfig::default());
        SurfaceDriver::new(backend, mapper, &config)
    }

    #[test]
    fn test_retries_until_device_appears() {
        let ctx = StageContext::new(LedLayout::new(1, 4));
        let backend = MockBackend::default();
        let mut driver = driver(backend.clone());

        driver.step(&ctx);
        driver.step(&ctx);
        assert_eq!(driver.state(), InterfaceState::Connecting);
        assert_eq!(ctx.lock().interface, InterfaceState::Connecting);

        backend.0.lock().unwrap().available = true;
        driver.step(&ctx);
        assert_eq!(driver.state(), InterfaceState::Connected);

        let script = backend.0.lock().unwrap();
        assert_eq!(script.connects, 3);
        assert!(!script.sent.is_empty());
    }

    #[test]
    fn test_lost_keeps_params_and_reconnects() {
        let ctx = StageContext::new(LedLayout::new(1, 4));
        let backend = MockBackend::default();
        {
            let mut script = backend.0.lock().unwrap();
            script.available = true;
            script.events.push_back(Ok(Some(MidiMessage::ControlChange {
                channel: 0,
                controller: 56,
                value: 10,
            })));
            script
                .events
                .push_back(Err(ControlError::DeviceLost("unplugged".to_string())));
        }

        let mut driver = driver(backend.clone());
        driver.step(&ctx); // connect
        driver.step(&ctx); // master fader
        driver.step(&ctx); // lost
        assert_eq!(driver.state(), InterfaceState::Lost);
        assert_eq!(ctx.lock().params.master, 20);

        backend.0.lock().unwrap().sent.clear();
        driver.step(&ctx);
        assert_eq!(driver.state(), InterfaceState::Connected);
        assert_eq!(ctx.lock().params.master, 20);
        assert!(!backend.0.lock().unwrap().sent.is_empty());
    }

    #[test]
    fn test_event_indicators_are_sent() {
        let ctx = StageContext::new(LedLayout::new(1, 4));
        let backend = MockBackend::default();
        {
            let mut script = backend.0.lock().unwrap();
            script.available = true;
            script.events.push_back(Ok(Some(MidiMessage::NoteOn {
                channel: 0,
                note: 7,
                velocity: 127,
            })));
        }

        let mut driver = driver(backend.clone());
        driver.step(&ctx);
        backend.0.lock().unwrap().sent.clear();
        driver.step(&ctx);

        let script = backend.0.lock().unwrap();
        assert_eq!(script.sent.len(), 1);
        assert_eq!(script.sent[0].to_bytes(), [0x9B, 7, 3]);
        assert!(ctx.lock().params.blackout);
    }

    #[test]
    fn test_stale_surface_is_relit() {
        let ctx = StageContext::new(LedLayout::new(1, 4));
        let backend = MockBackend::default();
        backend.0.lock().unwrap().available = true;

        let mut driver = driver(backend.clone());
        driver.step(&ctx);
        let initial = backend.0.lock().unwrap().sent.len();
        backend.0.lock().unwrap().sent.clear();

        driver.step(&ctx);
        assert!(backend.0.lock().unwrap().sent.is_empty());

        ctx.lock().surface_stale = true;
        driver.step(&ctx);
        assert_eq!(backend.0.lock().unwrap().sent.len(), initial);
        assert!(!ctx.lock().surface_stale);
    }

    #[test]
    fn test_run_stops_on_shutdown() {
        let ctx = Arc::new(StageContext::new(LedLayout::new(1, 4)));
        let config = SurfaceConfig {
            reconnect_interval_ms: 1,
            ..Default::default()
        };
        let mapper = SurfaceMapper::new(&config, &AssetConfig::default());
        let handle =
            SurfaceDriver::spawn(MockBackend::default(), mapper, &config, Arc::clone(&ctx))
                .unwrap();

        thread::sleep(Duration::from_millis(10));
        ctx.shutdown();
        handle.join().unwrap();
    }
}
