//! Transform and dispatch engine
//!
//! Runs on a fixed-period clock independent of the animation rate. Each
//! cycle snapshots the live and mask buffers with the control parameters,
//! runs the color transform outside the lock, publishes the preview and
//! monitor buffers, and sends the bitmap to the remote driver once its
//! address is known.

use stageled_control::BitmapSender;
use stageled_core::{Pixel, SegmentGroups, StageContext, TransformInput, Transformer};
use std::net::SocketAddr;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{info, trace, warn};

/// What one cycle did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    /// Where the bitmap went, `None` while no target is known
    pub target: Option<SocketAddr>,
    /// Transform duration
    pub transform_time: Duration,
}

/// Fixed-rate transform and transmission
pub struct DispatchEngine {
    transformer: Transformer,
    sender: BitmapSender,
    live: Vec<Pixel>,
    mask: Vec<Pixel>,
    period: Duration,
}

impl DispatchEngine {
    /// Create an engine for the context's layout
    pub fn new(
        ctx: &StageContext,
        groups: SegmentGroups,
        sender: BitmapSender,
        period: Duration,
    ) -> Self {
        let layout = *ctx.layout();
        let leds = layout.led_count();
        Self {
            transformer: Transformer::new(layout, groups),
            sender,
            live: vec![Pixel::BLACK; leds],
            mask: vec![Pixel::BLACK; leds],
            period,
        }
    }

    /// Run one dispatch cycle
    pub fn cycle(&mut self, ctx: &StageContext) -> CycleReport {
        let (input, target) = {
            let mut guard = ctx.lock();
            let state = &mut *guard;
            self.live.copy_from_slice(&state.live);
            self.mask.copy_from_slice(&state.mask);
            (TransformInput::capture(&mut state.params), state.remote_addr)
        };

        let started = Instant::now();
        self.transformer.run(&self.live, &self.mask, &input);
        let transform_time = started.elapsed();

        {
            let mut state = ctx.lock();
            state.preview.copy_from_slice(self.transformer.preview());
            state.monitor.copy_from_slice(self.transformer.monitor());
            state.local.frames += 1;
            state.local.transform_time = transform_time;
        }

        if let Some(target) = target {
            // failures are logged by the sender on state change only
            let _ = self.sender.send(self.transformer.bitmap(), target);
        } else {
            trace!("No remote address yet, skipping transmission");
        }

        CycleReport {
            target,
            transform_time,
        }
    }

    /// Cycle at the fixed period until shutdown
    pub fn run(&mut self, ctx: &StageContext) {
        info!(
            "Dispatch engine started ({:.1} fps)",
            1.0 / self.period.as_secs_f64()
        );

        let mut deadline = Instant::now();
        while ctx.is_running() {
            self.cycle(ctx);

            deadline += self.period;
            let now = Instant::now();
            if deadline > now {
                thread::sleep(deadline - now);
            } else if now - deadline > self.period {
                warn!(
                    "Dispatch engine fell behind by {:?}, resetting clock",
                    now - deadline
                );
                deadline = now;
            }
        }

        info!("Dispatch engine stopped");
    }

    /// Run the engine on a named thread
    pub fn spawn(mut self, ctx: Arc<StageContext>) -> std::io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name("dispatch".to_string())
            .spawn(move || self.run(&ctx))
    }
}
