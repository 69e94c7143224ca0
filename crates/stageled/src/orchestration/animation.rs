//! Animation engine
//!
//! Advances one row of the current preset and mask per tick and publishes
//! them as the live and mask LED buffers. Preset and mask advance
//! independently, each wrapping at its own frame height.

use stageled_core::{FrameStore, Pending, Pixel, StageContext};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info};

/// Row cursor over the current preset and mask
pub struct AnimationEngine {
    preset: Option<FrameStore>,
    mask: Option<FrameStore>,
    preset_row: usize,
    mask_row: usize,
    live_buf: Vec<Pixel>,
    mask_buf: Vec<Pixel>,
}

impl AnimationEngine {
    /// Create an engine with black buffers for `led_count` LEDs
    pub fn new(led_count: usize) -> Self {
        Self {
            preset: None,
            mask: None,
            preset_row: 0,
            mask_row: 0,
            live_buf: vec![Pixel::BLACK; led_count],
            mask_buf: vec![Pixel::BLACK; led_count],
        }
    }

    /// Current preset row
    pub fn preset_row(&self) -> usize {
        self.preset_row
    }

    /// Current mask row
    pub fn mask_row(&self) -> usize {
        self.mask_row
    }

    /// Consume pending frames, publish the current rows, return the tick delay
    pub fn step(&mut self, ctx: &StageContext) -> Duration {
        let (preset, mask) = {
            let mut state = ctx.lock();
            let mask = state.pending_mask.take();
            if matches!(mask, Pending::ResetMask) {
                state.mask.fill(Pixel::BLACK);
            }
            (state.pending_preset.take(), mask)
        };

        if let Pending::Frame(frame) = preset {
            debug!("Animation: switching preset ({} rows)", frame.height());
            self.preset = Some(frame);
            self.preset_row = 0;
        }

        match mask {
            Pending::Frame(frame) => {
                debug!("Animation: switching mask ({} rows)", frame.height());
                self.mask = Some(frame);
                self.mask_row = 0;
            }
            Pending::ResetMask => {
                debug!("Animation: mask cleared");
                self.mask = None;
                self.mask_row = 0;
                self.mask_buf.fill(Pixel::BLACK);
            }
            Pending::None => {}
        }

        if let Some(frame) = &self.preset {
            frame.copy_row_into(self.preset_row, &mut self.live_buf);
        }
        if let Some(frame) = &self.mask {
            frame.copy_row_into(self.mask_row, &mut self.mask_buf);
        }

        let mut state = ctx.lock();
        if self.preset.is_some() {
            state.live.copy_from_slice(&self.live_buf);
        }
        if self.mask.is_some() {
            state.mask.copy_from_slice(&self.mask_buf);
        }
        state.params.frame_delay
    }

    /// Move both cursors to the next row
    pub fn advance(&mut self) {
        if let Some(frame) = &self.preset {
            self.preset_row = (self.preset_row + 1) % frame.height();
        }
        if let Some(frame) = &self.mask {
            self.mask_row = (self.mask_row + 1) % frame.height();
        }
    }

    /// Tick until shutdown
    pub fn run(&mut self, ctx: &StageContext) {
        info!("Animation engine started");

        while ctx.is_running() {
            let delay = self.step(ctx);
            thread::sleep(delay);
            self.advance();
        }

        info!("Animation engine stopped");
    }

    /// Run the engine on a named thread
    pub fn spawn(mut self, ctx: Arc<StageContext>) -> std::io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name("animation".to_string())
            .spawn(move || self.run(&ctx))
    }
}
