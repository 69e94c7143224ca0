//! Layered color transform applied before every dispatch
//!
//! Order of the passes:
//! 1. preview capture (input as-is)
//! 2. full-on override
//! 3. tint
//! 4. per-segment attenuation
//! 5. mask
//! 6. master / blackout / strobe gate
//! 7. serialization to the RGB wire bitmap

use crate::layout::{LedLayout, SegmentGroups};
use crate::params::{ControlParams, SLIDER_COUNT};
use crate::pixel::{scale_channel, Pixel};

/// Parameter snapshot for one transform pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransformInput {
    /// Master level
    pub master: u8,
    /// Blackout armed
    pub blackout: bool,
    /// Full-on override armed
    pub full_on: bool,
    /// Tint toggles, each channel is multiplied by `(255 - t) / 255`
    pub tint: [u8; 3],
    /// Slider values; slider `n` attenuates segment group `n`
    pub sliders: [u8; SLIDER_COUNT],
    /// Strobe gate lit (always true when strobe is off)
    pub strobe_open: bool,
}

impl Default for TransformInput {
    /// Identity transform
    fn default() -> Self {
        Self {
            master: 255,
            blackout: false,
            full_on: false,
            tint: [0; 3],
            sliders: [255; SLIDER_COUNT],
            strobe_open: true,
        }
    }
}

impl TransformInput {
    /// Snapshot the control parameters, advancing the strobe by one cycle
    ///
    /// Must be called exactly once per dispatch cycle while holding the
    /// context lock, since it mutates the strobe phase.
    pub fn capture(params: &mut ControlParams) -> Self {
        let strobe_open = params.strobe.tick(params.blackout, &params.strobe_timing);

        Self {
            master: params.master,
            blackout: params.blackout,
            full_on: params.full_on,
            tint: params.tint,
            sliders: params.sliders,
            strobe_open,
        }
    }

    /// Master after blackout and strobe gating
    pub fn effective_master(&self) -> u8 {
        if self.blackout || !self.strobe_open {
            0
        } else {
            self.master
        }
    }
}

/// Owns the transform work buffers, sized once for the LED layout
pub struct Transformer {
    layout: LedLayout,
    groups: SegmentGroups,
    preview: Vec<Pixel>,
    monitor: Vec<Pixel>,
    bitmap: Vec<u8>,
}

impl Transformer {
    /// Allocate buffers for a layout
    pub fn new(layout: LedLayout, groups: SegmentGroups) -> Self {
        let leds = layout.led_count();
        Self {
            layout,
            groups,
            preview: vec![Pixel::BLACK; leds],
            monitor: vec![Pixel::BLACK; leds],
            bitmap: vec![0; layout.bitmap_len()],
        }
    }

    /// Layout the buffers are sized for
    pub fn layout(&self) -> &LedLayout {
        &self.layout
    }

    /// Input exactly as received (before any pass)
    pub fn preview(&self) -> &[Pixel] {
        &self.preview
    }

    /// Output after every pass
    pub fn monitor(&self) -> &[Pixel] {
        &self.monitor
    }

    /// Serialized RGB bitmap of the monitor buffer
    pub fn bitmap(&self) -> &[u8] {
        &self.bitmap
    }

    /// Run the full pipeline over one live/mask snapshot
    ///
    /// `live` and `mask` must both be LED-array sized.
    pub fn run(&mut self, live: &[Pixel], mask: &[Pixel], input: &TransformInput) -> &[u8] {
        debug_assert_eq!(live.len(), self.monitor.len());
        debug_assert_eq!(mask.len(), self.monitor.len());

        self.preview.copy_from_slice(live);
        self.monitor.copy_from_slice(live);

        let master = input.effective_master();

        if input.full_on {
            let fill = if master == 0 { Pixel::BLACK } else { Pixel::WHITE };
            self.monitor.fill(fill);
        } else {
            self.apply_tint(&input.tint);
            self.apply_segments(&input.sliders);
            self.apply_mask(mask);
            self.apply_master(master);
        }

        self.serialize();
        &self.bitmap
    }

    fn apply_tint(&mut self, tint: &[u8; 3]) {
        if tint.iter().all(|&t| t == 0) {
            return;
        }

        let [red, green, blue] = tint.map(|t| 255 - t);
        for pixel in &mut self.monitor {
            pixel.r = scale_channel(pixel.r, red);
            pixel.g = scale_channel(pixel.g, green);
            pixel.b = scale_channel(pixel.b, blue);
        }
    }

    fn apply_segments(&mut self, sliders: &[u8; SLIDER_COUNT]) {
        for (group, &level) in sliders.iter().enumerate().take(self.groups.len()) {
            // top of the slider means the group is not attenuated at all
            if level == 255 {
                continue;
            }

            for range in self.groups.led_ranges(group, &self.layout) {
                for pixel in &mut self.monitor[range] {
                    pixel.scale(level);
                }
            }
        }
    }

    fn apply_mask(&mut self, mask: &[Pixel]) {
        for (pixel, layer) in self.monitor.iter_mut().zip(mask) {
            if !layer.is_zero() {
                pixel.scale(255 - layer.a);
            }
        }
    }

    fn apply_master(&mut self, master: u8) {
        match master {
            0 => self.monitor.fill(Pixel::BLACK),
            255 => {}
            level => {
                for pixel in &mut self.monitor {
                    pixel.scale(level);
                }
            }
        }
    }

    fn serialize(&mut self) {
        for (out, pixel) in self.bitmap.chunks_exact_mut(3).zip(&self.monitor) {
            out[0] = pixel.r;
            out[1] = pixel.g;
            out[2] = pixel.b;
        }
    }
}
