//! Surface event mapping
//!
//! Turns note and controller events into control parameter changes and
//! asset selections, and produces the indicator commands that mirror the
//! new state on the device. The context lock is held only while state
//! changes; indicators are returned so the caller sends them afterwards.

use super::apc::{color, Indicator, LightMode, SingleLight, CLEARED_BUTTONS};
use super::MidiMessage;
use stageled_core::config::{AssetConfig, FullOnMode, SurfaceConfig, SurfaceLayout};
use stageled_core::{expand_slider, Selection, StageContext, StageState};
use tracing::{debug, info};

/// Wake signals to fire once the lock is released
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct Wake {
    preset: bool,
    mask: bool,
}

/// Maps surface events onto the shared state
#[derive(Debug, Clone)]
pub struct SurfaceMapper {
    layout: SurfaceLayout,
    full_on_mode: FullOnMode,
    presets: Vec<String>,
    masks: Vec<String>,
}

impl SurfaceMapper {
    /// Create a mapper for a surface layout and asset slot lists
    pub fn new(surface: &SurfaceConfig, assets: &AssetConfig) -> Self {
        Self {
            layout: surface.layout.clone(),
            full_on_mode: surface.full_on_mode,
            presets: assets.presets.clone(),
            masks: assets.masks.clone(),
        }
    }

    /// Surface layout in use
    pub fn layout(&self) -> &SurfaceLayout {
        &self.layout
    }

    fn preset_name(&self, slot: usize) -> Option<&str> {
        self.presets
            .get(slot)
            .map(String::as_str)
            .filter(|n| !n.is_empty())
    }

    fn mask_name(&self, slot: usize) -> Option<&str> {
        self.masks
            .get(slot)
            .map(String::as_str)
            .filter(|n| !n.is_empty())
    }

    /// Apply one event, returning the indicator updates to send
    pub fn handle(&self, ctx: &StageContext, message: MidiMessage) -> Vec<Indicator> {
        let mut indicators = Vec::new();

        let wake = {
            let mut state = ctx.lock();
            let wake = self.apply(&mut state, message, &mut indicators);
            state.params.recompute_derived();
            wake
        };

        if wake.preset {
            ctx.preset_ready().notify();
        }
        if wake.mask {
            ctx.mask_ready().notify();
        }

        indicators
    }

    fn apply(
        &self,
        state: &mut StageState,
        message: MidiMessage,
        out: &mut Vec<Indicator>,
    ) -> Wake {
        match message {
            MidiMessage::NoteOn { note, .. } => self.note_on(state, note, out),
            MidiMessage::NoteOff { note, .. } => {
                if note == self.layout.full_on && self.full_on_mode == FullOnMode::Momentary {
                    state.params.full_on = false;
                    out.push(self.full_on_indicator(false));
                }
                Wake::default()
            }
            MidiMessage::ControlChange {
                controller, value, ..
            } => {
                if let Some(slider) = self.layout.slider_for(controller) {
                    state.params.set_slider(slider, expand_slider(value));
                } else if controller == self.layout.master_fader {
                    state.params.master = expand_slider(value);
                }
                Wake::default()
            }
        }
    }

    fn note_on(&self, state: &mut StageState, note: u8, out: &mut Vec<Indicator>) -> Wake {
        let layout = &self.layout;

        if let Some(slot) = layout.preset_pads.iter().position(|&p| p == note) {
            let Some(name) = self.preset_name(slot) else {
                return Wake::default();
            };

            if let Some(previous) = &state.preset {
                if let Some(&pad) = layout.preset_pads.get(previous.slot) {
                    out.push(Indicator::pad(LightMode::Solid100, pad, color::PRESETS));
                }
            }
            out.push(Indicator::pad(LightMode::Pulse1_4, note, color::PRESETS));

            info!("Loading preset {}: {}", slot + 1, name);
            state.preset = Some(Selection {
                slot,
                name: name.to_string(),
            });

            return Wake {
                preset: true,
                mask: false,
            };
        }

        if note == layout.mask_reset {
            if let Some(previous) = state.mask_selection.take() {
                info!("Resetting mask layer");

                if let Some(&pad) = layout.mask_pads.get(previous.slot) {
                    out.push(Indicator::pad(LightMode::Solid100, pad, color::MASKS));
                }
                out.push(Indicator::single(layout.mask_reset, SingleLight::Off));

                if state.stage_mask_reset().is_some() {
                    debug!("Dropped unconsumed mask frame");
                }
            }
            return Wake::default();
        }

        if let Some(slot) = layout.mask_pads.iter().position(|&p| p == note) {
            let Some(name) = self.mask_name(slot) else {
                return Wake::default();
            };

            if let Some(previous) = &state.mask_selection {
                if let Some(&pad) = layout.mask_pads.get(previous.slot) {
                    out.push(Indicator::pad(LightMode::Solid100, pad, color::MASKS));
                }
            }
            out.push(Indicator::pad(LightMode::Pulse1_4, note, color::MASKS));
            out.push(Indicator::single(layout.mask_reset, SingleLight::On));

            info!("Loading mask {}: {}", slot + 1, name);
            state.mask_selection = Some(Selection {
                slot,
                name: name.to_string(),
            });

            return Wake {
                preset: false,
                mask: true,
            };
        }

        let params = &mut state.params;

        if note == layout.blackout {
            params.blackout = !params.blackout;
            info!("Blackout {}", if params.blackout { "armed" } else { "released" });
            out.push(self.blackout_indicator(params.blackout));
        }

        if note == layout.full_on {
            params.full_on = match self.full_on_mode {
                FullOnMode::Toggle => !params.full_on,
                FullOnMode::Momentary => true,
            };
            out.push(self.full_on_indicator(params.full_on));
        }

        if let Some(channel) = layout.tint.iter().position(|&t| t == note) {
            let armed = params.toggle_tint(channel);
            out.push(self.tint_indicator(channel, armed));
        }

        if let Some(index) = layout.segment_config.iter().position(|&s| s == note) {
            info!("Configure segments {}", index + 1);
        }

        Wake::default()
    }

    fn blackout_indicator(&self, armed: bool) -> Indicator {
        let mode = if armed {
            LightMode::Blink1_24
        } else {
            LightMode::Solid100
        };
        Indicator::pad(mode, self.layout.blackout, color::BLACKOUT)
    }

    fn full_on_indicator(&self, armed: bool) -> Indicator {
        let mode = if armed {
            LightMode::Solid100
        } else {
            LightMode::Solid10
        };
        Indicator::pad(mode, self.layout.full_on, color::FULL_ON)
    }

    fn tint_indicator(&self, channel: usize, armed: bool) -> Indicator {
        let mode = if armed {
            LightMode::Blink1_8
        } else {
            LightMode::Solid100
        };
        Indicator::pad(mode, self.layout.tint[channel], color::TINT[channel])
    }

    /// Full indicator state for a freshly opened session
    ///
    /// Reflects the retained parameters and selections, so a reconnect
    /// restores what the surface showed before it was lost.
    pub fn initial_indicators(&self, state: &StageState) -> Vec<Indicator> {
        let layout = &self.layout;
        let params = &state.params;
        let mut out = Vec::new();

        for range in CLEARED_BUTTONS {
            for button in range {
                out.push(Indicator::pad(LightMode::Solid10, button, color::BLACK));
            }
        }

        out.push(self.blackout_indicator(params.blackout));
        out.push(self.full_on_indicator(params.full_on));
        for channel in 0..layout.tint.len() {
            out.push(self.tint_indicator(channel, params.tint[channel] != 0));
        }

        for (slot, &pad) in layout.preset_pads.iter().enumerate() {
            if self.preset_name(slot).is_some() {
                out.push(Indicator::pad(LightMode::Solid100, pad, color::PRESETS));
            }
        }

        for (slot, &pad) in layout.mask_pads.iter().enumerate() {
            if self.mask_name(slot).is_some() {
                out.push(Indicator::pad(LightMode::Solid100, pad, color::MASKS));
            }
        }

        if let Some(&pad) = state.preset.as_ref().and_then(|s| layout.preset_pads.get(s.slot)) {
            out.push(Indicator::pad(LightMode::Pulse1_4, pad, color::PRESETS));
        }

        if let Some(&pad) = state
            .mask_selection
            .as_ref()
            .and_then(|s| layout.mask_pads.get(s.slot))
        {
            out.push(Indicator::pad(LightMode::Pulse1_4, pad, color::MASKS));
            out.push(Indicator::single(layout.mask_reset, SingleLight::On));
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stageled_core::{LedLayout, Pending};
    use std::time::Duration;

    fn setup() -> (StageContext, SurfaceMapper) {
        let ctx = StageContext::new(LedLayout::new(2, 4));
        let mapper = SurfaceMapper::new(&SurfaceConfig::default(), &AssetConfig::default());
        (ctx, mapper)
    }

    fn note_on(note: u8) -> MidiMessage {
        MidiMessage::NoteOn {
            channel: 0,
            note,
            velocity: 127,
        }
    }

    fn cc(controller: u8, value: u8) -> MidiMessage {
        MidiMessage::ControlChange {
            channel: 0,
            controller,
            value,
        }
    }

    #[test]
    fn test_preset_select_and_switch() {
        let (ctx, mapper) = setup();

        let first = mapper.handle(&ctx, note_on(0x38));
        assert_eq!(first, vec![Indicator::pad(LightMode::Pulse1_4, 0x38, 13)]);
        assert_eq!(ctx.lock().preset.as_ref().map(|s| s.slot), Some(0));
        assert!(ctx.preset_ready().wait(Duration::from_millis(10)));

        let second = mapper.handle(&ctx, note_on(0x39));
        assert_eq!(
            second,
            vec![
                Indicator::pad(LightMode::Solid100, 0x38, 13),
                Indicator::pad(LightMode::Pulse1_4, 0x39, 13),
            ]
        );
        assert_eq!(
            ctx.lock().preset.as_ref().map(|s| s.name.clone()),
            Some("thunder-colors-1.png".to_string())
        );
    }

    #[test]
    fn test_empty_preset_slot_ignored() {
        let (ctx, mapper) = setup();
        // slot 8 is empty by default
        assert!(mapper.handle(&ctx, note_on(0x30)).is_empty());
        assert!(ctx.lock().preset.is_none());
        assert!(!ctx.preset_ready().wait(Duration::from_millis(5)));
    }

    #[test]
    fn test_mask_select_and_reset() {
        let (ctx, mapper) = setup();

        // reset without active mask does nothing
        assert!(mapper.handle(&ctx, note_on(0x70)).is_empty());
        assert!(ctx.lock().pending_mask.is_none());

        let select = mapper.handle(&ctx, note_on(0x21));
        assert_eq!(
            select,
            vec![
                Indicator::pad(LightMode::Pulse1_4, 0x21, 53),
                Indicator::single(0x70, SingleLight::On),
            ]
        );
        assert!(ctx.mask_ready().wait(Duration::from_millis(10)));

        let reset = mapper.handle(&ctx, note_on(0x70));
        assert_eq!(
            reset,
            vec![
                Indicator::pad(LightMode::Solid100, 0x21, 53),
                Indicator::single(0x70, SingleLight::Off),
            ]
        );

        let mut state = ctx.lock();
        assert!(state.mask_selection.is_none());
        assert!(matches!(state.pending_mask.take(), Pending::ResetMask));
    }

    #[test]
    fn test_blackout_toggle() {
        let (ctx, mapper) = setup();

        let armed = mapper.handle(&ctx, note_on(7));
        assert_eq!(armed, vec![Indicator::pad(LightMode::Blink1_24, 7, 3)]);
        assert!(ctx.lock().params.blackout);

        let idle = mapper.handle(&ctx, note_on(7));
        assert_eq!(idle, vec![Indicator::pad(LightMode::Solid100, 7, 3)]);
        assert!(!ctx.lock().params.blackout);
    }

    #[test]
    fn test_full_on_toggle_ignores_release() {
        let (ctx, mapper) = setup();
        mapper.handle(&ctx, note_on(6));
        assert!(ctx.lock().params.full_on);

        let release = MidiMessage::NoteOff {
            channel: 0,
            note: 6,
        };
        assert!(mapper.handle(&ctx, release).is_empty());
        assert!(ctx.lock().params.full_on);

        mapper.handle(&ctx, note_on(6));
        assert!(!ctx.lock().params.full_on);
    }

    #[test]
    fn test_full_on_momentary() {
        let ctx = StageContext::new(LedLayout::new(2, 4));
        let surface = SurfaceConfig {
            full_on_mode: FullOnMode::Momentary,
            ..Default::default()
        };
        let mapper = SurfaceMapper::new(&surface, &AssetConfig::default());

        mapper.handle(&ctx, note_on(6));
        mapper.handle(&ctx, note_on(6));
        assert!(ctx.lock().params.full_on);

        let release = mapper.handle(
            &ctx,
            MidiMessage::NoteOff {
                channel: 0,
                note: 6,
            },
        );
        assert_eq!(release, vec![Indicator::pad(LightMode::Solid10, 6, 3)]);
        assert!(!ctx.lock().params.full_on);
    }

    #[test]
    fn test_tint_toggle() {
        let (ctx, mapper) = setup();
        let armed = mapper.handle(&ctx, note_on(1));
        assert_eq!(armed, vec![Indicator::pad(LightMode::Blink1_8, 1, 21)]);
        assert_eq!(ctx.lock().params.tint, [0, 255, 0]);

        let idle = mapper.handle(&ctx, note_on(1));
        assert_eq!(idle, vec![Indicator::pad(LightMode::Solid100, 1, 21)]);
        assert_eq!(ctx.lock().params.tint, [0, 0, 0]);
    }

    #[test]
    fn test_faders_and_derived() {
        let (ctx, mapper) = setup();

        mapper.handle(&ctx, cc(56, 127));
        mapper.handle(&ctx, cc(48, 64));
        mapper.handle(&ctx, cc(55, 125));
        mapper.handle(&ctx, cc(54, 98));

        let state = ctx.lock();
        assert_eq!(state.params.master, 255);
        assert_eq!(state.params.sliders[0], 128);
        assert_eq!(state.params.sliders[7], 250);
        assert_eq!(state.params.frame_delay, Duration::from_micros(4_000));
        assert_eq!(state.params.strobe.rate, 196);
    }

    #[test]
    fn test_strobe_released_resets_phase() {
        let (ctx, mapper) = setup();
        mapper.handle(&ctx, cc(54, 98));
        {
            let mut state = ctx.lock();
            state.params.strobe.phase = 3;
            state.params.strobe.on = true;
        }

        mapper.handle(&ctx, cc(54, 0));
        let state = ctx.lock();
        assert_eq!(state.params.strobe.phase, 0);
        assert!(!state.params.strobe.on);
    }

    #[test]
    fn test_segment_config_is_log_only() {
        let (ctx, mapper) = setup();
        let before = ctx.lock().params.clone();
        assert!(mapper.handle(&ctx, note_on(101)).is_empty());
        assert_eq!(ctx.lock().params, before);
    }

    #[test]
    fn test_initial_indicators_reflect_state() {
        let (ctx, mapper) = setup();
        mapper.handle(&ctx, note_on(0x3a));
        mapper.handle(&ctx, note_on(0x20));
        mapper.handle(&ctx, note_on(7));

        let state = ctx.lock();
        let init = mapper.initial_indicators(&state);

        assert_eq!(init[0], Indicator::pad(LightMode::Solid10, 0, 0));
        assert!(init.contains(&Indicator::pad(LightMode::Blink1_24, 7, 3)));
        assert!(init.contains(&Indicator::pad(LightMode::Solid10, 6, 3)));
        assert!(init.contains(&Indicator::pad(LightMode::Solid100, 0, 5)));
        assert!(init.contains(&Indicator::pad(LightMode::Solid100, 0x2f, 13)));
        assert!(init.contains(&Indicator::pad(LightMode::Pulse1_4, 0x3a, 13)));
        assert!(init.contains(&Indicator::pad(LightMode::Pulse1_4, 0x20, 53)));
        assert_eq!(init.last(), Some(&Indicator::single(0x70, SingleLight::On)));
        // empty preset slot 8 stays dark
        assert!(!init.contains(&Indicator::pad(LightMode::Solid100, 0x30, 13)));
    }
}
