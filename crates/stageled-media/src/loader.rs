//! Background asset loaders
//!
//! One loader thread per asset kind. A loader sleeps on its wake signal,
//! reads the current selection under the context lock, decodes with the
//! lock released and then stages the frame in the pending slot. The
//! animation engine swaps it in on its next tick.
//!
//! The selection is checked again before staging: a frame whose selection
//! was replaced or reset during the decode is dropped. A failed decode
//! puts the selection back to the last asset that loaded, so the state
//! names what is actually playing.

use crate::image_decoder::AssetDecoder;
use crate::Result;
use stageled_core::{FrameStore, Selection, Signal, StageContext, StageState};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

/// How long a loader blocks before re-checking the shutdown flag
const WAKE_TIMEOUT: Duration = Duration::from_millis(100);

/// Which pending slot a loader feeds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    /// Animation presets
    Preset,
    /// Attenuation masks
    Mask,
}

impl AssetKind {
    /// Short name used for thread names and logs
    pub fn label(self) -> &'static str {
        match self {
            Self::Preset => "preset",
            Self::Mask => "mask",
        }
    }

    fn signal(self, ctx: &StageContext) -> &Signal {
        match self {
            Self::Preset => ctx.preset_ready(),
            Self::Mask => ctx.mask_ready(),
        }
    }

    fn selection(self, state: &StageState) -> Option<Selection> {
        match self {
            Self::Preset => state.preset.clone(),
            Self::Mask => state.mask_selection.clone(),
        }
    }

    fn selection_mut(self, state: &mut StageState) -> &mut Option<Selection> {
        match self {
            Self::Preset => &mut state.preset,
            Self::Mask => &mut state.mask_selection,
        }
    }

    fn loaded_mut(self, state: &mut StageState) -> &mut Option<Selection> {
        match self {
            Self::Preset => &mut state.loaded_preset,
            Self::Mask => &mut state.loaded_mask,
        }
    }

    fn stage(self, state: &mut StageState, frame: FrameStore) -> Option<FrameStore> {
        match self {
            Self::Preset => state.stage_preset(frame),
            Self::Mask => state.stage_mask(frame),
        }
    }
}

/// Loader for one asset kind
pub struct Loader<D: AssetDecoder> {
    kind: AssetKind,
    decoder: D,
}

impl<D: AssetDecoder + 'static> Loader<D> {
    /// Create a loader
    pub fn new(kind: AssetKind, decoder: D) -> Self {
        Self { kind, decoder }
    }

    /// Kind of asset this loader feeds
    pub fn kind(&self) -> AssetKind {
        self.kind
    }

    /// Load the currently selected asset into the pending slot
    ///
    /// Returns true when a frame was staged. A failed decode leaves the
    /// pending slot and the current animation untouched.
    pub fn load_selected(&self, ctx: &StageContext) -> bool {
        let selection = {
            let state = ctx.lock();
            self.kind.selection(&state)
        };

        let Some(selection) = selection else {
            debug!("No {} selected, nothing to load", self.kind.label());
            return false;
        };

        info!(
            "Loading {} {} (slot {})",
            self.kind.label(),
            selection.name,
            selection.slot
        );

        let decoded = self.decoder.decode(&selection.name);

        let mut state = ctx.lock();
        if self.kind.selection(&state).as_ref() != Some(&selection) {
            drop(state);
            debug!(
                "{} {} deselected while loading, dropped",
                self.kind.label(),
                selection.name
            );
            return false;
        }

        let frame = match decoded {
            Ok(frame) => frame,
            Err(e) => {
                let restored = self.kind.loaded_mut(&mut state).clone();
                *self.kind.selection_mut(&mut state) = restored.clone();
                state.surface_stale = true;
                drop(state);

                warn!("Could not load {} {}: {}", self.kind.label(), selection.name, e);
                if let Some(previous) = restored {
                    debug!("Keeping {} {}", self.kind.label(), previous.name);
                }
                return false;
            }
        };

        let stale = self.kind.stage(&mut state, frame);
        *self.kind.loaded_mut(&mut state) = Some(selection);
        drop(state);

        if stale.is_some() {
            debug!("Dropped unconsumed {} frame", self.kind.label());
        }

        true
    }

    /// Block on the wake signal until shutdown, loading on every wakeup
    pub fn run(&self, ctx: &StageContext) {
        info!("{} loader started", self.kind.label());

        while ctx.is_running() {
            if self.kind.signal(ctx).wait(WAKE_TIMEOUT) {
                self.load_selected(ctx);
            }
        }

        info!("{} loader stopped", self.kind.label());
    }

    /// Run the loader on a named thread
    pub fn spawn(self, ctx: Arc<StageContext>) -> Result<JoinHandle<()>> {
        let handle = thread::Builder::new()
            .name(format!("{}-loader", self.kind.label()))
            .spawn(move || self.run(&ctx))?;
        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MediaError;
    use stageled_core::{LedLayout, Pending};
    use std::sync::{mpsc, Mutex};

    struct Fixed;

    impl AssetDecoder for Fixed {
        fn decode(&self, name: &str) -> Result<FrameStore> {
            match name {
                "bad.png" => Err(MediaError::DecoderError("corrupt".to_string())),
                _ => Ok(FrameStore::new(2, 1, vec![name.len() as u32; 2])?),
            }
        }
    }

    fn select(ctx: &StageContext, kind: AssetKind, name: &str) {
        let selection = Some(Selection {
            slot: 0,
            name: name.to_string(),
        });
        let mut state = ctx.lock();
        match kind {
            AssetKind::Preset => state.preset = selection,
            AssetKind::Mask => state.mask_selection = selection,
        }
    }

    #[test]
    fn test_nothing_selected() {
        let ctx = StageContext::new(LedLayout::new(1, 2));
        let loader = Loader::new(AssetKind::Preset, Fixed);
        assert!(!loader.load_selected(&ctx));
        assert!(ctx.lock().pending_preset.is_none());
    }

    #[test]
    fn test_stages_into_matching_slot() {
        let ctx = StageContext::new(LedLayout::new(1, 2));
        select(&ctx, AssetKind::Mask, "m.png");

        let loader = Loader::new(AssetKind::Mask, Fixed);
        assert!(loader.load_selected(&ctx));

        let mut state = ctx.lock();
        assert!(state.pending_preset.is_none());
        assert!(matches!(state.pending_mask.take(), Pending::Frame(_)));
    }

    #[test]
    fn test_failed_decode_keeps_pending() {
        let ctx = StageContext::new(LedLayout::new(1, 2));
        let loader = Loader::new(AssetKind::Preset, Fixed);

        select(&ctx, AssetKind::Preset, "good.png");
        assert!(loader.load_selected(&ctx));

        select(&ctx, AssetKind::Preset, "bad.png");
        assert!(!loader.load_selected(&ctx));

        match ctx.lock().pending_preset.take() {
            Pending::Frame(frame) => assert_eq!(frame.pixels()[0], 8),
            other => panic!("unexpected slot content: {:?}", other),
        };
    }

    #[test]
    fn test_failed_decode_restores_loaded_selection() {
        let ctx = StageContext::new(LedLayout::new(1, 2));
        let loader = Loader::new(AssetKind::Preset, Fixed);

        select(&ctx, AssetKind::Preset, "good.png");
        assert!(loader.load_selected(&ctx));
        select(&ctx, AssetKind::Preset, "bad.png");
        assert!(!loader.load_selected(&ctx));

        let state = ctx.lock();
        assert_eq!(state.preset.as_ref().map(|s| s.name.as_str()), Some("good.png"));
        assert_eq!(state.loaded_preset, state.preset);
        assert!(state.surface_stale);
    }

    #[test]
    fn test_failed_first_mask_clears_selection() {
        let ctx = StageContext::new(LedLayout::new(1, 2));
        select(&ctx, AssetKind::Mask, "bad.png");

        assert!(!Loader::new(AssetKind::Mask, Fixed).load_selected(&ctx));
        assert!(ctx.lock().mask_selection.is_none());
    }

    /// Blocks inside `decode` until the test releases it
    struct Gated {
        entered: mpsc::Sender<()>,
        release: Mutex<mpsc::Receiver<()>>,
    }

    impl AssetDecoder for Gated {
        fn decode(&self, name: &str) -> Result<FrameStore> {
            let _ = self.entered.send(());
            let _ = self.release.lock().unwrap().recv();
            Ok(FrameStore::new(2, 1, vec![name.len() as u32; 2])?)
        }
    }

    fn gated_load(
        ctx: &Arc<StageContext>,
        kind: AssetKind,
    ) -> (mpsc::Receiver<()>, mpsc::Sender<()>, JoinHandle<bool>) {
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let loader = Loader::new(
            kind,
            Gated {
                entered: entered_tx,
                release: Mutex::new(release_rx),
            },
        );

        let ctx = Arc::clone(ctx);
        let handle = thread::spawn(move || loader.load_selected(&ctx));
        (entered_rx, release_tx, handle)
    }

    #[test]
    fn test_mask_reset_during_decode_wins() {
        let ctx = Arc::new(StageContext::new(LedLayout::new(1, 2)));
        select(&ctx, AssetKind::Mask, "slow.png");

        let (entered, release, handle) = gated_load(&ctx, AssetKind::Mask);
        entered.recv().unwrap();
        {
            let mut state = ctx.lock();
            state.mask_selection = None;
            state.stage_mask_reset();
        }
        release.send(()).unwrap();

        assert!(!handle.join().unwrap());
        let state = ctx.lock();
        assert!(state.mask_selection.is_none());
        assert!(matches!(state.pending_mask, Pending::ResetMask));
        assert!(state.loaded_mask.is_none());
    }

    #[test]
    fn test_superseded_selection_is_dropped() {
        let ctx = Arc::new(StageContext::new(LedLayout::new(1, 2)));
        select(&ctx, AssetKind::Preset, "first.png");

        let (entered, release, handle) = gated_load(&ctx, AssetKind::Preset);
        entered.recv().unwrap();
        select(&ctx, AssetKind::Preset, "second.png");
        release.send(()).unwrap();

        assert!(!handle.join().unwrap());
        let state = ctx.lock();
        assert!(state.pending_preset.is_none());
        assert_eq!(state.preset.as_ref().map(|s| s.name.as_str()), Some("second.png"));
    }

    #[test]
    fn test_thread_loads_on_signal() {
        let ctx = Arc::new(StageContext::new(LedLayout::new(1, 2)));
        select(&ctx, AssetKind::Preset, "thread.png");

        let handle = Loader::new(AssetKind::Preset, Fixed)
            .spawn(Arc::clone(&ctx))
            .unwrap();
        ctx.preset_ready().notify();

        let mut staged = false;
        for _ in 0..200 {
            if !ctx.lock().pending_preset.is_none() {
                staged = true;
                break;
            }
            thread::sleep(Duration::from_millis(5));
        }

        ctx.shutdown();
        handle.join().unwrap();
        assert!(staged);
    }
}
