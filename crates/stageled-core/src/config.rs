//! Installation configuration
//!
//! Loaded once at startup from a TOML file. Every field has a default
//! matching the reference installation (24 x 120 LEDs, APC mini mk2
//! surface, remote driver on UDP port 1111). Runtime changes made from
//! the surface are never written back.

use crate::layout::{LedLayout, SegmentGroups};
use crate::logging::LogConfig;
use crate::params::{ControlParams, SliderRoles, StrobeTiming, SLIDER_COUNT};
use crate::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StageConfig {
    /// Physical LED layout
    pub layout: LedLayout,
    /// Segment groups driven by the first sliders
    pub segment_groups: SegmentGroups,
    /// Animation library
    pub assets: AssetConfig,
    /// Remote driver transport
    pub network: NetworkConfig,
    /// Control surface
    pub surface: SurfaceConfig,
    /// Fader roles
    pub sliders: SliderRoles,
    /// Strobe timing constants
    pub strobe: StrobeTiming,
    /// Control values used until the surface reports otherwise
    pub initial: InitialControls,
    /// Status summary period in seconds (0 disables)
    pub status_interval_secs: u64,
    /// Logging
    pub log: LogConfig,
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            layout: LedLayout::default(),
            segment_groups: SegmentGroups::default(),
            assets: AssetConfig::default(),
            network: NetworkConfig::default(),
            surface: SurfaceConfig::default(),
            sliders: SliderRoles::default(),
            strobe: StrobeTiming::default(),
            initial: InitialControls::default(),
            status_interval_secs: 5,
            log: LogConfig::default(),
        }
    }
}

/// Animation library configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetConfig {
    /// Directory asset names are resolved against
    pub directory: PathBuf,
    /// Preset slots, one per preset pad; empty names leave the pad unused
    pub presets: Vec<String>,
    /// Mask slots, one per mask pad
    pub masks: Vec<String>,
    /// Preset slot loaded at startup
    pub initial_preset: usize,
}

fn slots(names: &[(usize, &str)], total: usize) -> Vec<String> {
    let mut list = vec![String::new(); total];
    for &(index, name) in names {
        list[index] = name.to_string();
    }
    list
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("templates"),
            presets: slots(
                &[
                    (0, "debug.png"),
                    (1, "thunder-colors-1.png"),
                    (2, "thunder-colors-2.png"),
                    (3, "thunder-colors-3.png"),
                    (4, "thunder-test.png"),
                    (5, "linear-solid.png"),
                    (6, "rainbow.png"),
                    (7, "testku.png"),
                    (22, "full-black.png"),
                    (23, "full.png"),
                ],
                24,
            ),
            masks: slots(
                &[
                    (0, "mask-diagonal.png"),
                    (1, "mask-holes.png"),
                    (2, "mask-thunder.png"),
                    (3, "mask-thunder-1.png"),
                    (4, "mask-thunder-2.png"),
                    (5, "mask-thunder-front-string.png"),
                    (6, "mask-thunder-full-string.png"),
                    (7, "mask-thunder-segment-smooth.png"),
                    (8, "mask-thunder-segment-smooth-2.png"),
                    (9, "mask-thunder-pattern-1.png"),
                    (10, "mask-thunder-pattern-2.png"),
                    (11, "mask-segments-roll.png"),
                    (12, "mask-smooth-cross.png"),
                ],
                24,
            ),
            initial_preset: 0,
        }
    }
}

impl AssetConfig {
    /// Name in a preset slot
    pub fn preset(&self, slot: usize) -> Option<&str> {
        self.presets
            .get(slot)
            .map(String::as_str)
            .filter(|n| !n.is_empty())
    }

    /// Name in a mask slot
    pub fn mask(&self, slot: usize) -> Option<&str> {
        self.masks
            .get(slot)
            .map(String::as_str)
            .filter(|n| !n.is_empty())
    }

    /// Full path of an asset
    pub fn resolve(&self, name: &str) -> PathBuf {
        self.directory.join(name)
    }
}

/// Remote driver transport configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Port bitmaps are sent to on the remote driver
    pub remote_port: u16,
    /// Local port telemetry is received on
    pub feedback_port: u16,
    /// Receive poll interval of the feedback listener
    pub feedback_timeout_ms: u64,
    /// Dispatch rate
    pub target_fps: u32,
    /// Remote host to send to before any telemetry arrives
    pub static_target: Option<String>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            remote_port: 1111,
            feedback_port: 1111,
            feedback_timeout_ms: 10,
            target_fps: crate::TARGET_FPS,
            static_target: None,
        }
    }
}

impl NetworkConfig {
    /// Period of the dispatch clock
    pub fn frame_period(&self) -> Duration {
        Duration::from_micros(1_000_000 / self.target_fps.max(1) as u64)
    }

    /// Receive timeout of the feedback listener
    pub fn feedback_timeout(&self) -> Duration {
        Duration::from_millis(self.feedback_timeout_ms.max(1))
    }
}

/// How the full-on button behaves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FullOnMode {
    /// Each press flips the override
    #[default]
    Toggle,
    /// Override held while the button is down
    Momentary,
}

/// Note and controller numbers of the control surface
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SurfaceLayout {
    /// Pad notes for preset slots, in slot order
    pub preset_pads: Vec<u8>,
    /// Pad notes for mask slots, in slot order
    pub mask_pads: Vec<u8>,
    /// Mask reset button note
    pub mask_reset: u8,
    /// Blackout toggle note
    pub blackout: u8,
    /// Full-on note
    pub full_on: u8,
    /// Red, green, blue tint toggle notes
    pub tint: [u8; 3],
    /// Segment configuration buttons (logged only)
    pub segment_config: Vec<u8>,
    /// Controller number of slider 0; sliders are consecutive
    pub first_fader: u8,
    /// Master fader controller number
    pub master_fader: u8,
}

impl Default for SurfaceLayout {
    fn default() -> Self {
        // pad rows from the top of the 8x8 grid
        let rows = |starts: &[u8]| -> Vec<u8> {
            starts.iter().flat_map(|&s| s..s + 8).collect()
        };

        Self {
            preset_pads: rows(&[0x38, 0x30, 0x28]),
            mask_pads: rows(&[0x20, 0x18, 0x10]),
            mask_reset: 0x70,
            blackout: 0x07,
            full_on: 0x06,
            tint: [0x00, 0x01, 0x02],
            segment_config: vec![100, 101, 102, 103],
            first_fader: 48,
            master_fader: 56,
        }
    }
}

impl SurfaceLayout {
    /// Slider index for a controller number
    pub fn slider_for(&self, controller: u8) -> Option<usize> {
        let index = controller.checked_sub(self.first_fader)? as usize;
        (index < SLIDER_COUNT).then_some(index)
    }
}

/// Control surface configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SurfaceConfig {
    /// Port name (or name prefix) of the device
    pub device_name: String,
    /// Wait between connection attempts
    pub reconnect_interval_ms: u64,
    /// Upper bound on one event poll
    pub poll_timeout_ms: u64,
    /// How often an open session checks the device is still present
    pub liveness_check_ms: u64,
    /// Full-on button behavior
    pub full_on_mode: FullOnMode,
    /// Note/controller numbers
    pub layout: SurfaceLayout,
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            device_name: "APC mini mk2".to_string(),
            reconnect_interval_ms: 500,
            poll_timeout_ms: 100,
            liveness_check_ms: 1000,
            full_on_mode: FullOnMode::default(),
            layout: SurfaceLayout::default(),
        }
    }
}

/// Control values in effect before the surface moves anything
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InitialControls {
    /// Master level
    pub master: u8,
    /// Level of every segment group slider
    pub segments: u8,
}

impl Default for InitialControls {
    fn default() -> Self {
        Self {
            master: 255,
            segments: 255,
        }
    }
}

impl StageConfig {
    /// Load and validate a TOML configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        let config: StageConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> Result<()> {
        self.layout.validate()?;
        self.segment_groups.validate(&self.layout, SLIDER_COUNT)?;

        if self.assets.preset(self.assets.initial_preset).is_none() {
            return Err(CoreError::InvalidConfig(format!(
                "initial preset slot {} is empty",
                self.assets.initial_preset
            )));
        }

        let pads = &self.surface.layout;
        if self.assets.presets.len() > pads.preset_pads.len()
            || self.assets.masks.len() > pads.mask_pads.len()
        {
            return Err(CoreError::InvalidConfig(
                "more asset slots than surface pads".to_string(),
            ));
        }

        for role in [self.sliders.speed, self.sliders.strobe_rate, self.sliders.strobe_duty] {
            if role >= SLIDER_COUNT {
                return Err(CoreError::InvalidConfig(format!(
                    "slider role index {} out of range",
                    role
                )));
            }
            if role < self.segment_groups.len() {
                return Err(CoreError::InvalidConfig(format!(
                    "slider {} drives both segment group {} and a strobe/speed role",
                    role, role
                )));
            }
        }

        if self.network.target_fps == 0 {
            return Err(CoreError::InvalidConfig(
                "target_fps must be positive".to_string(),
            ));
        }

        Ok(())
    }

    /// Build the start-up control parameters
    pub fn initial_params(&self) -> ControlParams {
        let mut params = ControlParams {
            roles: self.sliders,
            master: self.initial.master,
            strobe_timing: self.strobe,
            ..ControlParams::default()
        };

        for group in 0..self.segment_groups.len() {
            params.set_slider(group, self.initial.segments);
        }

        params.recompute_derived();
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = StageConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.status_interval_secs, 5);
        assert_eq!(config.assets.preset(0), Some("debug.png"));
        assert_eq!(config.assets.preset(8), None);
        assert_eq!(config.assets.mask(12), Some("mask-smooth-cross.png"));
    }

    #[test]
    fn test_default_pads() {
        let layout = SurfaceLayout::default();
        assert_eq!(layout.preset_pads[0], 0x38);
        assert_eq!(layout.preset_pads[8], 0x30);
        assert_eq!(layout.mask_pads[23], 0x17);
        assert_eq!(layout.slider_for(48), Some(0));
        assert_eq!(layout.slider_for(55), Some(7));
        assert_eq!(layout.slider_for(56), None);
        assert_eq!(layout.slider_for(3), None);
    }

    #[test]
    fn test_initial_params() {
        let config = StageConfig::default();
        let params = config.initial_params();
        assert_eq!(params.master, 255);
        assert_eq!(&params.sliders[..3], &[255, 255, 255]);
        assert_eq!(params.sliders[7], 0);
        assert_eq!(params.strobe.rate, 0);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: StageConfig = toml::from_str(
            r#"
            segment_groups = [[0], [1]]

            [layout]
            segments = 2
            per_segment = 10

            [network]
            target_fps = 25
            "#,
        )
        .unwrap();

        assert_eq!(config.layout.led_count(), 20);
        assert_eq!(config.network.remote_port, 1111);
        assert_eq!(config.network.frame_period(), Duration::from_micros(40_000));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_group_on_role_slider() {
        let mut config = StageConfig::default();
        config.segment_groups = SegmentGroups((0..6).map(|s| vec![s]).collect());
        assert!(config.validate().is_err());

        config.sliders.strobe_duty = 6;
        config.sliders.strobe_rate = 7;
        config.sliders.speed = 7;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_empty_initial_preset() {
        let mut config = StageConfig::default();
        config.assets.initial_preset = 10;
        assert!(config.validate().is_err());
    }
}
