#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema for the shot controller.
//!
//! - `Config` and its sections are deserialized from TOML. Every section has
//!   defaults, so an empty file is a valid config.
//! - `Config::validate` rejects values the control core cannot run with and
//!   names the offending key in the message.
use serde::Deserialize;
use std::path::Path;

/// Number of presets in the rotation.
pub const PRESET_COUNT: usize = 3;

/// BCM pin numbers for the operator panel and the relay.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Pins {
    pub relay: u8,
    pub paddle: u8,
    pub tare: u8,
    pub preset: u8,
    pub target_up: u8,
    pub target_down: u8,
    /// Switch that enables the scale link.
    pub link_switch: u8,
}

impl Default for Pins {
    fn default() -> Self {
        Self {
            relay: 26,
            paddle: 20,
            tare: 4,
            preset: 21,
            target_up: 12,
            target_down: 16,
            link_switch: 5,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ControlCfg {
    /// Control loop period (ms).
    pub tick_ms: u64,
    /// Flow samples are still recorded for this long after the relay turns off.
    pub flow_decay_ms: u64,
    /// Tare the scale when a shot starts.
    pub tare_on_start: bool,
    /// Wait after the start-of-shot tare before the shot timer starts.
    pub tare_settle_ms: u64,
    /// Hold time before an adjust button switches to the long step.
    pub hold_ms: u64,
    /// Target change for a short press (g).
    pub short_step_g: f32,
    /// Target change per tick while an adjust button is held (g).
    pub long_step_g: f32,
}

impl Default for ControlCfg {
    fn default() -> Self {
        Self {
            tick_ms: 100,
            flow_decay_ms: 3_000,
            tare_on_start: false,
            tare_settle_ms: 500,
            hold_ms: 500,
            short_step_g: 0.1,
            long_step_g: 1.0,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CalibrationCfg {
    /// Shots shorter than this are not used to learn overshoot.
    pub min_shot_ms: u64,
    /// Wait after the stop before reading the final weight.
    pub settle_ms: u64,
    /// Corrections that would push |overshoot| above this are discarded.
    pub overshoot_limit_g: f32,
}

impl Default for CalibrationCfg {
    fn default() -> Self {
        Self {
            min_shot_ms: 10_000,
            settle_ms: 3_000,
            overshoot_limit_g: 10.0,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LinkCfg {
    /// Upper bound on one discovery scan.
    pub discover_timeout_ms: u64,
    /// Preferred scale address; used when it shows up in a scan.
    pub address: Option<String>,
    /// Link switch state assumed until the first switch edge arrives.
    pub enabled_at_start: bool,
}

impl Default for LinkCfg {
    fn default() -> Self {
        Self {
            discover_timeout_ms: 1_000,
            address: None,
            enabled_at_start: true,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct DisplayCfg {
    /// Moving-average window for the flow graph. Defaults to one second of ticks.
    pub smoothing_window: Option<usize>,
    /// Directory that receives a frame after each calibrated shot.
    pub save_dir: Option<String>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct PresetCfg {
    pub name: String,
    #[serde(default = "default_color")]
    pub color: String,
    #[serde(default = "default_target_g")]
    pub target_g: f32,
    #[serde(default = "default_overshoot_g")]
    pub overshoot_g: f32,
}

fn default_color() -> String {
    "#376efa".to_string()
}

fn default_target_g() -> f32 {
    40.0
}

fn default_overshoot_g() -> f32 {
    2.0
}

fn default_presets() -> Vec<PresetCfg> {
    [("A", "#376efa"), ("B", "#25a602"), ("C", "#ff1303")]
        .into_iter()
        .map(|(name, color)| PresetCfg {
            name: name.to_string(),
            color: color.to_string(),
            target_g: default_target_g(),
            overshoot_g: default_overshoot_g(),
        })
        .collect()
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Config {
    pub pins: Pins,
    pub control: ControlCfg,
    pub calibration: CalibrationCfg,
    pub link: LinkCfg,
    pub display: DisplayCfg,
    pub logging: Logging,
    pub presets: Vec<PresetCfg>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pins: Pins::default(),
            control: ControlCfg::default(),
            calibration: CalibrationCfg::default(),
            link: LinkCfg::default(),
            display: DisplayCfg::default(),
            logging: Logging::default(),
            presets: default_presets(),
        }
    }
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

/// Read, parse, and validate a config file.
pub fn load_file(path: &Path) -> eyre::Result<Config> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| eyre::eyre!("read config {:?}: {}", path, e))?;
    let cfg = load_toml(&text).map_err(|e| eyre::eyre!("parse config {:?}: {}", path, e))?;
    cfg.validate()?;
    Ok(cfg)
}

fn is_hex_color(s: &str) -> bool {
    s.len() == 7 && s.starts_with('#') && s[1..].chars().all(|c| c.is_ascii_hexdigit())
}

impl DisplayCfg {
    /// Smoothing window to use for a given tick period.
    pub fn effective_smoothing(&self, tick_ms: u64) -> usize {
        self.smoothing_window.unwrap_or_else(|| {
            let ticks_per_sec = 1000.0 / tick_ms.max(1) as f64;
            (ticks_per_sec.round() as usize).max(1)
        })
    }
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Control
        if self.control.tick_ms == 0 {
            eyre::bail!("control.tick_ms must be >= 1");
        }
        if self.control.tick_ms > 10_000 {
            eyre::bail!("control.tick_ms is unreasonably large (>10s)");
        }
        if self.control.tare_settle_ms > 5_000 {
            eyre::bail!("control.tare_settle_ms is unreasonably large (>5s)");
        }
        if self.control.hold_ms == 0 {
            eyre::bail!("control.hold_ms must be >= 1");
        }
        if self.control.short_step_g.is_nan() || self.control.short_step_g <= 0.0 {
            eyre::bail!("control.short_step_g must be > 0");
        }
        if self.control.long_step_g.is_nan() || self.control.long_step_g <= 0.0 {
            eyre::bail!("control.long_step_g must be > 0");
        }

        // Calibration
        let limit = self.calibration.overshoot_limit_g;
        if !(limit.is_finite() && limit > 0.0) {
            eyre::bail!("calibration.overshoot_limit_g must be a finite value > 0");
        }
        if self.calibration.settle_ms > 60_000 {
            eyre::bail!("calibration.settle_ms is unreasonably large (>60s)");
        }

        // Link
        if self.link.discover_timeout_ms == 0 {
            eyre::bail!("link.discover_timeout_ms must be >= 1");
        }
        if self.link.discover_timeout_ms > 10_000 {
            eyre::bail!("link.discover_timeout_ms is unreasonably large (>10s)");
        }
        if let Some(addr) = &self.link.address
            && addr.trim().is_empty()
        {
            eyre::bail!("link.address must not be empty when set");
        }

        // Display
        if self.display.smoothing_window == Some(0) {
            eyre::bail!("display.smoothing_window must be >= 1");
        }

        // Presets
        if self.presets.len() != PRESET_COUNT {
            eyre::bail!(
                "presets must contain exactly {} entries, got {}",
                PRESET_COUNT,
                self.presets.len()
            );
        }
        for (i, p) in self.presets.iter().enumerate() {
            if p.name.trim().is_empty() {
                eyre::bail!("presets[{i}].name must not be empty");
            }
            if !is_hex_color(&p.color) {
                eyre::bail!("presets[{i}].color must look like #rrggbb, got {:?}", p.color);
            }
            if !(p.target_g.is_finite() && p.target_g >= 0.0) {
                eyre::bail!("presets[{i}].target_g must be >= 0");
            }
            if !(p.overshoot_g.is_finite() && p.overshoot_g.abs() <= limit) {
                eyre::bail!("presets[{i}].overshoot_g must be within ±calibration.overshoot_limit_g");
            }
        }
        for (i, a) in self.presets.iter().enumerate() {
            if self.presets[..i].iter().any(|b| b.name == a.name) {
                eyre::bail!("presets[{i}].name {:?} is duplicated", a.name);
            }
        }

        // Logging
        if let Some(rot) = &self.logging.rotation
            && !matches!(rot.as_str(), "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never|daily|hourly, got {rot:?}");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_is_valid_defaults() {
        let cfg = load_toml("").expect("parse");
        cfg.validate().expect("defaults validate");
        assert_eq!(cfg.control.tick_ms, 100);
        assert_eq!(cfg.presets.len(), PRESET_COUNT);
        assert_eq!(cfg.presets[1].name, "B");
        assert_eq!(cfg.presets[2].color, "#ff1303");
    }

    #[test]
    fn smoothing_defaults_to_one_second_of_ticks() {
        let d = DisplayCfg::default();
        assert_eq!(d.effective_smoothing(100), 10);
        assert_eq!(d.effective_smoothing(250), 4);
        assert_eq!(d.effective_smoothing(5_000), 1);
        let fixed = DisplayCfg {
            smoothing_window: Some(6),
            ..DisplayCfg::default()
        };
        assert_eq!(fixed.effective_smoothing(100), 6);
    }

    #[test]
    fn hex_color_check() {
        assert!(is_hex_color("#25a602"));
        assert!(!is_hex_color("25a602"));
        assert!(!is_hex_color("#25a60z"));
    }
}
