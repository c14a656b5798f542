//! `From` implementations bridging `shot_config` types to `shot_core` types.
//!
//! Keeps the millisecond/gram fields of the TOML schema out of the core and
//! the field-by-field mapping out of the CLI.
use std::time::Duration;

use crate::config::{CalibrationCfg, InputCfg, LinkCfg, LoopCfg};
use crate::error::BuildError;
use crate::preset::{PRESET_COUNT, Preset, PresetStore};

// ── LoopCfg ──────────────────────────────────────────────────────────────────

impl From<&shot_config::Config> for LoopCfg {
    fn from(c: &shot_config::Config) -> Self {
        Self {
            tick: Duration::from_millis(c.control.tick_ms),
            flow_decay: Duration::from_millis(c.control.flow_decay_ms),
            tare_on_start: c.control.tare_on_start,
            tare_settle: Duration::from_millis(c.control.tare_settle_ms),
            smoothing_window: c.display.effective_smoothing(c.control.tick_ms),
        }
    }
}

// ── CalibrationCfg ───────────────────────────────────────────────────────────

impl From<&shot_config::CalibrationCfg> for CalibrationCfg {
    fn from(c: &shot_config::CalibrationCfg) -> Self {
        Self {
            min_shot: Duration::from_millis(c.min_shot_ms),
            settle: Duration::from_millis(c.settle_ms),
            overshoot_limit_g: c.overshoot_limit_g,
        }
    }
}

// ── LinkCfg ──────────────────────────────────────────────────────────────────

impl From<&shot_config::LinkCfg> for LinkCfg {
    fn from(c: &shot_config::LinkCfg) -> Self {
        Self {
            discover_timeout: Duration::from_millis(c.discover_timeout_ms),
            preferred_address: c.address.clone(),
            enabled_at_start: c.enabled_at_start,
        }
    }
}

// ── InputCfg ─────────────────────────────────────────────────────────────────

impl From<&shot_config::ControlCfg> for InputCfg {
    fn from(c: &shot_config::ControlCfg) -> Self {
        Self {
            hold: Duration::from_millis(c.hold_ms),
            repeat: Duration::from_millis(c.tick_ms),
            short_step_g: c.short_step_g,
            long_step_g: c.long_step_g,
        }
    }
}

// ── Presets ──────────────────────────────────────────────────────────────────

impl From<&shot_config::PresetCfg> for Preset {
    fn from(c: &shot_config::PresetCfg) -> Self {
        Preset::new(c.name.clone(), c.color.clone()).with_target(c.target_g, c.overshoot_g)
    }
}

impl TryFrom<&shot_config::Config> for PresetStore {
    type Error = BuildError;

    fn try_from(c: &shot_config::Config) -> Result<Self, Self::Error> {
        let presets: Vec<Preset> = c.presets.iter().map(Preset::from).collect();
        let got = presets.len();
        let presets: [Preset; PRESET_COUNT] = presets
            .try_into()
            .map_err(|_| BuildError::PresetCount {
                expected: PRESET_COUNT,
                got,
            })?;
        Ok(PresetStore::new(presets).with_overshoot_limit(c.calibration.overshoot_limit_g))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_map_to_core_defaults() {
        let cfg = shot_config::Config::default();
        let lp = LoopCfg::from(&cfg);
        assert_eq!(lp.tick, Duration::from_millis(100));
        assert_eq!(lp.smoothing_window, 10);
        let cal = CalibrationCfg::from(&cfg.calibration);
        assert_eq!(cal.min_shot, Duration::from_secs(10));
        assert_eq!(cal.settle, Duration::from_secs(3));
        let input = InputCfg::from(&cfg.control);
        assert_eq!(input.hold, Duration::from_millis(500));
        assert_eq!(input.repeat, lp.tick);
    }

    #[test]
    fn preset_store_requires_three() {
        let mut cfg = shot_config::Config::default();
        let store = PresetStore::try_from(&cfg).expect("three presets");
        assert_eq!(store.current().name, "A");
        assert_eq!(store.iter().nth(2).map(|p| p.color.as_str()), Some("#ff1303"));

        cfg.presets.pop();
        let err = PresetStore::try_from(&cfg).expect_err("two presets");
        assert_eq!(err, BuildError::PresetCount { expected: 3, got: 2 });
    }
}
