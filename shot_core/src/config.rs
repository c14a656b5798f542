//! Runtime configuration for the control core.
//!
//! These are the structs the loop and its workers actually read. They are
//! separate from the TOML-deserialized config in `shot_config`; see
//! `conversions` for the mapping.
use std::time::Duration;

/// Control loop timing and start-of-shot behaviour.
#[derive(Debug, Clone)]
pub struct LoopCfg {
    /// Tick period.
    pub tick: Duration,
    /// Flow samples are accepted for this long after the relay turns off.
    pub flow_decay: Duration,
    /// Tare the scale when a shot starts.
    pub tare_on_start: bool,
    /// Wait after the start-of-shot tare before the timer starts.
    pub tare_settle: Duration,
    /// Moving-average window handed to the renderer with each snapshot.
    pub smoothing_window: usize,
}

impl Default for LoopCfg {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(100),
            flow_decay: Duration::from_secs(3),
            tare_on_start: false,
            tare_settle: Duration::from_millis(500),
            smoothing_window: 10,
        }
    }
}

/// Overshoot learning.
#[derive(Debug, Clone)]
pub struct CalibrationCfg {
    /// Shots shorter than this are not learned from.
    pub min_shot: Duration,
    /// Wait for residual drips before reading the final weight.
    pub settle: Duration,
    /// Corrections outside ±limit are discarded.
    pub overshoot_limit_g: f32,
}

impl Default for CalibrationCfg {
    fn default() -> Self {
        Self {
            min_shot: Duration::from_secs(10),
            settle: Duration::from_secs(3),
            overshoot_limit_g: 10.0,
        }
    }
}

/// Scale link reconciliation.
#[derive(Debug, Clone)]
pub struct LinkCfg {
    pub discover_timeout: Duration,
    /// Preferred scale; used when present in a scan, else the first device found.
    pub preferred_address: Option<String>,
    /// Link switch state until the first switch command arrives.
    pub enabled_at_start: bool,
}

impl Default for LinkCfg {
    fn default() -> Self {
        Self {
            discover_timeout: Duration::from_secs(1),
            preferred_address: None,
            enabled_at_start: true,
        }
    }
}

/// Operator adjust-button behaviour.
#[derive(Debug, Clone)]
pub struct InputCfg {
    pub hold: Duration,
    /// Minimum spacing between long steps while a button stays held.
    pub repeat: Duration,
    pub short_step_g: f32,
    pub long_step_g: f32,
}

impl Default for InputCfg {
    fn default() -> Self {
        Self {
            hold: Duration::from_millis(500),
            repeat: Duration::from_millis(100),
            short_step_g: 0.1,
            long_step_g: 1.0,
        }
    }
}
