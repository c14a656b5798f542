//! Type-state builder for `ControlLoop`.
//!
//! The scale link and the relay must be provided before `build()` is
//! available. `try_build()` exists in every state for dynamic wiring.
use crossbeam_channel as xch;
use std::marker::PhantomData;
use std::sync::Arc;

use shot_traits::clock::{Clock, MonotonicClock};
use shot_traits::{Relay, ScaleLink};

use crate::calibration::CalibrationWorker;
use crate::config::{CalibrationCfg, LinkCfg, LoopCfg};
use crate::control::ControlLoop;
use crate::dispense::DispenseState;
use crate::display::{DisplayBridge, DisplayPublisher};
use crate::error::{BuildError, Result};
use crate::flow::FlowBuffer;
use crate::link::LinkState;
use crate::preset::{PresetStore, SharedPresets, lock_presets, shared};
use crate::signal::{Flag, WeightCell};

// ── Type-state markers ───────────────────────────────────────────────────────

pub struct Missing;
pub struct Set;

enum Display {
    None,
    Publisher(DisplayPublisher),
    Bridge(DisplayBridge),
}

pub struct ControlLoopBuilder<L, R> {
    link: Option<Box<dyn ScaleLink>>,
    relay: Option<Box<dyn Relay>>,
    presets: Option<SharedPresets>,
    loop_cfg: Option<LoopCfg>,
    link_cfg: Option<LinkCfg>,
    calibration: Option<CalibrationCfg>,
    calibration_enabled: bool,
    clock: Option<Arc<dyn Clock + Send + Sync>>,
    calibration_clock: Option<Arc<dyn Clock + Send + Sync>>,
    display: Display,
    _l: PhantomData<L>,
    _r: PhantomData<R>,
}

impl Default for ControlLoopBuilder<Missing, Missing> {
    fn default() -> Self {
        Self {
            link: None,
            relay: None,
            presets: None,
            loop_cfg: None,
            link_cfg: None,
            calibration: None,
            calibration_enabled: true,
            clock: None,
            calibration_clock: None,
            display: Display::None,
            _l: PhantomData,
            _r: PhantomData,
        }
    }
}

fn invalid(msg: &'static str) -> eyre::Report {
    eyre::Report::new(BuildError::InvalidConfig(msg))
}

fn validate(loop_cfg: &LoopCfg, link_cfg: &LinkCfg, cal: &CalibrationCfg) -> Result<()> {
    if loop_cfg.tick.is_zero() {
        return Err(invalid("tick must be > 0"));
    }
    if loop_cfg.smoothing_window == 0 {
        return Err(invalid("smoothing_window must be >= 1"));
    }
    if link_cfg.discover_timeout.is_zero() {
        return Err(invalid("discover_timeout must be > 0"));
    }
    if !(cal.overshoot_limit_g.is_finite() && cal.overshoot_limit_g > 0.0) {
        return Err(invalid("overshoot_limit_g must be a finite value > 0"));
    }
    Ok(())
}

impl<L, R> ControlLoopBuilder<L, R> {
    /// Fallible build available in any type-state.
    pub fn try_build(self) -> Result<ControlLoop> {
        let link = self
            .link
            .ok_or_else(|| eyre::Report::new(BuildError::MissingLink))?;
        let relay = self
            .relay
            .ok_or_else(|| eyre::Report::new(BuildError::MissingRelay))?;
        let loop_cfg = self.loop_cfg.unwrap_or_default();
        let link_cfg = self.link_cfg.unwrap_or_default();
        let cal_cfg = self.calibration.unwrap_or_default();
        validate(&loop_cfg, &link_cfg, &cal_cfg)?;

        let presets = self.presets.unwrap_or_else(|| shared(PresetStore::default()));
        lock_presets(&presets).set_overshoot_limit(cal_cfg.overshoot_limit_g);

        let clock: Arc<dyn Clock + Send + Sync> = match self.clock {
            Some(c) => c,
            None => Arc::new(MonotonicClock::new()),
        };
        let weight = WeightCell::new();
        let save = Flag::new();

        let calibrator = self.calibration_enabled.then(|| {
            CalibrationWorker::spawn(
                presets.clone(),
                weight.clone(),
                save.clone(),
                cal_cfg,
                self.calibration_clock.unwrap_or_else(|| clock.clone()),
            )
        });

        let (display, bridge) = match self.display {
            Display::None => (DisplayPublisher::detached(), None),
            Display::Publisher(p) => (p, None),
            Display::Bridge(b) => (b.publisher(), Some(b)),
        };

        let (command_tx, commands) = xch::unbounded();
        let now = clock.now();
        let flow = FlowBuffer::for_tick(loop_cfg.tick).with_decay(loop_cfg.flow_decay);
        tracing::debug!(
            tick_ms = loop_cfg.tick.as_millis() as u64,
            flow_capacity = flow.capacity(),
            smoothing = loop_cfg.smoothing_window,
            "control loop built"
        );

        Ok(ControlLoop {
            link,
            relay,
            presets,
            weight,
            save,
            link_wanted: link_cfg.enabled_at_start,
            cfg: loop_cfg,
            link_cfg,
            clock,
            commands,
            command_tx,
            display,
            bridge,
            calibrator,
            state: DispenseState::new(now),
            flow,
            link_state: LinkState::Disconnected,
            shot_preset: None,
            prev_sample: None,
            battery: None,
            seq: 0,
            finished: false,
        })
    }
}

/// Chainable setters that do not affect type-state.
impl<L, R> ControlLoopBuilder<L, R> {
    pub fn with_presets(mut self, presets: SharedPresets) -> Self {
        self.presets = Some(presets);
        self
    }

    pub fn with_loop_cfg(mut self, cfg: LoopCfg) -> Self {
        self.loop_cfg = Some(cfg);
        self
    }

    pub fn with_link_cfg(mut self, cfg: LinkCfg) -> Self {
        self.link_cfg = Some(cfg);
        self
    }

    pub fn with_calibration(mut self, cfg: CalibrationCfg) -> Self {
        self.calibration = Some(cfg);
        self
    }

    /// Run without a calibration worker; auto-stops still happen.
    pub fn without_calibration(mut self) -> Self {
        self.calibration_enabled = false;
        self
    }

    /// Provide a custom clock; defaults to `MonotonicClock`.
    pub fn with_clock(mut self, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Clock for the calibration worker's settle delay; defaults to the loop clock.
    pub fn with_calibration_clock(mut self, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        self.calibration_clock = Some(clock);
        self
    }

    /// Publish into an existing channel (the caller drives the consumer).
    pub fn with_display(mut self, publisher: DisplayPublisher) -> Self {
        self.display = Display::Publisher(publisher);
        self
    }

    /// Hand over a running bridge; the loop stops it on shutdown.
    pub fn with_display_bridge(mut self, bridge: DisplayBridge) -> Self {
        self.display = Display::Bridge(bridge);
        self
    }
}

// Setters that advance type-state
impl<R> ControlLoopBuilder<Missing, R> {
    pub fn with_link(self, link: impl ScaleLink + 'static) -> ControlLoopBuilder<Set, R> {
        ControlLoopBuilder {
            link: Some(Box::new(link)),
            relay: self.relay,
            presets: self.presets,
            loop_cfg: self.loop_cfg,
            link_cfg: self.link_cfg,
            calibration: self.calibration,
            calibration_enabled: self.calibration_enabled,
            clock: self.clock,
            calibration_clock: self.calibration_clock,
            display: self.display,
            _l: PhantomData,
            _r: PhantomData,
        }
    }
}

impl<L> ControlLoopBuilder<L, Missing> {
    pub fn with_relay(self, relay: impl Relay + 'static) -> ControlLoopBuilder<L, Set> {
        ControlLoopBuilder {
            link: self.link,
            relay: Some(Box::new(relay)),
            presets: self.presets,
            loop_cfg: self.loop_cfg,
            link_cfg: self.link_cfg,
            calibration: self.calibration,
            calibration_enabled: self.calibration_enabled,
            clock: self.clock,
            calibration_clock: self.calibration_clock,
            display: self.display,
            _l: PhantomData,
            _r: PhantomData,
        }
    }
}

impl ControlLoopBuilder<Set, Set> {
    /// Validate and build. Only available once link and relay are set.
    pub fn build(self) -> Result<ControlLoop> {
        self.try_build()
    }
}
