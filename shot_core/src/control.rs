//! The control loop.
//!
//! Single-threaded and tick driven. Operator input arrives as `Command`s on a
//! channel and is drained at the top of every tick, so preset edits and relay
//! transitions all happen on this thread. The only state shared with other
//! threads is the preset store (behind its mutex), the latest-weight cell and
//! the save flag.
use crossbeam_channel as xch;
use shot_traits::{Clock, Relay, ScaleLink};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::builder::{ControlLoopBuilder, Missing};
use crate::calibration::{CalibrationJob, CalibrationOutcome, CalibrationWorker};
use crate::config::{LinkCfg, LoopCfg};
use crate::dispense::DispenseState;
use crate::display::{DisplayBridge, DisplayPublisher, DisplaySnapshot};
use crate::flow::FlowBuffer;
use crate::hw_error::{map_link_error, map_relay_error};
use crate::link::{LinkState, reconcile};
use crate::preset::{PresetId, SharedPresets, lock_presets};
use crate::signal::{Flag, Shutdown, WeightCell};
use crate::util::flow_rate_gps;

/// Operator intent, already debounced.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    /// Paddle engaged.
    StartShot,
    /// Paddle released.
    StopShot,
    /// Change the current preset's target by this many grams (negative lowers it).
    Adjust(f32),
    RotatePreset,
    Tare,
    /// Scale link switch.
    LinkEnabled(bool),
}

pub type CommandSender = xch::Sender<Command>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Operator,
    AutoStop,
    Shutdown,
}

/// What one tick did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickReport {
    pub link: LinkState,
    pub relay_on: bool,
    pub weight_g: Option<f32>,
    pub auto_stopped: bool,
    /// `seq` of the snapshot published this tick; `None` when the display was blanked.
    pub seq: Option<u64>,
}

pub struct ControlLoop {
    pub(crate) link: Box<dyn ScaleLink>,
    pub(crate) relay: Box<dyn Relay>,
    pub(crate) presets: SharedPresets,
    pub(crate) weight: WeightCell,
    pub(crate) save: Flag,
    pub(crate) cfg: LoopCfg,
    pub(crate) link_cfg: LinkCfg,
    pub(crate) clock: Arc<dyn Clock + Send + Sync>,
    pub(crate) commands: xch::Receiver<Command>,
    pub(crate) command_tx: CommandSender,
    pub(crate) display: DisplayPublisher,
    pub(crate) bridge: Option<DisplayBridge>,
    pub(crate) calibrator: Option<CalibrationWorker>,
    pub(crate) state: DispenseState,
    pub(crate) flow: FlowBuffer,
    pub(crate) link_wanted: bool,
    pub(crate) link_state: LinkState,
    pub(crate) shot_preset: Option<PresetId>,
    pub(crate) prev_sample: Option<(f32, Instant)>,
    pub(crate) battery: Option<u8>,
    pub(crate) seq: u64,
    pub(crate) finished: bool,
}

impl core::fmt::Debug for ControlLoop {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ControlLoop")
            .field("relay_on", &self.state.relay_on())
            .field("link_state", &self.link_state)
            .field("link_wanted", &self.link_wanted)
            .field("flow_len", &self.flow.len())
            .field("seq", &self.seq)
            .finish()
    }
}

impl ControlLoop {
    pub fn builder() -> ControlLoopBuilder<Missing, Missing> {
        ControlLoopBuilder::default()
    }

    /// Sender for operator commands; clone freely.
    pub fn commands(&self) -> CommandSender {
        self.command_tx.clone()
    }

    pub fn presets(&self) -> &SharedPresets {
        &self.presets
    }

    pub fn weight_cell(&self) -> &WeightCell {
        &self.weight
    }

    pub fn save_flag(&self) -> &Flag {
        &self.save
    }

    pub fn dispense(&self) -> &DispenseState {
        &self.state
    }

    pub fn flow(&self) -> &FlowBuffer {
        &self.flow
    }

    pub fn link_state(&self) -> LinkState {
        self.link_state
    }

    pub fn link_wanted(&self) -> bool {
        self.link_wanted
    }

    pub fn cfg(&self) -> &LoopCfg {
        &self.cfg
    }

    /// Results from the calibration worker, if one is attached.
    pub fn calibration_outcomes(&self) -> Option<&xch::Receiver<CalibrationOutcome>> {
        self.calibrator.as_ref().map(CalibrationWorker::outcomes)
    }

    /// One control period.
    pub fn tick(&mut self) -> TickReport {
        self.drain_commands();
        self.retry_stuck_relay();

        self.link_state = reconcile(&mut *self.link, self.link_wanted, &self.link_cfg);

        if !self.link_state.is_connected() {
            self.weight.set(None);
            self.prev_sample = None;
            self.battery = None;
            self.display.blank();
            tracing::trace!(relay_on = self.state.relay_on(), "tick (scale offline)");
            return TickReport {
                link: self.link_state,
                relay_on: self.state.relay_on(),
                weight_g: None,
                auto_stopped: false,
                seq: None,
            };
        }

        let now = self.clock.now();
        let weight = self.read_weight();
        self.battery = self.read_battery();
        self.weight.set(weight);

        let mut auto_stopped = false;
        if let Some(w) = weight {
            self.record_flow(w, now);
            auto_stopped = self.check_auto_stop(w, now);
        } else {
            // A gap in readings would otherwise show up as one huge flow sample.
            self.prev_sample = None;
        }

        let seq = self.publish_snapshot(weight, now);
        tracing::trace!(
            weight_g = ?weight,
            relay_on = self.state.relay_on(),
            flow_len = self.flow.len(),
            seq,
            "tick"
        );
        TickReport {
            link: self.link_state,
            relay_on: self.state.relay_on(),
            weight_g: weight,
            auto_stopped,
            seq: Some(seq),
        }
    }

    /// Tick at the configured period until `shutdown` is triggered, then
    /// switch everything off.
    pub fn run(&mut self, shutdown: &Shutdown) {
        tracing::info!(tick_ms = self.cfg.tick.as_millis() as u64, "control loop started");
        while !shutdown.is_triggered() {
            let started = self.clock.now();
            self.tick();
            let spent = self.clock.since(started);
            if shutdown.is_triggered() {
                break;
            }
            self.clock.sleep(self.cfg.tick.saturating_sub(spent));
        }
        tracing::info!("shutdown requested");
        self.finish();
    }

    /// Relay off, scale disconnected, workers stopped. Failures are logged.
    /// Safe to call more than once.
    pub fn finish(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;

        let now = self.clock.now();
        self.stop_shot(now, StopReason::Shutdown);
        if self.relay.is_on()
            && let Err(e) = self.relay.off()
        {
            tracing::error!(error = %map_relay_error(&*e), "relay off failed during shutdown");
        }

        if self.link.is_connected() {
            match self.link.disconnect() {
                Ok(()) => tracing::info!("scale disconnected"),
                Err(e) => {
                    tracing::error!(error = %map_link_error(&*e), "scale disconnect failed during shutdown");
                }
            }
        }
        self.link_state = LinkState::Disconnected;

        self.display.blank();
        if let Some(mut bridge) = self.bridge.take() {
            bridge.stop();
        }
        if let Some(mut worker) = self.calibrator.take() {
            let pending = worker.pending();
            if pending > 0 {
                tracing::info!(pending, "waiting for queued calibrations");
            }
            worker.shutdown();
        }
        tracing::info!("control loop stopped");
    }

    fn drain_commands(&mut self) {
        while let Ok(cmd) = self.commands.try_recv() {
            tracing::debug!(?cmd, "command");
            self.handle(cmd);
        }
    }

    fn handle(&mut self, cmd: Command) {
        match cmd {
            Command::StartShot => self.start_shot(),
            Command::StopShot => {
                let now = self.clock.now();
                self.stop_shot(now, StopReason::Operator);
            }
            Command::Adjust(amount) => {
                let mut store = lock_presets(&self.presets);
                if amount >= 0.0 {
                    store.increment(amount);
                } else {
                    store.decrement(-amount);
                }
            }
            Command::RotatePreset => lock_presets(&self.presets).rotate(),
            Command::Tare => self.tare(),
            Command::LinkEnabled(on) => {
                if self.link_wanted != on {
                    tracing::info!(enabled = on, "scale link switch");
                }
                self.link_wanted = on;
            }
        }
    }

    fn start_shot(&mut self) {
        if self.state.relay_on() {
            tracing::debug!("start ignored, already dispensing");
            return;
        }
        if self.cfg.tare_on_start {
            self.tare();
            self.clock.sleep(self.cfg.tare_settle);
        }

        if let Err(e) = self.relay.on() {
            tracing::warn!(error = %map_relay_error(&*e), "relay on failed, shot not started");
            return;
        }
        self.flow.clear();
        let now = self.clock.now();
        self.state.start(now);
        let store = lock_presets(&self.presets);
        self.shot_preset = Some(store.current_id());
        let p = store.current();
        tracing::info!(
            preset = %p.name,
            target_g = p.target_g,
            overshoot_g = p.overshoot_g,
            "shot started"
        );
    }

    /// ON→OFF. The dispense state follows even if the relay refuses; the
    /// next tick retries the relay. Returns the shot duration if a shot ended.
    fn stop_shot(&mut self, now: Instant, reason: StopReason) -> Option<Duration> {
        if !self.state.relay_on() {
            return None;
        }
        if let Err(e) = self.relay.off() {
            tracing::warn!(error = %map_relay_error(&*e), ?reason, "relay off failed, will retry");
        }
        self.state.stop(now);
        let elapsed = self.state.elapsed(now);
        tracing::info!(
            ?reason,
            shot_ms = elapsed.as_millis() as u64,
            weight_g = ?self.weight.get(),
            "shot stopped"
        );
        Some(elapsed)
    }

    fn retry_stuck_relay(&mut self) {
        if !self.state.relay_on()
            && self.relay.is_on()
            && let Err(e) = self.relay.off()
        {
            tracing::warn!(error = %map_relay_error(&*e), "relay still on after stop");
        }
    }

    fn tare(&mut self) {
        match self.link.tare() {
            Ok(()) => {
                tracing::debug!("scale tared");
                self.prev_sample = None;
            }
            Err(e) => tracing::error!(error = %map_link_error(&*e), "tare failed"),
        }
    }

    fn read_weight(&mut self) -> Option<f32> {
        match self.link.weight() {
            Ok(w) => w.filter(|g| g.is_finite()),
            Err(e) => {
                tracing::error!(error = %map_link_error(&*e), "weight read failed, skipping sample");
                None
            }
        }
    }

    fn read_battery(&mut self) -> Option<u8> {
        match self.link.battery_pct() {
            Ok(b) => b,
            Err(e) => {
                tracing::debug!(error = %map_link_error(&*e), "battery read failed");
                None
            }
        }
    }

    fn record_flow(&mut self, w: f32, now: Instant) {
        if let Some((prev_w, prev_t)) = self.prev_sample
            && let Some(rate) = flow_rate_gps(w - prev_w, now.saturating_duration_since(prev_t))
        {
            self.flow.record(rate, &self.state, now);
        }
        self.prev_sample = Some((w, now));
    }

    /// Stop once the weight reaches target minus the learned overshoot, and
    /// queue a calibration for the preset the shot started on.
    fn check_auto_stop(&mut self, w: f32, now: Instant) -> bool {
        if !self.state.relay_on() {
            return false;
        }
        let (threshold, current) = {
            let store = lock_presets(&self.presets);
            (store.current().stop_threshold(), store.current_id())
        };
        if w < threshold {
            return false;
        }
        tracing::debug!(weight_g = w, threshold, "auto-stop threshold reached");
        let Some(shot_duration) = self.stop_shot(now, StopReason::AutoStop) else {
            return false;
        };
        let job = CalibrationJob {
            preset: self.shot_preset.take().unwrap_or(current),
            shot_duration,
        };
        match &self.calibrator {
            Some(worker) if worker.submit(job) => tracing::debug!(?job, "calibration scheduled"),
            Some(_) => tracing::warn!("calibration worker gone, job dropped"),
            None => tracing::debug!("no calibration worker attached"),
        }
        true
    }

    fn publish_snapshot(&mut self, weight: Option<f32>, now: Instant) -> u64 {
        self.seq += 1;
        let complete = weight.is_some() && self.battery.is_some();
        let snapshot = DisplaySnapshot {
            seq: self.seq,
            weight_g: weight,
            sample_interval: self.cfg.tick,
            preset: lock_presets(&self.presets).current().clone(),
            flow: self.flow.to_vec(),
            battery_pct: self.battery,
            relay_on: self.state.relay_on(),
            shot_elapsed: self.state.elapsed(now),
            // Only consume the request with a frame that will actually be drawn.
            save_requested: complete && self.save.take(),
            smoothing_window: self.cfg.smoothing_window,
        };
        self.display.publish(snapshot);
        self.seq
    }
}

impl Drop for ControlLoop {
    fn drop(&mut self) {
        self.finish();
    }
}
