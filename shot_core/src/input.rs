//! Operator panel to `Command` translation.
//!
//! The hardware layer hands us debounced levels; this module turns them into
//! edges and hold-repeats and posts the resulting commands to the control
//! loop's channel.
use crossbeam_channel as xch;
use shot_traits::{Clock, OperatorPanel, PanelLevels};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::config::InputCfg;
use crate::control::Command;
use crate::signal::Shutdown;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Pressed,
    Released,
}

/// Level-to-edge conversion. The first sample only primes the tracker, so a
/// button held down at startup does not fire.
#[derive(Debug, Default, Clone)]
pub struct EdgeTracker {
    level: Option<bool>,
}

impl EdgeTracker {
    pub fn update(&mut self, level: bool) -> Option<Edge> {
        match self.level.replace(level) {
            Some(false) if level => Some(Edge::Pressed),
            Some(true) if !level => Some(Edge::Released),
            _ => None,
        }
    }
}

/// Adjust-button behaviour: one short step on press, then once the button has
/// been held past the hold time, a long step at most once per repeat period
/// regardless of how fast the panel is polled.
#[derive(Debug, Clone)]
pub struct HoldRepeat {
    edge: EdgeTracker,
    pressed_at: Option<Instant>,
    last_step: Option<Instant>,
    hold: Duration,
    repeat: Duration,
    short_step: f32,
    long_step: f32,
}

impl HoldRepeat {
    pub fn new(cfg: &InputCfg) -> Self {
        Self {
            edge: EdgeTracker::default(),
            pressed_at: None,
            last_step: None,
            hold: cfg.hold,
            repeat: cfg.repeat,
            short_step: cfg.short_step_g,
            long_step: cfg.long_step_g,
        }
    }

    /// Step to apply for this poll, if any.
    pub fn update(&mut self, level: bool, now: Instant) -> Option<f32> {
        match self.edge.update(level) {
            Some(Edge::Pressed) => {
                self.pressed_at = Some(now);
                self.last_step = Some(now);
                Some(self.short_step)
            }
            Some(Edge::Released) => {
                self.pressed_at = None;
                self.last_step = None;
                None
            }
            None => match (self.pressed_at, self.last_step) {
                (Some(t), Some(last))
                    if level
                        && now.saturating_duration_since(t) >= self.hold
                        && now.saturating_duration_since(last) >= self.repeat =>
                {
                    self.last_step = Some(now);
                    Some(self.long_step)
                }
                _ => None,
            },
        }
    }
}

/// Whole-panel tracker.
#[derive(Debug, Clone)]
pub struct PanelTracker {
    paddle: EdgeTracker,
    tare: EdgeTracker,
    preset: EdgeTracker,
    up: HoldRepeat,
    down: HoldRepeat,
    link_switch: Option<bool>,
}

impl PanelTracker {
    pub fn new(cfg: &InputCfg) -> Self {
        Self {
            paddle: EdgeTracker::default(),
            tare: EdgeTracker::default(),
            preset: EdgeTracker::default(),
            up: HoldRepeat::new(cfg),
            down: HoldRepeat::new(cfg),
            link_switch: None,
        }
    }

    /// Commands produced by one poll. The link switch is reported on the
    /// first poll and on every change after that.
    pub fn poll(&mut self, levels: PanelLevels, now: Instant) -> Vec<Command> {
        let mut out = Vec::new();
        if self.link_switch != Some(levels.link_switch) {
            self.link_switch = Some(levels.link_switch);
            out.push(Command::LinkEnabled(levels.link_switch));
        }
        match self.paddle.update(levels.paddle) {
            Some(Edge::Pressed) => out.push(Command::StartShot),
            Some(Edge::Released) => out.push(Command::StopShot),
            None => {}
        }
        if self.tare.update(levels.tare) == Some(Edge::Pressed) {
            out.push(Command::Tare);
        }
        if self.preset.update(levels.preset) == Some(Edge::Pressed) {
            out.push(Command::RotatePreset);
        }
        if let Some(step) = self.up.update(levels.target_up, now) {
            out.push(Command::Adjust(step));
        }
        if let Some(step) = self.down.update(levels.target_down, now) {
            out.push(Command::Adjust(-step));
        }
        out
    }
}

/// Thread that polls an `OperatorPanel` and forwards commands.
pub struct PanelPoller {
    join_handle: Option<JoinHandle<()>>,
    shutdown: Shutdown,
}

impl PanelPoller {
    pub fn spawn<P: OperatorPanel + Send + 'static>(
        mut panel: P,
        commands: xch::Sender<Command>,
        cfg: InputCfg,
        period: Duration,
        clock: Arc<dyn Clock + Send + Sync>,
        shutdown: Shutdown,
    ) -> Self {
        let stop = shutdown.clone();
        let join_handle = std::thread::Builder::new()
            .name("panel".into())
            .spawn(move || {
                let mut tracker = PanelTracker::new(&cfg);
                while !stop.is_triggered() {
                    match panel.levels() {
                        Ok(levels) => {
                            for cmd in tracker.poll(levels, clock.now()) {
                                if commands.send(cmd).is_err() {
                                    tracing::debug!("control loop gone, panel poller exiting");
                                    return;
                                }
                            }
                        }
                        Err(e) => tracing::error!(error = %e, "panel read failed"),
                    }
                    clock.sleep(period);
                }
                tracing::trace!("panel thread exiting cleanly");
            });

        let join_handle = match join_handle {
            Ok(h) => Some(h),
            Err(e) => {
                tracing::error!(error = %e, "failed to spawn panel thread");
                None
            }
        };
        Self {
            join_handle,
            shutdown,
        }
    }

    pub fn stop(&mut self) {
        self.shutdown.trigger();
        if let Some(handle) = self.join_handle.take()
            && let Err(e) = handle.join()
        {
            tracing::warn!(?e, "panel thread panicked during shutdown");
        }
    }
}

impl Drop for PanelPoller {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(t0: Instant, ms: u64) -> Instant {
        t0 + Duration::from_millis(ms)
    }

    #[test]
    fn held_button_switches_to_long_step() {
        let t0 = Instant::now();
        let mut h = HoldRepeat::new(&InputCfg::default());
        assert_eq!(h.update(false, t0), None);
        assert_eq!(h.update(true, ms(t0, 100)), Some(0.1));
        assert_eq!(h.update(true, ms(t0, 200)), None);
        assert_eq!(h.update(true, ms(t0, 600)), Some(1.0));
        assert_eq!(h.update(true, ms(t0, 700)), Some(1.0));
        assert_eq!(h.update(false, ms(t0, 800)), None);
        assert_eq!(h.update(false, ms(t0, 2_000)), None);
    }

    #[test]
    fn long_step_is_paced_by_repeat_not_poll_rate() {
        let t0 = Instant::now();
        let mut p = PanelTracker::new(&InputCfg::default());
        p.poll(PanelLevels::default(), t0);
        let held = PanelLevels {
            target_up: true,
            ..PanelLevels::default()
        };
        // Held for 1.5 s, polled every 10 ms.
        let total: f32 = (1..=150u64)
            .flat_map(|i| p.poll(held, ms(t0, i * 10)))
            .map(|cmd| match cmd {
                Command::Adjust(step) => step,
                other => panic!("unexpected {other:?}"),
            })
            .sum();
        assert!((total - 10.1).abs() < 1e-3, "total {total}");
    }

    #[test]
    fn release_resets_repeat_pacing() {
        let t0 = Instant::now();
        let mut h = HoldRepeat::new(&InputCfg::default());
        h.update(false, t0);
        assert_eq!(h.update(true, ms(t0, 10)), Some(0.1));
        assert_eq!(h.update(true, ms(t0, 510)), Some(1.0));
        assert_eq!(h.update(true, ms(t0, 550)), None);
        assert_eq!(h.update(false, ms(t0, 560)), None);
        assert_eq!(h.update(true, ms(t0, 570)), Some(0.1));
        assert_eq!(h.update(true, ms(t0, 1_000)), None);
        assert_eq!(h.update(true, ms(t0, 1_070)), Some(1.0));
    }

    #[test]
    fn paddle_edges_and_initial_switch() {
        let t0 = Instant::now();
        let mut p = PanelTracker::new(&InputCfg::default());
        let idle = PanelLevels {
            link_switch: true,
            ..PanelLevels::default()
        };
        assert_eq!(p.poll(idle, t0), vec![Command::LinkEnabled(true)]);
        let pressed = PanelLevels {
            paddle: true,
            preset: true,
            ..idle
        };
        assert_eq!(
            p.poll(pressed, t0),
            vec![Command::StartShot, Command::RotatePreset]
        );
        assert_eq!(p.poll(pressed, t0), Vec::<Command>::new());
        let off = PanelLevels::default();
        assert_eq!(
            p.poll(off, t0),
            vec![Command::LinkEnabled(false), Command::StopShot]
        );
    }

    #[test]
    fn button_held_at_startup_does_not_fire() {
        let mut e = EdgeTracker::default();
        assert_eq!(e.update(true), None);
        assert_eq!(e.update(false), Some(Edge::Released));
        assert_eq!(e.update(true), Some(Edge::Pressed));
    }
}
