//! Background overshoot learning.
//!
//! After an auto-stopped shot the control loop hands a `CalibrationJob` to a
//! single worker thread. The worker waits for the drips to settle, reads the
//! final weight and feeds it back into the preset that was active when the
//! shot started. Jobs queue up in submission order and run one at a time, so
//! two corrections never race on the same preset.
use crossbeam_channel as xch;
use shot_traits::Clock;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::config::CalibrationCfg;
use crate::preset::{OvershootUpdate, PresetId, SharedPresets, lock_presets};
use crate::signal::{Flag, WeightCell};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationJob {
    /// Preset that was current when the shot started.
    pub preset: PresetId,
    pub shot_duration: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CalibrationOutcome {
    /// Shot too short to learn from; nothing touched.
    Declined { shot_duration: Duration },
    Applied {
        preset: String,
        previous: f32,
        overshoot: f32,
    },
    Rejected { preset: String, candidate: f32 },
    /// Scale had no weight after the settle delay (e.g. disconnected).
    NoReading,
}

/// Run one job to completion on the calling thread.
pub fn calibrate(
    job: CalibrationJob,
    presets: &SharedPresets,
    weight: &WeightCell,
    save: &Flag,
    cfg: &CalibrationCfg,
    clock: &dyn Clock,
) -> CalibrationOutcome {
    if job.shot_duration < cfg.min_shot {
        tracing::info!(
            shot_ms = job.shot_duration.as_millis() as u64,
            "short shot, not updating overshoot"
        );
        return CalibrationOutcome::Declined {
            shot_duration: job.shot_duration,
        };
    }

    clock.sleep(cfg.settle);

    let Some(final_weight) = weight.get() else {
        tracing::warn!("no scale reading after settle, skipping calibration");
        return CalibrationOutcome::NoReading;
    };

    let mut store = lock_presets(presets);
    let name = store.get(job.preset).name.clone();
    match store.apply_overshoot_correction(job.preset, final_weight) {
        OvershootUpdate::Applied { previous, overshoot } => {
            drop(store);
            save.raise();
            tracing::info!(preset = %name, final_weight, previous, overshoot, "overshoot learned");
            CalibrationOutcome::Applied {
                preset: name,
                previous,
                overshoot,
            }
        }
        OvershootUpdate::Rejected { candidate } => CalibrationOutcome::Rejected {
            preset: name,
            candidate,
        },
    }
}

/// Single background thread that runs calibration jobs in FIFO order.
///
/// `submit` never blocks and never drops a job. Dropping the worker closes
/// the queue, waits for the queued jobs to finish and joins the thread.
pub struct CalibrationWorker {
    tx: Option<xch::Sender<CalibrationJob>>,
    outcomes: xch::Receiver<CalibrationOutcome>,
    join_handle: Option<JoinHandle<()>>,
}

impl CalibrationWorker {
    pub fn spawn(
        presets: SharedPresets,
        weight: WeightCell,
        save: Flag,
        cfg: CalibrationCfg,
        clock: Arc<dyn Clock + Send + Sync>,
    ) -> Self {
        let (tx, rx) = xch::unbounded::<CalibrationJob>();
        let (out_tx, outcomes) = xch::unbounded();

        let join_handle = std::thread::Builder::new()
            .name("calibration".into())
            .spawn(move || {
                for job in rx.iter() {
                    tracing::debug!(?job, "calibration job started");
                    let outcome = calibrate(job, &presets, &weight, &save, &cfg, clock.as_ref());
                    // Nobody listening for outcomes is fine.
                    let _ = out_tx.send(outcome);
                }
                tracing::trace!("calibration thread exiting cleanly");
            });

        let join_handle = match join_handle {
            Ok(h) => Some(h),
            Err(e) => {
                tracing::error!(error = %e, "failed to spawn calibration thread");
                None
            }
        };

        Self {
            tx: Some(tx),
            outcomes,
            join_handle,
        }
    }

    /// Queue a job. Returns false only if the worker is gone.
    pub fn submit(&self, job: CalibrationJob) -> bool {
        if self.join_handle.is_none() {
            return false;
        }
        match &self.tx {
            Some(tx) => tx.send(job).is_ok(),
            None => false,
        }
    }

    /// Completed outcomes, in the order the jobs were submitted.
    pub fn outcomes(&self) -> &xch::Receiver<CalibrationOutcome> {
        &self.outcomes
    }

    /// Jobs waiting behind the one in flight.
    pub fn pending(&self) -> usize {
        self.tx.as_ref().map_or(0, xch::Sender::len)
    }

    /// Close the queue and wait for every submitted job to finish.
    pub fn shutdown(&mut self) {
        self.tx.take();
        if let Some(handle) = self.join_handle.take() {
            match handle.join() {
                Ok(()) => tracing::trace!("calibration thread joined"),
                Err(e) => tracing::warn!(?e, "calibration thread panicked during shutdown"),
            }
        }
    }
}

impl Drop for CalibrationWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}
