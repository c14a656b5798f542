//! Non-blocking hand-off of loop state to the renderer.
//!
//! The control loop publishes one message per tick into an unbounded channel
//! and never waits on the renderer. The consumer side drains whatever has
//! piled up and acts on the newest message only, so a slow renderer skips
//! frames instead of falling behind.
use crossbeam_channel as xch;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::flow::moving_average;
use crate::preset::Preset;

/// Everything the renderer needs for one frame. Built once per tick and never
/// mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplaySnapshot {
    /// Production order; strictly increasing per loop.
    pub seq: u64,
    pub weight_g: Option<f32>,
    pub sample_interval: Duration,
    pub preset: Preset,
    /// Flow history in g/s, oldest first.
    pub flow: Vec<f32>,
    pub battery_pct: Option<u8>,
    pub relay_on: bool,
    pub shot_elapsed: Duration,
    /// Persist this frame (set after a successful calibration).
    pub save_requested: bool,
    pub smoothing_window: usize,
}

impl DisplaySnapshot {
    pub fn smoothed_flow(&self) -> Vec<f32> {
        moving_average(&self.flow, self.smoothing_window)
    }

    pub fn last_flow(&self) -> Option<f32> {
        self.flow.last().copied()
    }

    /// A frame is only drawn when both weight and battery are known.
    pub fn is_complete(&self) -> bool {
        self.weight_g.is_some() && self.battery_pct.is_some()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DisplayMsg {
    Show(Box<DisplaySnapshot>),
    /// Scale unreachable: power the surface down.
    Blank,
}

/// Rendering collaborator. Errors are logged by the consumer and never stop it.
pub trait Renderer: Send {
    fn power(&mut self, on: bool) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
    fn draw(&mut self, snapshot: &DisplaySnapshot)
    -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

impl<T: Renderer + ?Sized> Renderer for Box<T> {
    fn power(&mut self, on: bool) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        (**self).power(on)
    }
    fn draw(
        &mut self,
        snapshot: &DisplaySnapshot,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        (**self).draw(snapshot)
    }
}

/// What a drained batch boils down to.
#[derive(Debug, Clone, PartialEq)]
pub enum Coalesced {
    Nothing,
    Blank,
    Draw(Box<DisplaySnapshot>),
}

/// Latest-wins: only the last message of a batch matters.
pub fn coalesce<I: IntoIterator<Item = DisplayMsg>>(batch: I) -> Coalesced {
    match batch.into_iter().last() {
        None => Coalesced::Nothing,
        Some(DisplayMsg::Blank) => Coalesced::Blank,
        Some(DisplayMsg::Show(s)) => Coalesced::Draw(s),
    }
}

/// Producer handle held by the control loop.
#[derive(Debug, Clone)]
pub struct DisplayPublisher {
    tx: xch::Sender<DisplayMsg>,
}

impl DisplayPublisher {
    /// A publisher with no consumer; every message is discarded.
    pub fn detached() -> Self {
        let (tx, _rx) = xch::unbounded();
        Self { tx }
    }

    /// Never blocks. Returns false if the consumer is gone.
    pub fn publish(&self, snapshot: DisplaySnapshot) -> bool {
        self.send(DisplayMsg::Show(Box::new(snapshot)))
    }

    pub fn blank(&self) -> bool {
        self.send(DisplayMsg::Blank)
    }

    fn send(&self, msg: DisplayMsg) -> bool {
        let ok = self.tx.send(msg).is_ok();
        if !ok {
            tracing::trace!("display consumer gone, message dropped");
        }
        ok
    }

    /// Messages not yet picked up by the consumer.
    pub fn backlog(&self) -> usize {
        self.tx.len()
    }
}

/// Unconnected publisher/receiver pair; see [`DisplayConsumer`].
pub fn channel() -> (DisplayPublisher, xch::Receiver<DisplayMsg>) {
    let (tx, rx) = xch::unbounded();
    (DisplayPublisher { tx }, rx)
}

/// Consumer half: owns the renderer and its power state.
pub struct DisplayConsumer<R: Renderer> {
    rx: xch::Receiver<DisplayMsg>,
    renderer: R,
    powered: bool,
    last_drawn: Option<u64>,
}

impl<R: Renderer> DisplayConsumer<R> {
    /// The renderer is assumed to start powered off.
    pub fn new(rx: xch::Receiver<DisplayMsg>, renderer: R) -> Self {
        Self {
            rx,
            renderer,
            powered: false,
            last_drawn: None,
        }
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn is_powered(&self) -> bool {
        self.powered
    }

    /// `seq` of the last snapshot handed to the renderer.
    pub fn last_drawn(&self) -> Option<u64> {
        self.last_drawn
    }

    /// Act on everything queued right now without waiting.
    pub fn drain(&mut self) -> Coalesced {
        let batch: Vec<_> = self.rx.try_iter().collect();
        self.apply(coalesce(batch))
    }

    /// Wait up to `timeout` for a message, then drain the backlog behind it.
    /// `Err(())` once every publisher is gone.
    #[allow(clippy::result_unit_err)]
    pub fn wait_and_drain(&mut self, timeout: Duration) -> Result<Coalesced, ()> {
        match self.rx.recv_timeout(timeout) {
            Ok(first) => {
                let rest: Vec<_> = self.rx.try_iter().collect();
                let skipped = rest.len();
                if skipped > 0 {
                    tracing::trace!(skipped, "coalesced display backlog");
                }
                Ok(self.apply(coalesce(std::iter::once(first).chain(rest))))
            }
            Err(xch::RecvTimeoutError::Timeout) => Ok(Coalesced::Nothing),
            Err(xch::RecvTimeoutError::Disconnected) => Err(()),
        }
    }

    fn apply(&mut self, c: Coalesced) -> Coalesced {
        match &c {
            Coalesced::Nothing => {}
            Coalesced::Blank => self.set_power(false),
            Coalesced::Draw(snap) if !snap.is_complete() => {
                tracing::error!(
                    seq = snap.seq,
                    weight = ?snap.weight_g,
                    battery = ?snap.battery_pct,
                    "incomplete snapshot, skipping frame"
                );
            }
            Coalesced::Draw(snap) => {
                self.set_power(true);
                match self.renderer.draw(snap) {
                    Ok(()) => self.last_drawn = Some(snap.seq),
                    Err(e) => tracing::error!(seq = snap.seq, error = %e, "render failed"),
                }
            }
        }
        c
    }

    fn set_power(&mut self, on: bool) {
        if self.powered == on {
            return;
        }
        match self.renderer.power(on) {
            Ok(()) => {
                self.powered = on;
                tracing::debug!(on, "display power");
            }
            Err(e) => tracing::error!(on, error = %e, "display power switch failed"),
        }
    }

    /// Power down on exit.
    pub fn finish(mut self) -> R {
        self.set_power(false);
        self.renderer
    }
}

/// Rendering worker thread plus its publisher.
///
/// Dropping the bridge stops the thread and joins it.
pub struct DisplayBridge {
    publisher: DisplayPublisher,
    stop: Arc<AtomicBool>,
    join_handle: Option<JoinHandle<()>>,
}

impl DisplayBridge {
    /// Spawn the consumer thread. `poll` bounds how long it takes to notice `stop`.
    pub fn spawn<R: Renderer + 'static>(renderer: R, poll: Duration) -> Self {
        let (publisher, rx) = channel();
        let stop = Arc::new(AtomicBool::new(false));
        let stop_clone = stop.clone();

        let join_handle = std::thread::Builder::new()
            .name("display".into())
            .spawn(move || {
                let mut consumer = DisplayConsumer::new(rx, renderer);
                while !stop_clone.load(Ordering::Relaxed) {
                    if consumer.wait_and_drain(poll).is_err() {
                        tracing::debug!("display publishers gone, exiting");
                        break;
                    }
                }
                consumer.finish();
                tracing::trace!("display thread exiting cleanly");
            });

        let join_handle = match join_handle {
            Ok(h) => Some(h),
            Err(e) => {
                tracing::error!(error = %e, "failed to spawn display thread");
                None
            }
        };

        Self {
            publisher,
            stop,
            join_handle,
        }
    }

    pub fn publisher(&self) -> DisplayPublisher {
        self.publisher.clone()
    }

    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.join_handle.take() {
            match handle.join() {
                Ok(()) => tracing::trace!("display thread joined"),
                Err(e) => tracing::warn!(?e, "display thread panicked during shutdown"),
            }
        }
    }
}

impl Drop for DisplayBridge {
    fn drop(&mut self) {
        self.stop();
    }
}
