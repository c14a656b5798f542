//! Flow-rate history for the shot graph.
//!
//! A bounded FIFO of g/s samples. Samples are only taken while dispensing
//! and for a short decay window after the stop, so the graph shows the
//! shot's tail but not the idle noise afterwards.
use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::dispense::DispenseState;

pub const DEFAULT_DECAY: Duration = Duration::from_secs(3);

#[derive(Debug, Clone)]
pub struct FlowBuffer {
    samples: VecDeque<f32>,
    capacity: usize,
    decay: Duration,
}

impl FlowBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
            decay: DEFAULT_DECAY,
        }
    }

    /// Enough room for a one-minute shot at the given tick period.
    pub fn for_tick(tick: Duration) -> Self {
        Self::with_capacity(crate::util::flow_capacity(tick))
    }

    pub fn with_decay(mut self, decay: Duration) -> Self {
        self.decay = decay;
        self
    }

    /// Record a sample if dispensing or within the decay window after the
    /// last stop. Returns whether it was kept.
    pub fn record(&mut self, sample: f32, state: &DispenseState, now: Instant) -> bool {
        let accepting = state.relay_on() || now <= state.relay_off_at() + self.decay;
        if !accepting {
            return false;
        }
        self.samples.push_back(sample);
        if self.samples.len() > self.capacity {
            self.samples.pop_front();
        }
        true
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Oldest first.
    pub fn samples(&self) -> impl ExactSizeIterator<Item = f32> + '_ {
        self.samples.iter().copied()
    }

    pub fn to_vec(&self) -> Vec<f32> {
        self.samples.iter().copied().collect()
    }
}

/// Rolling mean over `window` samples. The first `window - 1` positions have
/// no full window and are dropped, so the output is `window - 1` shorter than
/// the input (or empty).
pub fn moving_average(samples: &[f32], window: usize) -> Vec<f32> {
    let window = window.max(1);
    if samples.len() < window {
        return Vec::new();
    }
    let mut out = Vec::with_capacity(samples.len() + 1 - window);
    let mut sum: f64 = samples[..window].iter().map(|&v| f64::from(v)).sum();
    out.push((sum / window as f64) as f32);
    for i in window..samples.len() {
        sum += f64::from(samples[i]) - f64::from(samples[i - window]);
        out.push((sum / window as f64) as f32);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evicts_oldest_when_full() {
        let t0 = Instant::now();
        let mut st = DispenseState::new(t0);
        st.start(t0);
        let mut buf = FlowBuffer::with_capacity(3);
        for v in [1.0, 2.0, 3.0, 4.0, 5.0] {
            assert!(buf.record(v, &st, t0));
        }
        assert_eq!(buf.to_vec(), vec![3.0, 4.0, 5.0]);
    }

    #[test]
    fn accepts_only_within_decay_after_stop() {
        let t0 = Instant::now();
        let mut st = DispenseState::new(t0);
        st.start(t0);
        st.stop(t0 + Duration::from_secs(20));
        let mut buf = FlowBuffer::with_capacity(10);
        let off = st.relay_off_at();
        assert!(buf.record(1.0, &st, off + Duration::from_millis(2_900)));
        assert!(buf.record(1.0, &st, off + Duration::from_secs(3)));
        assert!(!buf.record(1.0, &st, off + Duration::from_millis(3_001)));
        assert_eq!(buf.len(), 2);
    }

    #[test]
    fn moving_average_drops_incomplete_windows() {
        let v = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        assert_eq!(moving_average(&v, 3), vec![2.0, 3.0, 4.0, 5.0]);
        assert_eq!(moving_average(&v, 1), v.to_vec());
        assert!(moving_average(&v, 7).is_empty());
        assert!(moving_average(&[], 0).is_empty());
    }
}
