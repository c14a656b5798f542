//! Relay state and shot timing.
use std::time::{Duration, Instant};

/// Dispense relay state as seen by the control loop.
///
/// `shot_start` only moves on OFF→ON and `relay_off_at` only on ON→OFF, so
/// the elapsed time is live while dispensing and frozen once stopped.
#[derive(Debug, Clone, Copy)]
pub struct DispenseState {
    relay_on: bool,
    shot_start: Option<Instant>,
    relay_off_at: Instant,
}

impl DispenseState {
    pub fn new(now: Instant) -> Self {
        Self {
            relay_on: false,
            shot_start: None,
            relay_off_at: now,
        }
    }

    #[inline]
    pub fn relay_on(&self) -> bool {
        self.relay_on
    }

    pub fn shot_start(&self) -> Option<Instant> {
        self.shot_start
    }

    pub fn relay_off_at(&self) -> Instant {
        self.relay_off_at
    }

    /// OFF→ON. Returns false (and changes nothing) if already on.
    pub fn start(&mut self, now: Instant) -> bool {
        if self.relay_on {
            return false;
        }
        self.relay_on = true;
        self.shot_start = Some(now);
        true
    }

    /// ON→OFF. Returns false (and changes nothing) if already off.
    pub fn stop(&mut self, now: Instant) -> bool {
        if !self.relay_on {
            return false;
        }
        self.relay_on = false;
        self.relay_off_at = now;
        true
    }

    /// Shot time: live while on, frozen at the stop while off, zero before any shot.
    pub fn elapsed(&self, now: Instant) -> Duration {
        match self.shot_start {
            None => Duration::ZERO,
            Some(start) if self.relay_on => now.saturating_duration_since(start),
            Some(start) => self.relay_off_at.saturating_duration_since(start),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elapsed_is_live_then_frozen() {
        let t0 = Instant::now();
        let mut st = DispenseState::new(t0);
        assert_eq!(st.elapsed(t0 + Duration::from_secs(5)), Duration::ZERO);

        assert!(st.start(t0 + Duration::from_secs(1)));
        assert_eq!(st.elapsed(t0 + Duration::from_secs(4)), Duration::from_secs(3));

        assert!(st.stop(t0 + Duration::from_secs(26)));
        assert_eq!(st.elapsed(t0 + Duration::from_secs(90)), Duration::from_secs(25));
    }

    #[test]
    fn repeated_edges_are_ignored() {
        let t0 = Instant::now();
        let mut st = DispenseState::new(t0);
        assert!(!st.stop(t0 + Duration::from_secs(1)));
        assert_eq!(st.relay_off_at(), t0);

        assert!(st.start(t0 + Duration::from_secs(2)));
        assert!(!st.start(t0 + Duration::from_secs(3)));
        assert_eq!(st.shot_start(), Some(t0 + Duration::from_secs(2)));
    }
}
