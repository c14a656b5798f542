//! Lock-free cells shared between the control loop and its workers.
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

const NO_READING: u32 = u32::MAX;

/// Latest scale weight, written by the control loop each tick and read by
/// the calibration worker after its settle delay.
#[derive(Debug, Clone)]
pub struct WeightCell(Arc<AtomicU32>);

impl Default for WeightCell {
    fn default() -> Self {
        Self(Arc::new(AtomicU32::new(NO_READING)))
    }
}

impl WeightCell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, grams: Option<f32>) {
        let bits = match grams {
            Some(g) if g.is_finite() => g.to_bits(),
            _ => NO_READING,
        };
        self.0.store(bits, Ordering::Release);
    }

    pub fn get(&self) -> Option<f32> {
        match self.0.load(Ordering::Acquire) {
            NO_READING => None,
            bits => Some(f32::from_bits(bits)),
        }
    }
}

/// One-shot request flag: set by a worker, consumed by the next snapshot.
#[derive(Debug, Clone, Default)]
pub struct Flag(Arc<AtomicBool>);

impl Flag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Read and clear.
    pub fn take(&self) -> bool {
        self.0.swap(false, Ordering::AcqRel)
    }
}

/// Cooperative shutdown token shared by the loop and its workers.
#[derive(Debug, Clone, Default)]
pub struct Shutdown(Arc<AtomicBool>);

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    #[inline]
    pub fn is_triggered(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weight_cell_round_trips_and_clears() {
        let cell = WeightCell::new();
        assert_eq!(cell.get(), None);
        cell.set(Some(40.3));
        assert_eq!(cell.clone().get(), Some(40.3));
        cell.set(Some(f32::NAN));
        assert_eq!(cell.get(), None);
    }

    #[test]
    fn flag_take_clears() {
        let f = Flag::new();
        assert!(!f.take());
        f.clone().raise();
        assert!(f.is_raised());
        assert!(f.take());
        assert!(!f.take());
    }
}
