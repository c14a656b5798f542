//! Target presets and overshoot learning.
//!
//! Exactly three presets live in a fixed rotation; the head of the rotation
//! is the current preset. Presets are never created or destroyed after
//! startup, so a `PresetId` stays valid for the life of the store and can be
//! handed to the calibration worker even if the operator rotates meanwhile.
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Number of presets in the rotation.
pub const PRESET_COUNT: usize = 3;

pub const DEFAULT_TARGET_G: f32 = 40.0;
pub const DEFAULT_OVERSHOOT_G: f32 = 2.0;

/// Stable handle to one preset slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PresetId(usize);

impl PresetId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Preset {
    pub name: String,
    pub target_g: f32,
    /// Learned correction subtracted from the target to decide when to stop.
    pub overshoot_g: f32,
    /// Display colour, `#rrggbb`.
    pub color: String,
}

impl Preset {
    pub fn new(name: impl Into<String>, color: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            target_g: DEFAULT_TARGET_G,
            overshoot_g: DEFAULT_OVERSHOOT_G,
            color: color.into(),
        }
    }

    pub fn with_target(mut self, target_g: f32, overshoot_g: f32) -> Self {
        self.target_g = target_g;
        self.overshoot_g = overshoot_g;
        self
    }

    /// Weight at which the relay is switched off.
    #[inline]
    pub fn stop_threshold(&self) -> f32 {
        self.target_g - self.overshoot_g
    }
}

/// Result of feeding a final shot weight back into a preset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OvershootUpdate {
    Applied { previous: f32, overshoot: f32 },
    /// Candidate fell outside the allowed band; overshoot left unchanged.
    Rejected { candidate: f32 },
}

/// `overshoot + (final_weight - target)` if it lies within `[-limit, limit]`.
#[inline]
pub fn corrected_overshoot(
    overshoot: f32,
    target: f32,
    final_weight: f32,
    limit: f32,
) -> Result<f32, f32> {
    let candidate = overshoot + (final_weight - target);
    if candidate.is_finite() && (-limit..=limit).contains(&candidate) {
        Ok(candidate)
    } else {
        Err(candidate)
    }
}

#[derive(Debug, Clone)]
pub struct PresetStore {
    presets: [Preset; PRESET_COUNT],
    head: usize,
    overshoot_limit_g: f32,
}

impl Default for PresetStore {
    fn default() -> Self {
        Self::new([
            Preset::new("A", "#376efa"),
            Preset::new("B", "#25a602"),
            Preset::new("C", "#ff1303"),
        ])
    }
}

impl PresetStore {
    pub fn new(presets: [Preset; PRESET_COUNT]) -> Self {
        Self {
            presets,
            head: 0,
            overshoot_limit_g: 10.0,
        }
    }

    pub fn with_overshoot_limit(mut self, limit_g: f32) -> Self {
        self.overshoot_limit_g = limit_g;
        self
    }

    pub fn set_overshoot_limit(&mut self, limit_g: f32) {
        self.overshoot_limit_g = limit_g;
    }

    pub fn overshoot_limit(&self) -> f32 {
        self.overshoot_limit_g
    }

    pub fn current_id(&self) -> PresetId {
        PresetId(self.head)
    }

    pub fn current(&self) -> &Preset {
        &self.presets[self.head]
    }

    pub fn get(&self, id: PresetId) -> &Preset {
        &self.presets[id.0]
    }

    /// Presets in rotation order, current first.
    pub fn iter(&self) -> impl Iterator<Item = &Preset> + '_ {
        (0..PRESET_COUNT).map(move |i| &self.presets[(self.head + i) % PRESET_COUNT])
    }

    /// Advance the rotation by one; three rotations are the identity.
    pub fn rotate(&mut self) {
        self.head = (self.head + 1) % PRESET_COUNT;
        tracing::debug!(preset = %self.current().name, "preset rotated");
    }

    // Targets are intentionally unbounded here; range policy belongs to the
    // operator panel.
    pub fn increment(&mut self, amount: f32) {
        let p = &mut self.presets[self.head];
        p.target_g += amount;
        tracing::debug!(preset = %p.name, target_g = p.target_g, "target increased");
    }

    pub fn decrement(&mut self, amount: f32) {
        let p = &mut self.presets[self.head];
        p.target_g -= amount;
        tracing::debug!(preset = %p.name, target_g = p.target_g, "target decreased");
    }

    /// Learn from a finished shot on preset `id` (the one active at shot start).
    pub fn apply_overshoot_correction(&mut self, id: PresetId, final_weight: f32) -> OvershootUpdate {
        let limit = self.overshoot_limit_g;
        let p = &mut self.presets[id.0];
        match corrected_overshoot(p.overshoot_g, p.target_g, final_weight, limit) {
            Ok(overshoot) => {
                let previous = p.overshoot_g;
                p.overshoot_g = overshoot;
                tracing::debug!(preset = %p.name, previous, overshoot, "overshoot updated");
                OvershootUpdate::Applied { previous, overshoot }
            }
            Err(candidate) => {
                tracing::warn!(
                    preset = %p.name,
                    candidate,
                    limit,
                    final_weight,
                    "overshoot correction out of range, ignoring"
                );
                OvershootUpdate::Rejected { candidate }
            }
        }
    }
}

/// Presets shared between the control loop and the calibration worker.
pub type SharedPresets = Arc<Mutex<PresetStore>>;

pub fn shared(store: PresetStore) -> SharedPresets {
    Arc::new(Mutex::new(store))
}

/// Lock the shared presets. A panic on another thread while holding the lock
/// does not leave a preset half-written, so poisoning is ignored.
pub fn lock_presets(presets: &SharedPresets) -> MutexGuard<'_, PresetStore> {
    presets.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn names(store: &PresetStore) -> Vec<String> {
        store.iter().map(|p| p.name.clone()).collect()
    }

    #[test]
    fn rotate_cycles_with_period_three() {
        let mut store = PresetStore::default();
        let before = names(&store);
        let second = store.iter().nth(1).cloned().unwrap();
        store.rotate();
        assert_eq!(store.current(), &second);
        store.rotate();
        store.rotate();
        assert_eq!(names(&store), before);
    }

    #[test]
    fn adjust_touches_current_only() {
        let mut store = PresetStore::default();
        store.increment(1.0);
        store.increment(0.1);
        assert!((store.current().target_g - 41.1).abs() < 1e-4);
        store.rotate();
        store.decrement(0.1);
        assert!((store.current().target_g - 39.9).abs() < 1e-4);
        let a = store.iter().nth(2).unwrap();
        assert_eq!(a.name, "A");
        assert!((a.target_g - 41.1).abs() < 1e-4);
    }

    #[test]
    fn target_may_go_negative() {
        let mut store = PresetStore::new([
            Preset::new("A", "#000000").with_target(0.5, 0.0),
            Preset::new("B", "#000000"),
            Preset::new("C", "#000000"),
        ]);
        store.decrement(1.0);
        assert!(store.current().target_g < 0.0);
    }

    #[rstest]
    #[case(2.0, 40.3, Some(2.3))]
    #[case(2.0, 38.0, Some(0.0))]
    #[case(2.0, 48.0, Some(10.0))]
    #[case(-2.0, 32.0, Some(-10.0))]
    #[case(2.0, 48.5, None)]
    #[case(0.0, 0.0, None)]
    fn correction_band(#[case] overshoot: f32, #[case] final_w: f32, #[case] want: Option<f32>) {
        let got = corrected_overshoot(overshoot, 40.0, final_w, 10.0).ok();
        match (got, want) {
            (Some(g), Some(w)) => assert!((g - w).abs() < 1e-4, "{g} != {w}"),
            (None, None) => {}
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn correction_targets_given_preset_not_current() {
        let mut store = PresetStore::default();
        let id = store.current_id();
        store.rotate();
        let upd = store.apply_overshoot_correction(id, 40.3);
        assert!(matches!(upd, OvershootUpdate::Applied { .. }));
        assert!((store.get(id).overshoot_g - 2.3).abs() < 1e-4);
        assert_eq!(store.current().overshoot_g, DEFAULT_OVERSHOOT_G);
    }

    #[test]
    fn rejected_correction_leaves_overshoot() {
        let mut store = PresetStore::default();
        let id = store.current_id();
        let upd = store.apply_overshoot_correction(id, f32::NAN);
        assert!(matches!(upd, OvershootUpdate::Rejected { .. }));
        let upd = store.apply_overshoot_correction(id, 0.0);
        assert_eq!(upd, OvershootUpdate::Rejected { candidate: -38.0 });
        assert_eq!(store.get(id).overshoot_g, DEFAULT_OVERSHOOT_G);
    }
}
