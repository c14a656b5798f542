//! Tick-rate helpers.
use std::time::Duration;

/// Seconds of flow history kept for the rate graph.
pub const FLOW_HISTORY_SECS: f64 = 60.0;

/// Flow buffer capacity for a tick period: `round(60 s / tick)`, at least 1.
#[inline]
pub fn flow_capacity(tick: Duration) -> usize {
    let secs = tick.as_secs_f64();
    if secs <= 0.0 {
        return 1;
    }
    ((FLOW_HISTORY_SECS / secs).round() as usize).max(1)
}

/// Ticks per second, rounded, at least 1. Used as the default smoothing window.
#[inline]
pub fn ticks_per_second(tick: Duration) -> usize {
    let secs = tick.as_secs_f64();
    if secs <= 0.0 {
        return 1;
    }
    ((1.0 / secs).round() as usize).max(1)
}

/// Flow rate in g/s rounded to one decimal, or `None` when no time has passed.
#[inline]
pub fn flow_rate_gps(delta_g: f32, elapsed: Duration) -> Option<f32> {
    let secs = elapsed.as_secs_f32();
    if secs <= 0.0 {
        return None;
    }
    Some((delta_g / secs * 10.0).round() / 10.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(100, 600)]
    #[case(250, 240)]
    #[case(70, 857)]
    #[case(120_000, 1)]
    fn capacity_covers_a_minute(#[case] tick_ms: u64, #[case] expected: usize) {
        assert_eq!(flow_capacity(Duration::from_millis(tick_ms)), expected);
    }

    #[test]
    fn zero_tick_is_clamped() {
        assert_eq!(flow_capacity(Duration::ZERO), 1);
        assert_eq!(ticks_per_second(Duration::ZERO), 1);
    }

    #[test]
    fn flow_rate_rounds_to_tenths() {
        let r = flow_rate_gps(0.234, Duration::from_millis(100)).unwrap();
        assert!((r - 2.3).abs() < 1e-6);
        assert_eq!(flow_rate_gps(1.0, Duration::ZERO), None);
    }
}
