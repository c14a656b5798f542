//! Frame layout.
use std::fmt::Write;

use shot_core::DisplaySnapshot;

const BARS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// One character per bucket, scaled to the largest value (at least 1 g/s).
/// Longer inputs are averaged into `width` buckets; negative rates draw as
/// the lowest bar.
pub fn sparkline(samples: &[f32], width: usize) -> String {
    if samples.is_empty() || width == 0 {
        return String::new();
    }
    let buckets: Vec<f32> = if samples.len() <= width {
        samples.to_vec()
    } else {
        (0..width)
            .map(|i| {
                let lo = i * samples.len() / width;
                let hi = ((i + 1) * samples.len() / width).max(lo + 1);
                let chunk = &samples[lo..hi];
                chunk.iter().sum::<f32>() / chunk.len() as f32
            })
            .collect()
    };
    let top = buckets.iter().copied().fold(1.0f32, f32::max);
    buckets
        .iter()
        .map(|&v| {
            let level = (v.max(0.0) / top * (BARS.len() - 1) as f32).round() as usize;
            BARS[level.min(BARS.len() - 1)]
        })
        .collect()
}

fn grams(v: Option<f32>) -> String {
    v.map_or_else(|| "--".to_string(), |g| format!("{g:.1}"))
}

/// Render a snapshot as text, `width` columns wide.
pub fn render_frame(s: &DisplaySnapshot, width: usize) -> String {
    let col = width / 2;
    let mut out = String::new();
    let target_label = format!("target {}(g)", s.preset.name);
    let _ = writeln!(out, "{:<col$}{}", "weight(g)", target_label);
    let _ = writeln!(
        out,
        "{:<col$}{:.1}",
        grams(s.weight_g),
        s.preset.target_g
    );
    let _ = writeln!(out, "{:<col$}{}", "time(s)", "overshoot(g)");
    let _ = writeln!(
        out,
        "{:<col$}{:.1}",
        format!("{:.1}", s.shot_elapsed.as_secs_f32()),
        s.preset.overshoot_g
    );
    let _ = writeln!(out, "flow(g/s) {}", grams(s.last_flow()));
    let _ = writeln!(out, "{}", sparkline(&s.smoothed_flow(), width));
    let paddle = if s.relay_on { "ON" } else { "OFF" };
    let battery = s
        .battery_pct
        .map_or_else(|| "--".to_string(), |b| format!("{b}%"));
    let _ = writeln!(
        out,
        "{:<col$}{}",
        format!("paddle:{paddle}"),
        format!("battery:{battery}")
    );
    let _ = writeln!(out, "preset {} {}", s.preset.name, s.preset.color);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(&[0.0, 1.0], 10, "▁█")]
    #[case(&[0.0, 2.0, 4.0], 10, "▁▅█")]
    #[case(&[-1.0, 0.5], 10, "▁▅")]
    #[case(&[0.0, 0.0, 4.0, 4.0], 2, "▁█")]
    fn sparkline_scales_and_buckets(#[case] v: &[f32], #[case] w: usize, #[case] want: &str) {
        assert_eq!(sparkline(v, w), want);
    }

    #[test]
    fn sparkline_empty() {
        assert_eq!(sparkline(&[], 10), "");
        assert_eq!(sparkline(&[1.0], 0), "");
    }
}
