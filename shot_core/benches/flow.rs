use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use shot_core::{DispenseState, FlowBuffer, moving_average};
use std::time::{Duration, Instant};

// Synthetic shot: ramp up to ~2 g/s with a little jitter
fn synth_flow(n: usize, seed: u32) -> Vec<f32> {
    // tiny PRNG
    let mut state = seed.max(1);
    let mut next_f32 = || {
        let mut x = state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        state = x;
        (x as f32) / (u32::MAX as f32 + 1.0)
    };
    (0..n)
        .map(|i| {
            let ramp = (i as f32 / 50.0).min(1.0) * 2.0;
            ramp + (next_f32() - 0.5) * 0.2
        })
        .collect()
}

pub fn bench_record(c: &mut Criterion) {
    let samples = synth_flow(2_000, 7);
    let t0 = Instant::now();
    let mut st = DispenseState::new(t0);
    st.start(t0);

    c.bench_function("flow_record_600_cap", |b| {
        b.iter_batched(
            || FlowBuffer::for_tick(Duration::from_millis(100)),
            |mut buf| {
                for &s in &samples {
                    buf.record(black_box(s), &st, t0);
                }
                buf
            },
            BatchSize::SmallInput,
        )
    });
}

pub fn bench_smoothing(c: &mut Criterion) {
    let samples = synth_flow(600, 11);
    c.bench_function("moving_average_600_w10", |b| {
        b.iter(|| moving_average(black_box(&samples), black_box(10)))
    });
}

criterion_group!(benches, bench_record, bench_smoothing);
criterion_main!(benches);
