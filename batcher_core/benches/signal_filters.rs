use batcher_core::{
    DetectorCfg, DischargeDetector, DisplayGate, Material, StabilizerCfg, WeightStabilizer,
};
use batcher_traits::Weights;
use chrono::{TimeZone, Utc};
use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};

// Fill/discharge sawtooth with xorshift noise, in kilograms
fn synth_trace(n: usize, noise_kg: f64, seed: u32) -> Vec<f64> {
    let mut state = seed.max(1);
    let mut next = || {
        let mut x = state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        state = x;
        f64::from(x) / (f64::from(u32::MAX) + 1.0)
    };
    (0..n)
        .map(|i| {
            let phase = i % 400;
            let base = if phase < 300 {
                phase as f64 * 2.0
            } else {
                (400 - phase) as f64 * 6.0
            };
            base + (next() * 2.0 - 1.0) * noise_kg
        })
        .collect()
}

fn group_settings(g: &mut criterion::BenchmarkGroup<'_, criterion::measurement::WallTime>) {
    // BENCH_SAMPLE_SIZE=10 BENCH_MEAS_MS=50 cargo bench -p batcher_core --bench signal_filters
    if let Ok(ss) = std::env::var("BENCH_SAMPLE_SIZE") {
        if let Ok(n) = ss.parse::<usize>() {
            g.sample_size(n.max(1));
        }
    } else {
        g.sample_size(50);
    }
    if let Ok(ms) = std::env::var("BENCH_MEAS_MS")
        && let Ok(ms_u64) = ms.parse::<u64>()
    {
        g.measurement_time(std::time::Duration::from_millis(ms_u64));
    }
}

pub fn bench_stabilizer(c: &mut Criterion) {
    let mut g = c.benchmark_group("stabilizer");
    group_settings(&mut g);

    let trace = synth_trace(20_000, 8.0, 0xC0FFEE);
    let gate = DisplayGate {
        frozen: false,
        aggregate_valve_closed: false,
    };
    g.bench_function("observe_poll_200ms", |b| {
        b.iter_batched(
            || WeightStabilizer::new(StabilizerCfg::default()),
            |mut s| {
                for (i, &v) in trace.iter().enumerate() {
                    let now = i as u64 * 200;
                    let w = Weights {
                        pasir: v,
                        batu: v * 1.5,
                        semen: v * 0.5,
                        air: v * 0.25,
                    };
                    s.observe(black_box(&w), now, gate);
                    black_box(s.poll(now, gate));
                }
                black_box(s.snapshot());
            },
            BatchSize::SmallInput,
        )
    });
    g.finish();
}

pub fn bench_detector(c: &mut Criterion) {
    let mut g = c.benchmark_group("detector");
    group_settings(&mut g);

    let trace = synth_trace(20_000, 3.0, 0xBADA55);
    let t0 = Utc.timestamp_millis_opt(0).single().unwrap_or_default();
    for &drop_kg in &[30.0f64, 80.0] {
        let cfg = DetectorCfg {
            drop_kg,
            ..DetectorCfg::default()
        };
        g.bench_function(format!("observe_drop_{drop_kg}"), |b| {
            b.iter_batched(
                || DischargeDetector::new(cfg),
                |mut d| {
                    let mut events = 0usize;
                    for (i, &v) in trace.iter().enumerate() {
                        let at = t0 + chrono::Duration::milliseconds(i as i64 * 500);
                        if d.observe(Material::Semen, black_box(v), at).is_some() {
                            events += 1;
                        }
                    }
                    events += d.flush().len();
                    black_box(events);
                },
                BatchSize::SmallInput,
            )
        });
    }
    g.finish();
}

criterion_group!(signal_filters, bench_stabilizer, bench_detector);
criterion_main!(signal_filters);
