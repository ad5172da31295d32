use criterion::{black_box, criterion_group, criterion_main, Criterion};
use floor_scanner::{
    config::EstimatorConfig,
    estimator::{floor_from_values, trim_low_outliers},
    types::ScanRange,
};

fn sample_values(n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| match i % 7 {
            0 => 0.0,
            1 => 0.002 * i as f64,
            _ => 0.5 + (i % 13) as f64 * 0.01,
        })
        .collect()
}

fn benchmark_floor_estimate(c: &mut Criterion) {
    let config = EstimatorConfig::default();
    let values = sample_values(50);

    c.bench_function("floor_from_values_50", |b| {
        b.iter(|| floor_from_values(black_box(&values), black_box(&config)))
    });
}

fn benchmark_gap_filter(c: &mut Criterion) {
    let mut sorted: Vec<f64> = (1..=1_000).map(|i| 1.5f64.powi(i % 40)).collect();
    sorted.sort_by(|a, b| a.total_cmp(b));

    c.bench_function("trim_low_outliers_1000", |b| {
        b.iter(|| {
            let mut pool = sorted.clone();
            trim_low_outliers(black_box(&mut pool), 0.7)
        })
    });
}

fn benchmark_chunk_plan(c: &mut Criterion) {
    let range = ScanRange::trailing(5_000_000, 70_000);

    c.bench_function("chunk_70k_window", |b| {
        b.iter(|| black_box(range).chunks(black_box(2_000)))
    });
}

criterion_group!(benches, benchmark_floor_estimate, benchmark_gap_filter, benchmark_chunk_plan);
criterion_main!(benches);
