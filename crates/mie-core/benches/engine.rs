use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};
use mie_core::{ComputeEngine, GridRange, ScenarioRequest, compute};
use num_complex::Complex64;

fn bench_raw_batch(c: &mut Criterion) {
    let engine = ComputeEngine::new(4).unwrap();
    let mut scenario = ScenarioRequest::log_normal(
        Complex64::new(1.83, 0.0),
        1.55,
        1.0,
        0.5,
        GridRange::new(0.4, 0.8, 8),
        GridRange::new(1.0, 4.0, 8),
    );
    scenario.effective_model = false;

    c.bench_function("raw_batch_8x8", |b| {
        b.iter(|| compute(&engine, black_box(&scenario)).unwrap())
    });
}

fn bench_effective_batch(c: &mut Criterion) {
    let engine = ComputeEngine::new(4).unwrap();
    let scenario = ScenarioRequest::log_normal(
        Complex64::new(1.83, 0.0),
        1.55,
        1.0,
        0.5,
        GridRange::new(0.4, 0.8, 4),
        GridRange::new(1.0, 4.0, 10),
    );

    c.bench_function("effective_batch_10x4", |b| {
        b.iter(|| compute(&engine, black_box(&scenario)).unwrap())
    });
}

criterion_group!(benches, bench_raw_batch, bench_effective_batch);
criterion_main!(benches);
