//! Benchmark comparing SIMD and scalar vector kernels.

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use lattix_simd::{
    SimdCapability, dot_f32, dot_f32_scalar, dot_f64, dot_f64_scalar, scaled_sum_f64,
    scaled_sum_f64_scalar,
};
use std::hint::black_box;

fn bench_dot_f64(c: &mut Criterion) {
    let mut group = c.benchmark_group("dot_f64");
    let cap = SimdCapability::detect();

    // Q1 level sizes 4..=8
    for size in [289, 1089, 4225, 16641, 66049] {
        let a: Vec<f64> = (0..size).map(|i| i as f64 * 0.1).collect();
        let b: Vec<f64> = (0..size).map(|i| (size - i) as f64 * 0.2).collect();

        group.bench_with_input(BenchmarkId::new("scalar", size), &size, |bencher, _| {
            bencher.iter(|| dot_f64_scalar(black_box(&a), black_box(&b)));
        });

        group.bench_with_input(
            BenchmarkId::new(cap.name(), size),
            &size,
            |bencher, _| {
                bencher.iter(|| dot_f64(black_box(&a), black_box(&b), cap));
            },
        );
    }
    group.finish();
}

fn bench_dot_f32(c: &mut Criterion) {
    let mut group = c.benchmark_group("dot_f32");
    let cap = SimdCapability::detect();

    for size in [289, 4225, 66049] {
        let a: Vec<f32> = (0..size).map(|i| i as f32 * 0.1).collect();
        let b: Vec<f32> = (0..size).map(|i| (size - i) as f32 * 0.2).collect();

        group.bench_with_input(BenchmarkId::new("scalar", size), &size, |bencher, _| {
            bencher.iter(|| dot_f32_scalar(black_box(&a), black_box(&b)));
        });

        group.bench_with_input(
            BenchmarkId::new(cap.name(), size),
            &size,
            |bencher, _| {
                bencher.iter(|| dot_f32(black_box(&a), black_box(&b), cap));
            },
        );
    }
    group.finish();
}

fn bench_scaled_sum(c: &mut Criterion) {
    let mut group = c.benchmark_group("scaled_sum_f64");
    let cap = SimdCapability::detect();

    for size in [289, 4225, 66049] {
        let x: Vec<f64> = (0..size).map(|i| (i as f64).sin()).collect();
        let mut y = vec![0.0; size];

        group.bench_with_input(BenchmarkId::new("scalar", size), &size, |bencher, _| {
            bencher.iter(|| scaled_sum_f64_scalar(&mut y, black_box(&x), 0.5));
        });

        group.bench_with_input(
            BenchmarkId::new(cap.name(), size),
            &size,
            |bencher, _| {
                bencher.iter(|| scaled_sum_f64(&mut y, black_box(&x), 0.5, cap));
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_dot_f64, bench_dot_f32, bench_scaled_sum);
criterion_main!(benches);
