//! Benchmarks for matrix assembly and products.

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use lattix_core::poisson::{poisson_matrix, prolongation_matrix};
use lattix_core::{MatrixFormat, MemoryArbiter, MemoryTag, Stencil, SystemMatrix};
use std::hint::black_box;

fn bench_assembly(c: &mut Criterion) {
    let mut group = c.benchmark_group("poisson_assembly");
    for level in [4u32, 6, 8] {
        group.bench_with_input(BenchmarkId::new("q1", level), &level, |b, &level| {
            b.iter(|| poisson_matrix::<f64>(black_box(level), Stencil::Q1).unwrap());
        });
        group.bench_with_input(BenchmarkId::new("prolongation", level), &level, |b, &level| {
            b.iter(|| prolongation_matrix::<f64>(black_box(level)).unwrap());
        });
    }
    group.finish();
}

fn bench_product(c: &mut Criterion) {
    let mut group = c.benchmark_group("matrix_product");
    let arbiter = MemoryArbiter::shared();

    for level in [5u32, 7, 9] {
        let sparse = poisson_matrix::<f64>(level, Stencil::Q1).unwrap();
        let n = sparse.rows();
        let x: Vec<f64> = (0..n).map(|i| (i as f64 * 0.01).sin()).collect();
        let mut y = vec![0.0; n];

        for format in [MatrixFormat::BandedQ1, MatrixFormat::Ell] {
            let m = SystemMatrix::from_sparse(&arbiter, &sparse, format).unwrap();
            group.bench_with_input(
                BenchmarkId::new(format!("{:?}", format), n),
                &n,
                |b, _| {
                    b.iter(|| {
                        let lock = m.lock(MemoryTag::Cpu).unwrap();
                        lock.view().unwrap().product(black_box(&x), &mut y).unwrap();
                    });
                },
            );
        }
    }
    group.finish();
}

criterion_group!(benches, bench_assembly, bench_product);
criterion_main!(benches);
