//! Benchmarks comparing host backends on the V-cycle kernels.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use lattix_backend_cpu::{MultiCoreBackend, MultiCoreConfig, SimdBackend};
use lattix_core::poisson::{poisson_matrix, poisson_rhs};
use lattix_core::{DeviceVector, MatrixFormat, MemoryArbiter, Stencil, SystemMatrix};
use lattix_solver::{MgConfig, MgInfo, NumericBackend, ScalarBackend, solve_multigrid};

fn bench_defect<B: NumericBackend>(c: &mut Criterion, backend: &B) {
    let mut group = c.benchmark_group(format!("defect/{}", backend.name()));
    let arbiter = MemoryArbiter::shared();

    for level in [7u32, 9] {
        let a = poisson_matrix::<f64>(level, Stencil::Q1).unwrap();
        let a = SystemMatrix::from_sparse(&arbiter, &a, MatrixFormat::BandedQ1).unwrap();
        let rhs = DeviceVector::from_vec(&arbiter, poisson_rhs(level).unwrap());
        let x = DeviceVector::filled(&arbiter, rhs.len(), 1.0);
        let mut d = DeviceVector::zeros(&arbiter, rhs.len());
        group.bench_with_input(BenchmarkId::from_parameter(level), &level, |bencher, _| {
            bencher.iter(|| backend.defect(black_box(&mut d), &rhs, &a, &x).unwrap())
        });
    }

    group.finish();
}

fn bench_vcycle<B: NumericBackend>(c: &mut Criterion, backend: &B) {
    let mut group = c.benchmark_group(format!("multigrid/{}", backend.name()));
    group.sample_size(10);
    let arbiter = MemoryArbiter::shared();

    for level in [7u32, 8] {
        let mut info =
            MgInfo::<f64>::poisson(&arbiter, level, MgConfig::default(), Stencil::Q1).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(level), &level, |bencher, _| {
            bencher.iter(|| solve_multigrid(backend, black_box(&mut info)).unwrap())
        });
    }

    group.finish();
}

fn bench_backends(c: &mut Criterion) {
    let multicore = MultiCoreBackend::new(MultiCoreConfig::default()).unwrap();
    bench_defect(c, &ScalarBackend);
    bench_defect(c, &SimdBackend::new());
    bench_defect(c, &multicore);
    bench_vcycle(c, &ScalarBackend);
    bench_vcycle(c, &multicore);
}

criterion_group!(benches, bench_backends);
criterion_main!(benches);
