//! Benchmarks for the multigrid solver.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use lattix_core::poisson::{poisson_matrix, poisson_rhs};
use lattix_core::{DeviceVector, MatrixFormat, MemoryArbiter, Stencil, SystemMatrix};
use lattix_solver::{
    CgConfig, MgConfig, MgInfo, ScalarBackend, TransferKind, solve_cg, solve_multigrid,
};

fn bench_vcycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("multigrid");
    group.sample_size(20);
    let arbiter = MemoryArbiter::shared();

    for level in [5u32, 6, 7] {
        for transfer in [TransferKind::Stencil, TransferKind::Matrix] {
            let config = MgConfig::default().with_transfer(transfer);
            let mut info = MgInfo::<f64>::poisson(&arbiter, level, config, Stencil::Q1).unwrap();
            group.bench_with_input(
                BenchmarkId::new(transfer.name(), level),
                &level,
                |bencher, _| {
                    bencher.iter(|| solve_multigrid(&ScalarBackend, black_box(&mut info)).unwrap())
                },
            );
        }
    }

    group.finish();
}

fn bench_cg(c: &mut Criterion) {
    let mut group = c.benchmark_group("cg");
    group.sample_size(20);
    let arbiter = MemoryArbiter::shared();
    let config = CgConfig::default().with_tolerance(1e-8);

    for level in [5u32, 6] {
        let a = poisson_matrix::<f64>(level, Stencil::Q1).unwrap();
        let a = SystemMatrix::from_sparse(&arbiter, &a, MatrixFormat::BandedQ1).unwrap();
        let b = DeviceVector::from_vec(&arbiter, poisson_rhs(level).unwrap());
        group.bench_with_input(BenchmarkId::from_parameter(level), &level, |bencher, _| {
            bencher.iter(|| {
                let mut x = DeviceVector::zeros(&arbiter, b.len());
                solve_cg(&ScalarBackend, black_box(&a), &mut x, &b, &config).unwrap()
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_vcycle, bench_cg);
criterion_main!(benches);
