//! The `solve` and `load` commands.

use super::{Precision, SolverArgs, parse_stencil};
use crate::output;
use anyhow::{Context, Result};
use lattix::core::{io, poisson};
use lattix::{
    AnyBackend, DeviceVector, Element, MatrixFormat, MemoryArbiter, MgConfig, MgInfo,
    SystemMatrix, solve_mixed_precision, solve_multigrid,
};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

/// Where a hierarchy comes from.
enum Source<'a> {
    Generated(lattix::Stencil),
    Directory(&'a Path),
}

impl Source<'_> {
    fn hierarchy<T: Element>(
        &self,
        arbiter: &Arc<MemoryArbiter>,
        level: u32,
        config: MgConfig,
    ) -> Result<MgInfo<T>> {
        let info = match self {
            Source::Generated(stencil) => MgInfo::poisson(arbiter, level, config, *stencil)
                .context("failed to build Poisson hierarchy")?,
            Source::Directory(dir) => MgInfo::from_directory(arbiter, dir, config)
                .with_context(|| format!("failed to load hierarchy from {}", dir.display()))?,
        };
        Ok(info)
    }

    /// Finest-level system and right-hand side in double precision.
    fn outer_system(
        &self,
        arbiter: &Arc<MemoryArbiter>,
        level: u32,
    ) -> Result<(SystemMatrix<f64>, DeviceVector<f64>)> {
        let (a, rhs, format) = match self {
            Source::Generated(stencil) => (
                poisson::poisson_matrix::<f64>(level, *stencil)?,
                poisson::poisson_rhs::<f64>(level)?,
                MatrixFormat::BandedQ1,
            ),
            Source::Directory(dir) => (
                io::read_ell::<f64>(io::system_file(dir, level))
                    .context("failed to read finest system matrix")?,
                io::read_exp::<f64>(io::rhs_file(dir)).context("failed to read right-hand side")?,
                MatrixFormat::Ell,
            ),
        };
        let a = SystemMatrix::from_sparse(arbiter, &a, format)?;
        Ok((a, DeviceVector::from_vec(arbiter, rhs)))
    }

    /// Reference solution, if one is known.
    fn reference(&self, level: u32) -> Result<Option<Vec<f64>>> {
        match self {
            Source::Generated(_) => Ok(Some(poisson::poisson_exact(level)?)),
            Source::Directory(dir) => {
                let path = io::solution_file(dir);
                if !path.exists() {
                    return Ok(None);
                }
                let sol = io::read_exp(&path)
                    .with_context(|| format!("failed to read {}", path.display()))?;
                Ok(Some(sol))
            }
        }
    }
}

/// Solve the generated Poisson problem.
pub fn solve(level: u32, stencil: &str, args: &SolverArgs) -> Result<()> {
    let stencil = parse_stencil(stencil)?;
    output::print_header("Multigrid Solve");
    println!("Problem:   Poisson on the unit square, {} stencil", stencil);
    run(&Source::Generated(stencil), level, args)
}

/// Solve a hierarchy stored in `dir`.
pub fn load(dir: &Path, level: u32, args: &SolverArgs) -> Result<()> {
    output::print_header("Multigrid Solve");
    println!("Problem:   {}", dir.display());
    run(&Source::Directory(dir), level, args)
}

fn run(source: &Source<'_>, level: u32, args: &SolverArgs) -> Result<()> {
    let arbiter = MemoryArbiter::shared();
    let precision = args.precision()?;
    let kind = args.compute_backend()?;
    let backend = AnyBackend::create(&kind, &arbiter)
        .with_context(|| format!("failed to initialise {} backend", kind.name()))?;

    let outer = if precision == Precision::Mixed {
        let outer_kind = args.outer_compute_backend()?;
        let outer = AnyBackend::create(&outer_kind, &arbiter).with_context(|| {
            format!("failed to initialise {} outer backend", outer_kind.name())
        })?;
        Some(outer)
    } else {
        None
    };

    println!("Levels:    {}..={}", args.min_level, level);
    println!("Backend:   {}", backend.kind());
    if let Some(outer) = &outer {
        println!("Outer:     {}", outer.kind());
    }
    println!("Precision: {}", precision.name());
    println!("Transfer:  {}", args.transfer());
    println!();

    let start = Instant::now();
    let x = match precision {
        Precision::Double => vcycle::<f64>(&backend, source, level, args, &arbiter)?,
        Precision::Single => vcycle::<f32>(&backend, source, level, args, &arbiter)?,
        Precision::Mixed => {
            let outer = outer.as_ref().unwrap_or(&backend);
            let (a, rhs) = source.outer_system(&arbiter, level)?;
            let mut inner =
                source.hierarchy::<f32>(&arbiter, level, args.inner_config(level))?;
            let result = solve_mixed_precision(
                outer,
                &backend,
                &a,
                &rhs,
                &mut inner,
                &args.mixed_config(),
            )
            .context("mixed-precision solve failed")?;
            output::print_mixed(&result);
            result.x
        }
    };
    let elapsed = start.elapsed();

    println!("Unknowns:  {}", x.len());
    println!("Time:      {:.3} ms", elapsed.as_secs_f64() * 1e3);
    if let Some(reference) = source.reference(level)? {
        output::print_error(&x, &reference)?;
    }
    Ok(())
}

fn vcycle<T: Element>(
    backend: &AnyBackend,
    source: &Source<'_>,
    level: u32,
    args: &SolverArgs,
    arbiter: &Arc<MemoryArbiter>,
) -> Result<Vec<f64>> {
    let mut info = source.hierarchy::<T>(arbiter, level, args.config(level))?;
    log::debug!("{:?}", info);
    let result = solve_multigrid(backend, &mut info).context("multigrid solve failed")?;
    output::print_vcycle(&result);
    let x = info.solution().to_vec()?;
    Ok(lattix::core::convert(&x))
}
