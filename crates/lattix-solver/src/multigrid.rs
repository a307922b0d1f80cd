//! The multigrid V-cycle.
//!
//! One cycle descends from `max_level` to `min_level`, pre-smoothing and
//! restricting the defect on the way down, solves the coarsest level with
//! CG, and ascends again, adding the prolongated correction and
//! post-smoothing on every level. The iterate lives in `x[max_level]`.

use crate::cg::{CgConfig, CgWorkspace, solve_cg_in};
use crate::error::{Error, Result};
use crate::hierarchy::MgInfo;
use crate::jacobi::{JacobiSystem, jacobi, jacobi_from_zero};
use crate::operator::NumericBackend;
use crate::transfer::{self, TransferKind};
use lattix_core::{Element, SystemMatrix};
use std::fmt;

/// Why a multigrid solve stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveStatus {
    /// The defect met the tolerance.
    Converged,
    /// The cycle budget ran out first.
    MaxIterations,
    /// Smoother mode: the fixed number of cycles ran.
    Smoother,
    /// The cancellation token fired.
    Cancelled,
}

impl fmt::Display for SolveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SolveStatus::Converged => "converged",
            SolveStatus::MaxIterations => "iteration budget exhausted",
            SolveStatus::Smoother => "smoother cycles done",
            SolveStatus::Cancelled => "cancelled",
        })
    }
}

/// Result of a multigrid solve. The solution stays in the hierarchy.
#[derive(Debug, Clone, PartialEq)]
pub struct MultigridResult {
    /// Number of V-cycles performed.
    pub iterations: usize,
    /// Defect norm before the first cycle.
    pub initial_defect: f64,
    /// Defect norm after the last cycle.
    pub defect: f64,
    /// Average convergence rate `(defect / initial_defect)^(1 / iterations)`;
    /// undefined in smoother mode and before the first cycle.
    pub kappa: Option<f64>,
    pub status: SolveStatus,
}

impl MultigridResult {
    pub fn converged(&self) -> bool {
        self.status == SolveStatus::Converged
    }
}

/// Solve the finest-level system of `info` with V-cycles on `backend`.
///
/// Non-convergence is reported through [`MultigridResult::status`], not as
/// an error.
pub fn solve_multigrid<B, T>(backend: &B, info: &mut MgInfo<T>) -> Result<MultigridResult>
where
    B: NumericBackend + ?Sized,
    T: Element,
{
    let config = info.config.clone();
    let (min, max) = (config.min_level as usize, config.max_level as usize);

    if config.initial_zero {
        backend.fill(&mut info.x[max], T::zero())?;
        backend.copy(&mut info.d[max], &info.rhs[max])?;
    } else {
        backend.defect(&mut info.d[max], &info.rhs[max], &info.a[max], &info.x[max])?;
    }

    let initial_defect = backend.norm_l2(&info.d[max])?.val_to_f64();
    let mut result = MultigridResult {
        iterations: 0,
        initial_defect,
        defect: initial_defect,
        kappa: None,
        status: if config.is_smoother {
            SolveStatus::Smoother
        } else {
            SolveStatus::MaxIterations
        },
    };

    if !config.is_smoother && config.convergence_check && initial_defect <= config.tolerance {
        result.status = SolveStatus::Converged;
        log::debug!(
            "initial defect {:.3e} already meets tolerance {:.3e}",
            initial_defect,
            config.tolerance
        );
        return Ok(result);
    }

    for iter in 1..=config.n_max_iter {
        if config.cancel.as_ref().is_some_and(|t| t.is_cancelled()) {
            result.status = SolveStatus::Cancelled;
            break;
        }
        result.iterations = iter;

        if min == max {
            single_level_solve(backend, info, max)?;
        } else {
            for level in (min + 1..=max).rev() {
                descend(backend, info, level, level == max)?;
            }
            coarse_solve(backend, info, min)?;
            for level in min + 1..=max {
                ascend(backend, info, level)?;
            }
        }

        result.defect = backend.norm_l2(&info.d[max])?.val_to_f64();
        if config.is_smoother {
            log::trace!("smoother cycle {}: defect {:.3e}", iter, result.defect);
        } else {
            let kappa = if initial_defect > 0.0 {
                (result.defect / initial_defect).powf(1.0 / iter as f64)
            } else {
                0.0
            };
            result.kappa = Some(kappa);
            log::trace!(
                "V-cycle {}: defect {:.3e}, kappa {:.3}",
                iter,
                result.defect,
                kappa
            );
            if result.defect <= config.tolerance {
                result.status = SolveStatus::Converged;
                break;
            }
        }
        if min == max {
            break;
        }
    }

    if !config.is_smoother
        && result.status == SolveStatus::MaxIterations
        && result.defect <= config.tolerance
    {
        result.status = SolveStatus::Converged;
    }
    log::debug!(
        "multigrid on {} ({} levels): {} after {} cycles, defect {:.3e} -> {:.3e}",
        backend.name(),
        max - min + 1,
        result.status,
        result.iterations,
        result.initial_defect,
        result.defect
    );
    Ok(result)
}

/// Pre-smooth on `level`, recompute its defect, restrict it onto
/// `level - 1` and keep a copy there as right-hand side.
fn descend<B, T>(backend: &B, info: &mut MgInfo<T>, level: usize, finest: bool) -> Result<()>
where
    B: NumericBackend + ?Sized,
    T: Element,
{
    let sweeps = info.config.n_pre_smooth;
    let mut system = JacobiSystem {
        a: &info.a[level],
        diag_inverted: &info.diags_inverted[level],
        rhs: &info.rhs[level],
        temp: &mut info.temp[level],
    };
    if finest {
        jacobi(backend, &mut system, &mut info.x[level], sweeps)?;
    } else {
        jacobi_from_zero(backend, &mut system, &mut info.x[level], sweeps)?;
    }
    backend.defect(
        &mut info.d[level],
        &info.rhs[level],
        &info.a[level],
        &info.x[level],
    )?;

    let (lower, upper) = info.d.split_at_mut(level);
    let (coarse, fine) = (&mut lower[level - 1], &mut upper[0]);
    match info.config.transfer {
        TransferKind::Stencil => backend.restrict(coarse, fine, &info.macro_border_mask)?,
        TransferKind::Matrix => {
            let resmat = transfer_matrix(&info.resmats, level)?;
            transfer::restrict_matrix(backend, coarse, fine, resmat)?
        }
    }
    backend.copy(&mut info.rhs[level - 1], &info.d[level - 1])
}

/// CG from zero on the coarsest level of a multi-level hierarchy.
fn coarse_solve<B, T>(backend: &B, info: &mut MgInfo<T>, level: usize) -> Result<()>
where
    B: NumericBackend + ?Sized,
    T: Element,
{
    backend.fill(&mut info.x[level], T::zero())?;
    let config = CgConfig::default()
        .with_max_iterations(info.config.n_max_iter_coarse)
        .with_tolerance(info.config.tolerance_coarse);
    let work = CgWorkspace {
        r: &mut info.d[level],
        p: &mut info.c[level],
        q: &mut info.temp[level],
    };
    solve_cg_in(
        backend,
        &info.a[level],
        &mut info.x[level],
        &info.rhs[level],
        work,
        &config,
    )?;
    Ok(())
}

/// A hierarchy with one level: CG from the current iterate to the overall
/// tolerance, then the defect.
fn single_level_solve<B, T>(backend: &B, info: &mut MgInfo<T>, level: usize) -> Result<()>
where
    B: NumericBackend + ?Sized,
    T: Element,
{
    let n = info.x[level].len();
    let config = CgConfig::default()
        .with_max_iterations(info.config.n_max_iter_coarse.max(n))
        .with_tolerance(0.0)
        .with_absolute_tolerance(info.config.tolerance);
    let work = CgWorkspace {
        r: &mut info.d[level],
        p: &mut info.c[level],
        q: &mut info.temp[level],
    };
    solve_cg_in(
        backend,
        &info.a[level],
        &mut info.x[level],
        &info.rhs[level],
        work,
        &config,
    )?;
    backend.defect(
        &mut info.d[level],
        &info.rhs[level],
        &info.a[level],
        &info.x[level],
    )
}

/// Prolongate the coarse solution onto `level`, add it with the adaptive or
/// fixed step length, post-smooth and recompute the defect.
fn ascend<B, T>(backend: &B, info: &mut MgInfo<T>, level: usize) -> Result<()>
where
    B: NumericBackend + ?Sized,
    T: Element,
{
    match info.config.transfer {
        TransferKind::Stencil => backend.prolongate(
            &mut info.c[level],
            &info.x[level - 1],
            &info.macro_border_mask,
        )?,
        TransferKind::Matrix => {
            let prolmat = transfer_matrix(&info.prolmats, level)?;
            let coarse = &info.x[level - 1];
            transfer::prolongate_matrix(backend, &mut info.c[level], coarse, prolmat)?
        }
    }

    let alpha = if info.config.adapt_correction_factor == 0.0 {
        let dc = backend.dot(&info.d[level], &info.c[level])?;
        backend.product(&info.a[level], &info.c[level], &mut info.temp[level])?;
        let acc = backend.dot(&info.temp[level], &info.c[level])?;
        if acc > T::zero() { dc / acc } else { T::one() }
    } else {
        T::val_from_f64(info.config.adapt_correction_factor)
    };
    backend.scaled_sum(&mut info.x[level], &info.c[level], alpha)?;

    let mut system = JacobiSystem {
        a: &info.a[level],
        diag_inverted: &info.diags_inverted[level],
        rhs: &info.rhs[level],
        temp: &mut info.temp[level],
    };
    jacobi(
        backend,
        &mut system,
        &mut info.x[level],
        info.config.n_post_smooth,
    )?;
    backend.defect(
        &mut info.d[level],
        &info.rhs[level],
        &info.a[level],
        &info.x[level],
    )
}

fn transfer_matrix<T: Element>(
    matrices: &[Option<SystemMatrix<T>>],
    level: usize,
) -> Result<&SystemMatrix<T>> {
    matrices[level]
        .as_ref()
        .ok_or_else(|| Error::InvalidConfig(format!("no transfer matrix for level {}", level)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::CancellationToken;
    use crate::hierarchy::MgConfig;
    use crate::scalar::ScalarBackend;
    use lattix_core::{MemoryArbiter, Stencil};

    #[test]
    fn poisson_converges_with_few_cycles() {
        let arbiter = MemoryArbiter::shared();
        let config = MgConfig::default().with_levels(1, 5).with_tolerance(1e-6);
        let mut info = MgInfo::<f64>::poisson(&arbiter, 5, config, Stencil::FivePoint).unwrap();
        let result = solve_multigrid(&ScalarBackend, &mut info).unwrap();

        assert!(result.converged(), "{:?}", result);
        assert!(result.iterations < 30);
        let kappa = result.kappa.unwrap();
        assert!(kappa > 0.0 && kappa < 0.7, "kappa {}", kappa);
    }

    #[test]
    fn zero_rhs_needs_no_cycles() {
        let arbiter = MemoryArbiter::shared();
        let mut info =
            MgInfo::<f64>::poisson(&arbiter, 3, MgConfig::default(), Stencil::Q1).unwrap();
        info.set_rhs(vec![0.0; 81]).unwrap();
        let result = solve_multigrid(&ScalarBackend, &mut info).unwrap();
        assert_eq!(result.iterations, 0);
        assert_eq!(result.status, SolveStatus::Converged);
        assert_eq!(result.kappa, None);
    }

    #[test]
    fn smoother_mode_runs_a_fixed_number_of_cycles() {
        let arbiter = MemoryArbiter::shared();
        let config = MgConfig::default()
            .with_smoother(true)
            .with_max_iterations(3)
            .with_tolerance(1e30);
        let mut info = MgInfo::<f32>::poisson(&arbiter, 4, config, Stencil::Q1).unwrap();
        let result = solve_multigrid(&ScalarBackend, &mut info).unwrap();
        assert_eq!(result.iterations, 3);
        assert_eq!(result.status, SolveStatus::Smoother);
        assert_eq!(result.kappa, None);
        assert!(result.defect < result.initial_defect);
    }

    #[test]
    fn single_level_hierarchy_solves_directly() {
        let arbiter = MemoryArbiter::shared();
        let config = MgConfig::default().with_levels(3, 3).with_tolerance(1e-9);
        let mut info = MgInfo::<f64>::poisson(&arbiter, 3, config, Stencil::Q1).unwrap();
        let result = solve_multigrid(&ScalarBackend, &mut info).unwrap();
        assert_eq!(result.iterations, 1);
        assert!(result.converged(), "{:?}", result);
    }

    #[test]
    fn cancelled_token_stops_before_the_first_cycle() {
        let arbiter = MemoryArbiter::shared();
        let token = CancellationToken::new();
        token.cancel();
        let config = MgConfig::default().with_cancellation(token);
        let mut info = MgInfo::<f64>::poisson(&arbiter, 3, config, Stencil::Q1).unwrap();
        let result = solve_multigrid(&ScalarBackend, &mut info).unwrap();
        assert_eq!(result.status, SolveStatus::Cancelled);
        assert_eq!(result.iterations, 0);
    }

    #[test]
    fn fixed_step_length_also_converges() {
        let arbiter = MemoryArbiter::shared();
        let config = MgConfig::default()
            .with_levels(1, 4)
            .with_adapt_correction_factor(1.0)
            .with_smoothing(4, 4)
            .with_tolerance(1e-6);
        let mut info = MgInfo::<f64>::poisson(&arbiter, 4, config, Stencil::FivePoint).unwrap();
        let result = solve_multigrid(&ScalarBackend, &mut info).unwrap();
        assert!(result.converged(), "{:?}", result);
    }
}
