//! Mixed-precision defect correction.
//!
//! The outer loop runs in `f64`: it computes the defect of the current
//! solution, normalises it and hands it down as right-hand side of an inner
//! multigrid solve in a lower precision. The inner correction is cast back
//! up, scaled by the defect norm and accumulated.

use crate::error::{Result, check_len};
use crate::hierarchy::MgInfo;
use crate::multigrid::{SolveStatus, solve_multigrid};
use crate::operator::NumericBackend;
use lattix_core::{DeviceVector, Element, SystemMatrix, convert};

/// Configuration of the outer defect correction.
#[derive(Debug, Clone)]
pub struct MixedPrecisionConfig {
    /// Stop when the defect falls below this fraction of the initial one.
    pub outer_tolerance: f64,
    /// Maximum number of outer corrections.
    pub max_outer_iterations: usize,
}

impl Default for MixedPrecisionConfig {
    fn default() -> Self {
        Self {
            outer_tolerance: 1e-8,
            max_outer_iterations: 16,
        }
    }
}

impl MixedPrecisionConfig {
    pub fn with_outer_tolerance(mut self, tolerance: f64) -> Self {
        self.outer_tolerance = tolerance;
        self
    }

    pub fn with_max_outer_iterations(mut self, iterations: usize) -> Self {
        self.max_outer_iterations = iterations;
        self
    }
}

/// Result of a mixed-precision solve.
#[derive(Debug, Clone)]
pub struct MixedPrecisionResult {
    /// Solution vector.
    pub x: Vec<f64>,
    /// Outer corrections performed.
    pub outer_iterations: usize,
    /// V-cycles run by the inner solver in total.
    pub inner_cycles: usize,
    /// Defect norm of the zero start.
    pub initial_defect: f64,
    /// Final defect norm.
    pub defect: f64,
    /// Whether the outer tolerance was reached.
    pub converged: bool,
}

/// Solve `system · x = rhs` in `f64` with inner V-cycles on `inner`, whose
/// finest level must discretise the same system in precision `T`.
///
/// The outer defect correction runs on `outer`, the inner cycles on
/// `inner_backend`, so a single-precision device solve can sit under a
/// double-precision host loop. Pass the same backend twice to run both on
/// one device.
///
/// The inner hierarchy is switched to start from a zero iterate; its
/// remaining configuration (cycle budget, smoother mode) is used as is.
pub fn solve_mixed_precision<BO, BI, T>(
    outer: &BO,
    inner_backend: &BI,
    system: &SystemMatrix<f64>,
    rhs: &DeviceVector<f64>,
    inner: &mut MgInfo<T>,
    config: &MixedPrecisionConfig,
) -> Result<MixedPrecisionResult>
where
    BO: NumericBackend + ?Sized,
    BI: NumericBackend + ?Sized,
    T: Element,
{
    let n = system.rows();
    check_len("mixed-precision right-hand side", n, rhs.len())?;
    check_len(
        "finest level of the inner hierarchy",
        n,
        inner.level_size(inner.max_level()),
    )?;
    inner.update_config(|c| c.initial_zero = true)?;

    let arbiter = rhs.arbiter().clone();
    let mut x = DeviceVector::<f64>::zeros(&arbiter, n);
    let mut defect = DeviceVector::zeros(&arbiter, n);
    outer.defect(&mut defect, rhs, system, &x)?;
    let initial_defect = outer.norm_l2(&defect)?;

    let mut result = MixedPrecisionResult {
        x: Vec::new(),
        outer_iterations: 0,
        inner_cycles: 0,
        initial_defect,
        defect: initial_defect,
        converged: initial_defect == 0.0,
    };

    let mut scale = 1.0;
    while !result.converged && result.outer_iterations < config.max_outer_iterations {
        result.outer_iterations += 1;
        inner.set_rhs(convert::<f64, T>(&defect.to_vec()?))?;
        let inner_result = solve_multigrid(inner_backend, inner)?;
        result.inner_cycles += inner_result.iterations;
        if inner_result.status == SolveStatus::Cancelled {
            log::info!(
                "mixed-precision solve cancelled after {} outer iterations",
                result.outer_iterations
            );
            break;
        }

        let correction =
            DeviceVector::from_vec(&arbiter, convert::<T, f64>(&inner.solution().to_vec()?));
        outer.scaled_sum(&mut x, &correction, scale)?;
        outer.defect(&mut defect, rhs, system, &x)?;
        result.defect = outer.norm_l2(&defect)?;
        log::trace!(
            "outer iteration {}: defect {:.3e}",
            result.outer_iterations,
            result.defect
        );

        if result.defect < config.outer_tolerance * initial_defect {
            result.converged = true;
        } else {
            scale = result.defect;
            outer.scale(&mut defect, 1.0 / scale)?;
        }
    }

    log::info!(
        "mixed-precision ({} on {} / f64 on {}) solve: {} outer iterations, \
         {} inner cycles, defect {:.3e} -> {:.3e}",
        T::KIND.name(),
        inner_backend.name(),
        outer.name(),
        result.outer_iterations,
        result.inner_cycles,
        result.initial_defect,
        result.defect
    );
    result.x = x.to_vec()?;
    Ok(result)
}
