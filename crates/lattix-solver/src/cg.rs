//! Unpreconditioned conjugate gradients for symmetric positive definite
//! systems.

use crate::error::{Result, check_len};
use crate::operator::NumericBackend;
use lattix_core::{DeviceVector, Element, SystemMatrix};

/// CG configuration.
#[derive(Debug, Clone)]
pub struct CgConfig {
    /// Maximum number of iterations.
    pub max_iterations: usize,
    /// Convergence tolerance relative to the initial residual norm.
    pub tolerance: f64,
    /// Absolute residual norm that also counts as converged.
    pub absolute_tolerance: f64,
}

impl Default for CgConfig {
    fn default() -> Self {
        Self {
            max_iterations: 1000,
            tolerance: 1e-8,
            absolute_tolerance: 0.0,
        }
    }
}

impl CgConfig {
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_absolute_tolerance(mut self, tolerance: f64) -> Self {
        self.absolute_tolerance = tolerance;
        self
    }
}

/// Result of a CG solve. The solution is left in the caller's vector.
#[derive(Debug, Clone, PartialEq)]
pub struct CgResult {
    /// Number of iterations performed.
    pub iterations: usize,
    /// Residual norm of the starting iterate.
    pub initial_residual: f64,
    /// Final residual norm.
    pub residual: f64,
    /// Whether the tolerance was reached.
    pub converged: bool,
}

/// Scratch vectors for CG, each as long as the system.
pub struct CgWorkspace<'a, T: Element> {
    /// Residual; holds `b - A x` on return.
    pub r: &'a mut DeviceVector<T>,
    pub p: &'a mut DeviceVector<T>,
    pub q: &'a mut DeviceVector<T>,
}

/// Solve `A x = b` starting from the current `x`, allocating scratch.
pub fn solve_cg<B, T>(
    backend: &B,
    a: &SystemMatrix<T>,
    x: &mut DeviceVector<T>,
    b: &DeviceVector<T>,
    config: &CgConfig,
) -> Result<CgResult>
where
    B: NumericBackend + ?Sized,
    T: Element,
{
    let arbiter = x.arbiter().clone();
    let n = x.len();
    let mut r = DeviceVector::zeros(&arbiter, n);
    let mut p = DeviceVector::zeros(&arbiter, n);
    let mut q = DeviceVector::zeros(&arbiter, n);
    let work = CgWorkspace {
        r: &mut r,
        p: &mut p,
        q: &mut q,
    };
    solve_cg_in(backend, a, x, b, work, config)
}

/// Solve `A x = b` starting from the current `x` with caller-provided
/// scratch.
pub fn solve_cg_in<B, T>(
    backend: &B,
    a: &SystemMatrix<T>,
    x: &mut DeviceVector<T>,
    b: &DeviceVector<T>,
    work: CgWorkspace<'_, T>,
    config: &CgConfig,
) -> Result<CgResult>
where
    B: NumericBackend + ?Sized,
    T: Element,
{
    let n = a.rows();
    for (context, len) in [
        ("CG right-hand side", b.len()),
        ("CG residual scratch", work.r.len()),
        ("CG direction scratch", work.p.len()),
        ("CG product scratch", work.q.len()),
    ] {
        check_len(context, n, len)?;
    }
    let CgWorkspace { r, p, q } = work;

    backend.defect(r, b, a, x)?;
    let mut rr = backend.dot(r, r)?;
    let initial_residual = rr.val_to_f64().sqrt();
    let target = (config.tolerance * initial_residual).max(config.absolute_tolerance);

    let mut result = CgResult {
        iterations: 0,
        initial_residual,
        residual: initial_residual,
        converged: initial_residual <= target,
    };
    if result.converged {
        return Ok(result);
    }

    backend.copy(p, r)?;
    while result.iterations < config.max_iterations {
        result.iterations += 1;
        backend.product(a, p, q)?;
        let pq = backend.dot(p, q)?;
        if pq <= T::zero() {
            log::warn!(
                "CG breakdown after {} iterations: direction has curvature {}",
                result.iterations,
                pq
            );
            break;
        }
        let alpha = rr / pq;
        backend.scaled_sum(x, p, alpha)?;
        backend.scaled_sum(r, q, -alpha)?;

        let rr_new = backend.dot(r, r)?;
        result.residual = rr_new.val_to_f64().sqrt();
        if result.residual <= target {
            result.converged = true;
            break;
        }
        backend.scale(p, rr_new / rr)?;
        backend.sum(p, r)?;
        rr = rr_new;
    }

    if !result.converged {
        log::warn!(
            "CG stopped after {} iterations at residual {:.3e} (target {:.3e})",
            result.iterations,
            result.residual,
            target
        );
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scalar::ScalarBackend;
    use lattix_core::poisson::{poisson_matrix, poisson_rhs};
    use lattix_core::{MatrixFormat, MemoryArbiter, Stencil};

    #[test]
    fn solves_poisson_system() {
        let arbiter = MemoryArbiter::shared();
        let sparse = poisson_matrix::<f64>(3, Stencil::FivePoint).unwrap();
        let a = SystemMatrix::from_sparse(&arbiter, &sparse, MatrixFormat::BandedQ1).unwrap();
        let b = DeviceVector::from_vec(&arbiter, poisson_rhs(3).unwrap());
        let mut x = DeviceVector::zeros(&arbiter, 81);

        let result = solve_cg(&ScalarBackend, &a, &mut x, &b, &CgConfig::default()).unwrap();
        assert!(result.converged);
        assert!(result.iterations <= 81);

        let ax = sparse.multiply(&x.to_vec().unwrap()).unwrap();
        let b = b.to_vec().unwrap();
        for (l, r) in ax.iter().zip(&b) {
            assert!((l - r).abs() < 1e-6 * result.initial_residual);
        }
    }

    #[test]
    fn budget_exhaustion_is_not_an_error() {
        let arbiter = MemoryArbiter::shared();
        let sparse = poisson_matrix::<f64>(4, Stencil::Q1).unwrap();
        let a = SystemMatrix::from_sparse(&arbiter, &sparse, MatrixFormat::Ell).unwrap();
        // Not an eigenvector, so CG needs more than one step.
        let rough: Vec<f64> = (0..289)
            .map(|i| {
                if lattix_core::boundary::is_boundary(i, 17) {
                    0.0
                } else {
                    ((i * 7) % 13) as f64
                }
            })
            .collect();
        let b = DeviceVector::from_vec(&arbiter, rough);
        let mut x = DeviceVector::zeros(&arbiter, b.len());

        let config = CgConfig::default().with_max_iterations(2);
        let result = solve_cg(&ScalarBackend, &a, &mut x, &b, &config).unwrap();
        assert!(!result.converged);
        assert_eq!(result.iterations, 2);
        assert!(result.residual.is_finite());
    }

    #[test]
    fn zero_rhs_converges_immediately() {
        let arbiter = MemoryArbiter::shared();
        let sparse = poisson_matrix::<f32>(2, Stencil::Q1).unwrap();
        let a = SystemMatrix::from_sparse(&arbiter, &sparse, MatrixFormat::Ell).unwrap();
        let b = DeviceVector::zeros(&arbiter, 25);
        let mut x = DeviceVector::zeros(&arbiter, 25);
        let result = solve_cg(&ScalarBackend, &a, &mut x, &b, &CgConfig::default()).unwrap();
        assert!(result.converged);
        assert_eq!(result.iterations, 0);
    }

    #[test]
    fn scratch_must_match_system() {
        let arbiter = MemoryArbiter::shared();
        let a = SystemMatrix::from_sparse(
            &arbiter,
            &lattix_core::SparseMatrix::<f64>::identity(4),
            MatrixFormat::Ell,
        )
        .unwrap();
        let b = DeviceVector::zeros(&arbiter, 4);
        let mut x = DeviceVector::zeros(&arbiter, 4);
        let (mut r, mut p, mut q) = (
            DeviceVector::zeros(&arbiter, 4),
            DeviceVector::zeros(&arbiter, 3),
            DeviceVector::zeros(&arbiter, 4),
        );
        let work = CgWorkspace {
            r: &mut r,
            p: &mut p,
            q: &mut q,
        };
        let err = solve_cg_in(&ScalarBackend, &a, &mut x, &b, work, &CgConfig::default());
        assert!(err.unwrap_err().is_size_mismatch());
    }
}
