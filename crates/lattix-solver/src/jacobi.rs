//! Damped Jacobi smoothing.
//!
//! One sweep is `x = x + D (rhs - A x)`, where `D` holds the damped inverse
//! diagonal of `A`. The damping is baked into `D` when it is built.

use crate::error::Result;
use crate::operator::NumericBackend;
use lattix_core::{DeviceVector, Element, SystemMatrix};

/// Operands of a Jacobi sweep. `temp` is scratch of the same length.
pub struct JacobiSystem<'a, T: Element> {
    pub a: &'a SystemMatrix<T>,
    pub diag_inverted: &'a DeviceVector<T>,
    pub rhs: &'a DeviceVector<T>,
    pub temp: &'a mut DeviceVector<T>,
}

/// `sweeps` Jacobi sweeps starting from the current contents of `x`.
pub fn jacobi<B, T>(
    backend: &B,
    system: &mut JacobiSystem<'_, T>,
    x: &mut DeviceVector<T>,
    sweeps: usize,
) -> Result<()>
where
    B: NumericBackend + ?Sized,
    T: Element,
{
    for _ in 0..sweeps {
        backend.defect(system.temp, system.rhs, system.a, x)?;
        backend.element_product(system.temp, system.diag_inverted)?;
        backend.sum(x, system.temp)?;
    }
    Ok(())
}

/// `sweeps` Jacobi sweeps starting from `x = 0`; the first sweep reduces to
/// `x = D rhs`. With zero sweeps `x` is cleared.
pub fn jacobi_from_zero<B, T>(
    backend: &B,
    system: &mut JacobiSystem<'_, T>,
    x: &mut DeviceVector<T>,
    sweeps: usize,
) -> Result<()>
where
    B: NumericBackend + ?Sized,
    T: Element,
{
    if sweeps == 0 {
        return backend.fill(x, T::zero());
    }
    backend.copy(x, system.rhs)?;
    backend.element_product(x, system.diag_inverted)?;
    jacobi(backend, system, x, sweeps - 1)
}

/// Damped inverse diagonal `damping / a_ii` (zero where `a_ii` is zero).
pub fn damped_inverse_diagonal<B, T>(
    backend: &B,
    a: &SystemMatrix<T>,
    damping: T,
    arbiter: &std::sync::Arc<lattix_core::MemoryArbiter>,
) -> Result<DeviceVector<T>>
where
    B: NumericBackend + ?Sized,
    T: Element,
{
    let mut diag = DeviceVector::from_vec(arbiter, a.diagonal()?);
    backend.element_inverse(&mut diag)?;
    backend.scale(&mut diag, damping)?;
    Ok(diag)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scalar::ScalarBackend;
    use lattix_core::{MatrixFormat, MemoryArbiter, SparseMatrix};

    fn diagonally_dominant(n: usize) -> SparseMatrix<f64> {
        let mut m = SparseMatrix::new(n, n);
        for i in 0..n {
            m.set(i, i, 4.0 + (i % 3) as f64);
            if i > 0 {
                m.set(i, i - 1, -1.0);
            }
            if i + 1 < n {
                m.set(i, i + 1, -1.5);
            }
        }
        m
    }

    fn defect_norm(
        a: &SystemMatrix<f64>,
        rhs: &DeviceVector<f64>,
        x: &DeviceVector<f64>,
        arbiter: &std::sync::Arc<MemoryArbiter>,
    ) -> f64 {
        let mut d = DeviceVector::zeros(arbiter, x.len());
        ScalarBackend.defect(&mut d, rhs, a, x).unwrap();
        ScalarBackend.norm_l2(&d).unwrap()
    }

    #[test]
    fn sweeps_do_not_increase_the_defect() {
        let arbiter = MemoryArbiter::shared();
        let sparse = diagonally_dominant(25);
        let a = SystemMatrix::from_sparse(&arbiter, &sparse, MatrixFormat::Ell).unwrap();
        let diag = damped_inverse_diagonal(&ScalarBackend, &a, 0.7, &arbiter).unwrap();
        let rhs = DeviceVector::from_vec(&arbiter, (0..25).map(|i| (i as f64).sin()).collect());
        let mut x = DeviceVector::from_vec(&arbiter, vec![0.3; 25]);
        let mut temp = DeviceVector::zeros(&arbiter, 25);

        let mut previous = defect_norm(&a, &rhs, &x, &arbiter);
        for _ in 0..10 {
            let mut system = JacobiSystem {
                a: &a,
                diag_inverted: &diag,
                rhs: &rhs,
                temp: &mut temp,
            };
            jacobi(&ScalarBackend, &mut system, &mut x, 1).unwrap();
            let current = defect_norm(&a, &rhs, &x, &arbiter);
            assert!(current <= previous, "{} > {}", current, previous);
            previous = current;
        }
    }

    #[test]
    fn first_sweep_from_zero_is_scaled_rhs() {
        let arbiter = MemoryArbiter::shared();
        let sparse = diagonally_dominant(6);
        let a = SystemMatrix::from_sparse(&arbiter, &sparse, MatrixFormat::Ell).unwrap();
        let diag = damped_inverse_diagonal(&ScalarBackend, &a, 0.5, &arbiter).unwrap();
        let rhs = DeviceVector::from_vec(&arbiter, vec![2.0; 6]);
        let mut x = DeviceVector::filled(&arbiter, 6, 100.0);
        let mut temp = DeviceVector::zeros(&arbiter, 6);
        let mut system = JacobiSystem {
            a: &a,
            diag_inverted: &diag,
            rhs: &rhs,
            temp: &mut temp,
        };
        jacobi_from_zero(&ScalarBackend, &mut system, &mut x, 1).unwrap();

        let d = sparse.diagonal().unwrap();
        for (xi, di) in x.to_vec().unwrap().iter().zip(d) {
            assert!((xi - 0.5 * 2.0 / di).abs() < 1e-15);
        }
    }

    #[test]
    fn inverse_diagonal_is_damped() {
        let arbiter = MemoryArbiter::shared();
        let a = SystemMatrix::from_sparse(
            &arbiter,
            &SparseMatrix::from_triplets(2, 2, [(0, 0, 4.0f32), (1, 1, 0.5)]).unwrap(),
            MatrixFormat::Ell,
        )
        .unwrap();
        let diag = damped_inverse_diagonal(&ScalarBackend, &a, 0.7, &arbiter).unwrap();
        assert_eq!(diag.to_vec().unwrap(), vec![0.7 / 4.0, 0.7 / 0.5]);
    }
}
