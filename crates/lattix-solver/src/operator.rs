//! The numeric backend interface.
//!
//! A [`NumericBackend`] supplies slice kernels and the device its operands
//! are locked on. The vector-level operations lock every operand through
//! the memory arbiter on [`NumericBackend::memory`], check lengths and hand
//! the locked slices to the kernels. Backends override the kernels (or, for
//! device-resident work, the vector-level operations themselves); the
//! defaults are the scalar reference kernels in [`crate::kernels`].

use crate::error::{Result, check_len};
use crate::kernels;
use crate::transfer;
use lattix_core::{BorderMask, DeviceVector, Element, MatrixView, SystemMatrix};
use lattix_memory::MemoryTag;

/// Elementary vector and matrix kernels of one compute backend.
pub trait NumericBackend: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Device whose memory the kernels operate on.
    fn memory(&self) -> MemoryTag {
        MemoryTag::Cpu
    }

    fn sum_slices<T: Element>(&self, y: &mut [T], x: &[T]) {
        kernels::sum(y, x)
    }

    fn difference_slices<T: Element>(&self, y: &mut [T], a: &[T], b: &[T]) {
        kernels::difference(y, a, b)
    }

    fn scaled_sum_slices<T: Element>(&self, y: &mut [T], x: &[T], alpha: T) {
        kernels::scaled_sum(y, x, alpha)
    }

    fn scale_slices<T: Element>(&self, y: &mut [T], alpha: T) {
        kernels::scale(y, alpha)
    }

    fn element_product_slices<T: Element>(&self, y: &mut [T], x: &[T]) {
        kernels::element_product(y, x)
    }

    fn element_inverse_slices<T: Element>(&self, y: &mut [T]) {
        kernels::element_inverse(y)
    }

    fn dot_slices<T: Element>(&self, a: &[T], b: &[T]) -> T {
        kernels::dot(a, b)
    }

    fn fill_slices<T: Element>(&self, y: &mut [T], value: T) {
        kernels::fill(y, value)
    }

    fn copy_slices<T: Element>(&self, y: &mut [T], x: &[T]) {
        kernels::copy(y, x)
    }

    fn product_slices<T: Element>(&self, a: &MatrixView<'_, T>, x: &[T], y: &mut [T]) {
        kernels::product(a, x, y)
    }

    fn defect_slices<T: Element>(&self, d: &mut [T], rhs: &[T], a: &MatrixView<'_, T>, x: &[T]) {
        kernels::defect_rows(d, 0, rhs, a, x)
    }

    /// Weighted-average restriction of a `wf × wf` grid onto `wc × wc`.
    fn restrict_slices<T: Element>(&self, coarse: &mut [T], fine: &[T], wf: usize, wc: usize) {
        transfer::restrict_nodes(coarse, 0, fine, wf, wc)
    }

    /// Bilinear prolongation of a `wc × wc` grid onto `wf × wf`.
    fn prolongate_slices<T: Element>(&self, fine: &mut [T], coarse: &[T], wf: usize, wc: usize) {
        transfer::prolongate_nodes(fine, 0, coarse, wf, wc)
    }

    /// `y += x`.
    fn sum<T: Element>(&self, y: &mut DeviceVector<T>, x: &DeviceVector<T>) -> Result<()> {
        check_len("sum", y.len(), x.len())?;
        let tag = self.memory();
        let x = x.read(tag)?;
        let mut y = y.write(tag)?;
        self.sum_slices(y.as_mut_slice()?, x.as_slice()?);
        Ok(())
    }

    /// `y = a - b`.
    fn difference<T: Element>(
        &self,
        y: &mut DeviceVector<T>,
        a: &DeviceVector<T>,
        b: &DeviceVector<T>,
    ) -> Result<()> {
        check_len("difference", a.len(), b.len())?;
        check_len("difference result", a.len(), y.len())?;
        let tag = self.memory();
        let a = a.read(tag)?;
        let b = b.read(tag)?;
        let mut y = y.write_only(tag)?;
        self.difference_slices(y.as_mut_slice()?, a.as_slice()?, b.as_slice()?);
        Ok(())
    }

    /// `y += alpha * x`.
    fn scaled_sum<T: Element>(
        &self,
        y: &mut DeviceVector<T>,
        x: &DeviceVector<T>,
        alpha: T,
    ) -> Result<()> {
        check_len("scaled sum", y.len(), x.len())?;
        let tag = self.memory();
        let x = x.read(tag)?;
        let mut y = y.write(tag)?;
        self.scaled_sum_slices(y.as_mut_slice()?, x.as_slice()?, alpha);
        Ok(())
    }

    /// `y *= alpha`.
    fn scale<T: Element>(&self, y: &mut DeviceVector<T>, alpha: T) -> Result<()> {
        let mut y = y.write(self.memory())?;
        self.scale_slices(y.as_mut_slice()?, alpha);
        Ok(())
    }

    /// `y[i] *= x[i]`.
    fn element_product<T: Element>(
        &self,
        y: &mut DeviceVector<T>,
        x: &DeviceVector<T>,
    ) -> Result<()> {
        check_len("element product", y.len(), x.len())?;
        let tag = self.memory();
        let x = x.read(tag)?;
        let mut y = y.write(tag)?;
        self.element_product_slices(y.as_mut_slice()?, x.as_slice()?);
        Ok(())
    }

    /// `y[i] = 1 / y[i]`, leaving zeros in place.
    fn element_inverse<T: Element>(&self, y: &mut DeviceVector<T>) -> Result<()> {
        let mut y = y.write(self.memory())?;
        self.element_inverse_slices(y.as_mut_slice()?);
        Ok(())
    }

    fn dot<T: Element>(&self, a: &DeviceVector<T>, b: &DeviceVector<T>) -> Result<T> {
        check_len("dot product", a.len(), b.len())?;
        let tag = self.memory();
        let a = a.read(tag)?;
        let b = b.read(tag)?;
        Ok(self.dot_slices(a.as_slice()?, b.as_slice()?))
    }

    /// Euclidean norm.
    fn norm_l2<T: Element>(&self, x: &DeviceVector<T>) -> Result<T> {
        let x = x.read(self.memory())?;
        let x = x.as_slice()?;
        Ok(self.dot_slices(x, x).sqrt())
    }

    fn fill<T: Element>(&self, y: &mut DeviceVector<T>, value: T) -> Result<()> {
        let mut y = y.write_only(self.memory())?;
        self.fill_slices(y.as_mut_slice()?, value);
        Ok(())
    }

    /// `y = x`.
    fn copy<T: Element>(&self, y: &mut DeviceVector<T>, x: &DeviceVector<T>) -> Result<()> {
        check_len("copy", y.len(), x.len())?;
        let tag = self.memory();
        let x = x.read(tag)?;
        let mut y = y.write_only(tag)?;
        self.copy_slices(y.as_mut_slice()?, x.as_slice()?);
        Ok(())
    }

    /// `y = A x`.
    fn product<T: Element>(
        &self,
        a: &SystemMatrix<T>,
        x: &DeviceVector<T>,
        y: &mut DeviceVector<T>,
    ) -> Result<()> {
        check_len("matrix-vector product operand", a.cols(), x.len())?;
        check_len("matrix-vector product result", a.rows(), y.len())?;
        let tag = self.memory();
        let lock = a.lock(tag)?;
        let view = lock.view()?;
        let x = x.read(tag)?;
        let mut y = y.write_only(tag)?;
        self.product_slices(&view, x.as_slice()?, y.as_mut_slice()?);
        Ok(())
    }

    /// `d = rhs - A x`.
    fn defect<T: Element>(
        &self,
        d: &mut DeviceVector<T>,
        rhs: &DeviceVector<T>,
        a: &SystemMatrix<T>,
        x: &DeviceVector<T>,
    ) -> Result<()> {
        check_len("defect operand", a.cols(), x.len())?;
        check_len("defect right-hand side", a.rows(), rhs.len())?;
        check_len("defect result", a.rows(), d.len())?;
        let tag = self.memory();
        let lock = a.lock(tag)?;
        let view = lock.view()?;
        let rhs = rhs.read(tag)?;
        let x = x.read(tag)?;
        let mut d = d.write_only(tag)?;
        self.defect_slices(d.as_mut_slice()?, rhs.as_slice()?, &view, x.as_slice()?);
        Ok(())
    }

    /// Restrict `fine` onto `coarse` and enforce the Dirichlet parts of
    /// `mask` on both grids.
    fn restrict<T: Element>(
        &self,
        coarse: &mut DeviceVector<T>,
        fine: &mut DeviceVector<T>,
        mask: &BorderMask,
    ) -> Result<()> {
        transfer::restrict(self, coarse, fine, mask)
    }

    /// Prolongate `coarse` onto `fine` and enforce the Dirichlet parts of
    /// `mask` on the result.
    fn prolongate<T: Element>(
        &self,
        fine: &mut DeviceVector<T>,
        coarse: &DeviceVector<T>,
        mask: &BorderMask,
    ) -> Result<()> {
        transfer::prolongate(self, fine, coarse, mask)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scalar::ScalarBackend;
    use lattix_core::{MatrixFormat, MemoryArbiter, SparseMatrix};

    fn tridiagonal(n: usize) -> SparseMatrix<f64> {
        let mut m = SparseMatrix::new(n, n);
        for i in 0..n {
            m.set(i, i, 4.0);
            if i > 0 {
                m.set(i, i - 1, -1.0);
            }
            if i + 1 < n {
                m.set(i, i + 1, -1.0);
            }
        }
        m
    }

    #[test]
    fn vector_operations() {
        let arbiter = MemoryArbiter::shared();
        let backend = ScalarBackend;
        let mut y = DeviceVector::from_vec(&arbiter, vec![1.0, 2.0, 3.0]);
        let x = DeviceVector::from_vec(&arbiter, vec![1.0, 1.0, 2.0]);

        backend.sum(&mut y, &x).unwrap();
        assert_eq!(y.to_vec().unwrap(), vec![2.0, 3.0, 5.0]);
        assert_eq!(backend.dot(&y, &x).unwrap(), 15.0);
        assert_eq!(backend.norm_l2(&x).unwrap(), 6.0f64.sqrt());

        let mut z = DeviceVector::zeros(&arbiter, 3);
        backend.difference(&mut z, &y, &x).unwrap();
        assert_eq!(z.to_vec().unwrap(), vec![1.0, 2.0, 3.0]);

        backend.fill(&mut z, 0.25).unwrap();
        backend.copy(&mut y, &z).unwrap();
        assert_eq!(y.to_vec().unwrap(), vec![0.25; 3]);
    }

    #[test]
    fn defect_of_exact_solution_vanishes() {
        let arbiter = MemoryArbiter::shared();
        let backend = ScalarBackend;
        let sparse = tridiagonal(9);
        let x_host: Vec<f64> = (0..9).map(|i| i as f64).collect();
        let rhs_host = sparse.multiply(&x_host).unwrap();

        for format in [MatrixFormat::BandedQ1, MatrixFormat::Ell] {
            let a = SystemMatrix::from_sparse(&arbiter, &sparse, format).unwrap();
            let x = DeviceVector::from_vec(&arbiter, x_host.clone());
            let rhs = DeviceVector::from_vec(&arbiter, rhs_host.clone());
            let mut d = DeviceVector::filled(&arbiter, 9, 1.0);
            backend.defect(&mut d, &rhs, &a, &x).unwrap();
            assert!(d.to_vec().unwrap().iter().all(|v| v.abs() < 1e-12));

            let mut y = DeviceVector::zeros(&arbiter, 9);
            backend.product(&a, &x, &mut y).unwrap();
            assert_eq!(y.to_vec().unwrap(), rhs_host);
        }
    }

    #[test]
    fn mismatched_lengths_are_reported() {
        let arbiter = MemoryArbiter::shared();
        let backend = ScalarBackend;
        let mut y = DeviceVector::<f32>::zeros(&arbiter, 4);
        let x = DeviceVector::zeros(&arbiter, 5);
        assert!(backend.sum(&mut y, &x).unwrap_err().is_size_mismatch());
        assert!(backend.dot(&y, &x).unwrap_err().is_size_mismatch());

        let a = SystemMatrix::from_sparse(
            &arbiter,
            &SparseMatrix::identity(4),
            MatrixFormat::Ell,
        )
        .unwrap();
        assert!(backend.product(&a, &x, &mut y).unwrap_err().is_size_mismatch());
    }

    #[test]
    fn operations_leave_no_locks_behind() {
        let arbiter = MemoryArbiter::shared();
        let backend = ScalarBackend;
        let mut y = DeviceVector::from_vec(&arbiter, vec![1.0f32; 8]);
        let x = DeviceVector::from_vec(&arbiter, vec![2.0f32; 8]);
        backend.scaled_sum(&mut y, &x, 0.5).unwrap();
        for id in [x.id(), y.id()] {
            let status = arbiter.status(id).unwrap();
            assert_eq!(status.read_count, 0);
            assert!(!status.write_locked);
        }
    }
}
