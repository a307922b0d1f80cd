//! ELLPACK sparse matrices.

use super::sparse::SparseMatrix;
use crate::element::Element;
use crate::error::Result;
use lattix_memory::{DeviceVector, MemoryArbiter};
use std::sync::Arc;

/// Sparse matrix in ELLPACK layout.
///
/// Every row stores `num_cols_per_row` slots; slot `k` of row `r` lives at
/// `k * rows + r` in `aj` (column) and `ax` (value). Short rows are padded
/// with zero values pointing at column 0.
pub struct EllMatrix<T: Element> {
    rows: usize,
    cols: usize,
    num_cols_per_row: usize,
    nnz: usize,
    aj: DeviceVector<u32>,
    ax: DeviceVector<T>,
}

impl<T: Element> EllMatrix<T> {
    pub fn from_sparse(arbiter: &Arc<MemoryArbiter>, sparse: &SparseMatrix<T>) -> Result<Self> {
        let rows = sparse.rows();
        let k_max = sparse.max_row_len();
        let mut aj = vec![0u32; rows * k_max];
        let mut ax = vec![T::zero(); rows * k_max];
        for r in 0..rows {
            for (k, &(c, v)) in sparse.row(r).iter().enumerate() {
                aj[k * rows + r] = c as u32;
                ax[k * rows + r] = v;
            }
        }
        Ok(Self {
            rows,
            cols: sparse.cols(),
            num_cols_per_row: k_max,
            nnz: sparse.nnz(),
            aj: DeviceVector::from_vec(arbiter, aj),
            ax: DeviceVector::from_vec(arbiter, ax),
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Slots stored per row.
    pub fn num_cols_per_row(&self) -> usize {
        self.num_cols_per_row
    }

    /// Number of stored entries, excluding padding.
    pub fn nnz(&self) -> usize {
        self.nnz
    }

    /// Column indices, column-major by slot.
    pub fn aj(&self) -> &DeviceVector<u32> {
        &self.aj
    }

    /// Values, column-major by slot.
    pub fn ax(&self) -> &DeviceVector<T> {
        &self.ax
    }

    /// Copy back to a host sparse matrix, skipping padding.
    pub fn to_sparse(&self) -> Result<SparseMatrix<T>> {
        let aj = self.aj.to_vec()?;
        let ax = self.ax.to_vec()?;
        let mut sparse = SparseMatrix::new(self.rows, self.cols);
        for r in 0..self.rows {
            for k in 0..self.num_cols_per_row {
                let v = ax[k * self.rows + r];
                if v != T::zero() {
                    sparse.set(r, aj[k * self.rows + r] as usize, v);
                }
            }
        }
        Ok(sparse)
    }
}

impl<T: Element> std::fmt::Debug for EllMatrix<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EllMatrix")
            .field("rows", &self.rows)
            .field("cols", &self.cols)
            .field("num_cols_per_row", &self.num_cols_per_row)
            .field("nnz", &self.nnz)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_is_column_major_by_slot() {
        let arbiter = MemoryArbiter::shared();
        let sparse =
            SparseMatrix::from_triplets(3, 3, [(0, 0, 1.0), (0, 2, 2.0), (2, 1, 3.0)]).unwrap();
        let ell = EllMatrix::<f64>::from_sparse(&arbiter, &sparse).unwrap();

        assert_eq!(ell.num_cols_per_row(), 2);
        assert_eq!(ell.nnz(), 3);
        assert_eq!(ell.aj().to_vec().unwrap(), vec![0, 0, 1, 2, 0, 0]);
        assert_eq!(ell.ax().to_vec().unwrap(), vec![1.0, 0.0, 3.0, 2.0, 0.0, 0.0]);
        assert_eq!(ell.to_sparse().unwrap(), sparse);
    }

    #[test]
    fn rectangular_matrices_are_supported() {
        let arbiter = MemoryArbiter::shared();
        let sparse = SparseMatrix::from_triplets(2, 4, [(1, 3, 5.0f32)]).unwrap();
        let ell = EllMatrix::from_sparse(&arbiter, &sparse).unwrap();
        assert_eq!((ell.rows(), ell.cols()), (2, 4));
        assert_eq!(ell.to_sparse().unwrap().get(1, 3), 5.0);
    }
}
