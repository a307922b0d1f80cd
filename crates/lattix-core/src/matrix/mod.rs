//! System matrices and their locked views.
//!
//! Kernels never read matrix storage directly: they lock a matrix on their
//! device with [`SystemMatrix::lock`] and compute on the [`MatrixView`] of
//! the held guards.

pub mod banded_q1;
pub mod ell;
pub mod sparse;

pub use banded_q1::{Band, BandedQ1Matrix, Q1_BANDS};
pub use ell::EllMatrix;
pub use sparse::SparseMatrix;

use crate::element::Element;
use crate::error::{Result, check_len};
use lattix_memory::{MemoryArbiter, MemoryTag, ReadGuard};
use std::ops::Range;
use std::sync::Arc;

/// Storage format of a matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatrixFormat {
    /// Nine-band Q1 storage; square grids only.
    #[default]
    BandedQ1,
    /// ELLPACK storage.
    Ell,
}

impl MatrixFormat {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "banded" | "banded-q1" | "q1" => Some(MatrixFormat::BandedQ1),
            "ell" | "ellpack" => Some(MatrixFormat::Ell),
            _ => None,
        }
    }
}

/// A system or transfer matrix in one of the supported formats.
#[derive(Debug)]
pub enum SystemMatrix<T: Element> {
    BandedQ1(BandedQ1Matrix<T>),
    Ell(EllMatrix<T>),
}

impl<T: Element> SystemMatrix<T> {
    /// Convert a host sparse matrix into `format`.
    pub fn from_sparse(
        arbiter: &Arc<MemoryArbiter>,
        sparse: &SparseMatrix<T>,
        format: MatrixFormat,
    ) -> Result<Self> {
        Ok(match format {
            MatrixFormat::BandedQ1 => {
                SystemMatrix::BandedQ1(BandedQ1Matrix::from_sparse(arbiter, sparse)?)
            }
            MatrixFormat::Ell => SystemMatrix::Ell(EllMatrix::from_sparse(arbiter, sparse)?),
        })
    }

    pub fn format(&self) -> MatrixFormat {
        match self {
            SystemMatrix::BandedQ1(_) => MatrixFormat::BandedQ1,
            SystemMatrix::Ell(_) => MatrixFormat::Ell,
        }
    }

    pub fn rows(&self) -> usize {
        match self {
            SystemMatrix::BandedQ1(m) => m.size(),
            SystemMatrix::Ell(m) => m.rows(),
        }
    }

    pub fn cols(&self) -> usize {
        match self {
            SystemMatrix::BandedQ1(m) => m.size(),
            SystemMatrix::Ell(m) => m.cols(),
        }
    }

    /// Copy back to a host sparse matrix.
    pub fn to_sparse(&self) -> Result<SparseMatrix<T>> {
        match self {
            SystemMatrix::BandedQ1(m) => m.to_sparse(),
            SystemMatrix::Ell(m) => m.to_sparse(),
        }
    }

    /// Main diagonal, read on the host.
    pub fn diagonal(&self) -> Result<Vec<T>> {
        check_len("diagonal of a square matrix", self.rows(), self.cols())?;
        let lock = self.lock(MemoryTag::Cpu)?;
        let view = lock.view()?;
        Ok((0..view.rows()).map(|i| view.entry(i, i)).collect())
    }

    /// Read-lock every storage vector on `tag`.
    pub fn lock(&self, tag: MemoryTag) -> Result<MatrixLock<'_, T>> {
        let parts = match self {
            SystemMatrix::BandedQ1(m) => LockedParts::Banded {
                width: m.width(),
                size: m.size(),
                bands: m
                    .bands()
                    .iter()
                    .map(|b| b.read(tag))
                    .collect::<lattix_memory::Result<Vec<_>>>()?,
            },
            SystemMatrix::Ell(m) => LockedParts::Ell {
                rows: m.rows(),
                cols: m.cols(),
                num_cols_per_row: m.num_cols_per_row(),
                aj: m.aj().read(tag)?,
                ax: m.ax().read(tag)?,
            },
        };
        Ok(MatrixLock { parts })
    }
}

enum LockedParts<'a, T: Element> {
    Banded {
        width: usize,
        size: usize,
        bands: Vec<ReadGuard<'a, T>>,
    },
    Ell {
        rows: usize,
        cols: usize,
        num_cols_per_row: usize,
        aj: ReadGuard<'a, u32>,
        ax: ReadGuard<'a, T>,
    },
}

/// Read locks on all storage of a matrix. Released on drop.
pub struct MatrixLock<'a, T: Element> {
    parts: LockedParts<'a, T>,
}

impl<'a, T: Element> MatrixLock<'a, T> {
    /// Slices of the locked storage. Fails if the device is not
    /// host-addressable.
    pub fn view(&self) -> Result<MatrixView<'_, T>> {
        Ok(match &self.parts {
            LockedParts::Banded { width, size, bands } => {
                let mut slices: [&[T]; Q1_BANDS] = [&[][..]; Q1_BANDS];
                for (slot, guard) in slices.iter_mut().zip(bands) {
                    *slot = guard.as_slice()?;
                }
                MatrixView::Banded {
                    width: *width,
                    size: *size,
                    bands: slices,
                }
            }
            LockedParts::Ell {
                rows,
                cols,
                num_cols_per_row,
                aj,
                ax,
            } => MatrixView::Ell {
                rows: *rows,
                cols: *cols,
                num_cols_per_row: *num_cols_per_row,
                aj: aj.as_slice()?,
                ax: ax.as_slice()?,
            },
        })
    }
}

/// Borrowed slices of a locked matrix.
#[derive(Debug, Clone, Copy)]
pub enum MatrixView<'a, T: Element> {
    Banded {
        width: usize,
        size: usize,
        bands: [&'a [T]; Q1_BANDS],
    },
    Ell {
        rows: usize,
        cols: usize,
        num_cols_per_row: usize,
        aj: &'a [u32],
        ax: &'a [T],
    },
}

impl<'a, T: Element> MatrixView<'a, T> {
    pub fn rows(&self) -> usize {
        match self {
            MatrixView::Banded { size, .. } => *size,
            MatrixView::Ell { rows, .. } => *rows,
        }
    }

    pub fn cols(&self) -> usize {
        match self {
            MatrixView::Banded { size, .. } => *size,
            MatrixView::Ell { cols, .. } => *cols,
        }
    }

    /// Entry `(i, j)`.
    pub fn entry(&self, i: usize, j: usize) -> T {
        match self {
            MatrixView::Banded { width, bands, .. } => {
                let offset = j as isize - i as isize;
                Band::ALL
                    .into_iter()
                    .find(|b| b.offset(*width) == offset)
                    .map(|b| bands[b as usize][i])
                    .unwrap_or_else(T::zero)
            }
            MatrixView::Ell {
                rows,
                num_cols_per_row,
                aj,
                ax,
                ..
            } => (0..*num_cols_per_row)
                .map(|k| k * *rows + i)
                .filter(|&idx| aj[idx] as usize == j)
                .map(|idx| ax[idx])
                .sum(),
        }
    }

    /// Row `i` of the matrix times `x`.
    #[inline]
    pub fn row_dot(&self, i: usize, x: &[T]) -> T {
        match self {
            MatrixView::Banded { width, size, bands } => {
                let mut acc = T::zero();
                for band in Band::ALL {
                    let j = i as isize + band.offset(*width);
                    if j >= 0 && (j as usize) < *size {
                        acc += bands[band as usize][i] * x[j as usize];
                    }
                }
                acc
            }
            MatrixView::Ell {
                rows,
                num_cols_per_row,
                aj,
                ax,
                ..
            } => {
                let mut acc = T::zero();
                for k in 0..*num_cols_per_row {
                    let idx = k * *rows + i;
                    acc += ax[idx] * x[aj[idx] as usize];
                }
                acc
            }
        }
    }

    /// `out[r] = (A x)[rows.start + r]` for a contiguous block of rows.
    pub fn product_rows(&self, rows: Range<usize>, x: &[T], out: &mut [T]) {
        debug_assert_eq!(rows.len(), out.len());
        for (o, i) in out.iter_mut().zip(rows) {
            *o = self.row_dot(i, x);
        }
    }

    /// Check that `y = A x` is well formed.
    pub fn check_product(&self, x: usize, y: usize) -> Result<()> {
        check_len("matrix-vector product operand", self.cols(), x)?;
        check_len("matrix-vector product result", self.rows(), y)
    }

    /// `y = A x`.
    pub fn product(&self, x: &[T], y: &mut [T]) -> Result<()> {
        self.check_product(x.len(), y.len())?;
        self.product_rows(0..y.len(), x, y);
        Ok(())
    }
}
