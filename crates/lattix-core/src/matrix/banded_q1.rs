//! Nine-band matrices for bilinear (Q1) operators on square grids.

use super::sparse::SparseMatrix;
use crate::element::Element;
use crate::error::{Error, Result};
use crate::grid::square_width;
use lattix_memory::{DeviceVector, MemoryArbiter};
use std::sync::Arc;

/// Number of bands of a Q1 operator.
pub const Q1_BANDS: usize = 9;

/// The bands of a Q1 operator. `L`/`D`/`U` name the grid row below, the
/// same row and the row above; the second letter the node to the left, the
/// node itself and the node to the right.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Band {
    LL,
    LD,
    LU,
    DL,
    DD,
    DU,
    UL,
    UD,
    UU,
}

impl Band {
    pub const ALL: [Band; Q1_BANDS] = [
        Band::LL,
        Band::LD,
        Band::LU,
        Band::DL,
        Band::DD,
        Band::DU,
        Band::UL,
        Band::UD,
        Band::UU,
    ];

    /// Column offset of the band from the diagonal on a grid `width` wide.
    pub fn offset(self, width: usize) -> isize {
        let m = width as isize;
        match self {
            Band::LL => -m - 1,
            Band::LD => -m,
            Band::LU => -m + 1,
            Band::DL => -1,
            Band::DD => 0,
            Band::DU => 1,
            Band::UL => m - 1,
            Band::UD => m,
            Band::UU => m + 1,
        }
    }

    fn from_offset(offset: isize, width: usize) -> Option<Band> {
        Band::ALL.into_iter().find(|b| b.offset(width) == offset)
    }
}

/// A Q1 operator stored as nine arbiter-registered bands.
///
/// Entry `(i, i + offset(b))` is `bands[b][i]`; band entries whose column
/// falls outside the matrix are ignored.
pub struct BandedQ1Matrix<T: Element> {
    size: usize,
    width: usize,
    bands: [DeviceVector<T>; Q1_BANDS],
}

impl<T: Element> BandedQ1Matrix<T> {
    /// Build from host band data. Every band must have `width²` entries.
    pub fn from_bands(arbiter: &Arc<MemoryArbiter>, bands: [Vec<T>; Q1_BANDS]) -> Result<Self> {
        let size = bands[Band::DD as usize].len();
        let width = square_width(size).ok_or_else(|| {
            Error::InvalidMatrix(format!("{} is not the size of a square grid", size))
        })?;
        for band in &bands {
            crate::error::check_len("Q1 band", size, band.len())?;
        }
        Ok(Self {
            size,
            width,
            bands: bands.map(|data| DeviceVector::from_vec(arbiter, data)),
        })
    }

    /// Convert a square sparse matrix whose entries all lie on the Q1 bands.
    pub fn from_sparse(arbiter: &Arc<MemoryArbiter>, sparse: &SparseMatrix<T>) -> Result<Self> {
        if !sparse.is_square() {
            return Err(Error::InvalidMatrix(format!(
                "banded matrix must be square, got {}x{}",
                sparse.rows(),
                sparse.cols()
            )));
        }
        let size = sparse.rows();
        let width = square_width(size).ok_or_else(|| {
            Error::InvalidMatrix(format!("{} is not the size of a square grid", size))
        })?;

        let mut bands: [Vec<T>; Q1_BANDS] = std::array::from_fn(|_| vec![T::zero(); size]);
        for (r, c, v) in sparse.triplets() {
            let band = Band::from_offset(c as isize - r as isize, width).ok_or_else(|| {
                Error::InvalidMatrix(format!("entry ({}, {}) is not on a Q1 band", r, c))
            })?;
            bands[band as usize][r] = v;
        }
        Self::from_bands(arbiter, bands)
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Nodes per grid side.
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn band(&self, band: Band) -> &DeviceVector<T> {
        &self.bands[band as usize]
    }

    pub fn bands(&self) -> &[DeviceVector<T>; Q1_BANDS] {
        &self.bands
    }

    /// Copy back to a host sparse matrix, dropping explicit zeros and
    /// out-of-range band entries.
    pub fn to_sparse(&self) -> Result<SparseMatrix<T>> {
        let mut sparse = SparseMatrix::new(self.size, self.size);
        for band in Band::ALL {
            let values = self.band(band).to_vec()?;
            let offset = band.offset(self.width);
            for (r, &v) in values.iter().enumerate() {
                let c = r as isize + offset;
                if v != T::zero() && c >= 0 && (c as usize) < self.size {
                    sparse.set(r, c as usize, v);
                }
            }
        }
        Ok(sparse)
    }
}

impl<T: Element> std::fmt::Debug for BandedQ1Matrix<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BandedQ1Matrix")
            .field("size", &self.size)
            .field("width", &self.width)
            .finish()
    }
}
