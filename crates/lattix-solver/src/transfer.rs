//! Grid transfers between neighbouring levels of a square Q1 hierarchy.
//!
//! A coarse grid with `wc` nodes per side sits under a fine grid with
//! `wf = 2 wc - 1`; coarse node `(cx, cy)` coincides with fine node
//! `(2 cx, 2 cy)`. Nodes are numbered row by row from the bottom-left.
//!
//! Restriction takes the weighted average of the nine fine nodes around the
//! coincident node (weights 1, 1/2 on edge neighbours, 1/4 on diagonal
//! neighbours), normalised by the weights that fall inside the domain.
//! Prolongation is bilinear interpolation.
//!
//! Both transfers accumulate in the element precision, rows outer and
//! columns inner. Device kernels follow the same order, so they agree with
//! the host kernels up to the rounding of their division and any fused
//! multiply-add: a few ulps of the result, never more.

use crate::error::{Error, Result};
use crate::operator::NumericBackend;
use lattix_core::grid::square_width;
use lattix_core::{BorderMask, DeviceVector, Element, SystemMatrix};
use std::fmt;

/// How the V-cycle moves vectors between levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransferKind {
    /// Fixed nine-point stencils on square Q1 grids, with a mask pass.
    #[default]
    Stencil,
    /// Explicit prolongation matrices and their transposes.
    Matrix,
}

impl TransferKind {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "stencil" => Some(TransferKind::Stencil),
            "matrix" | "explicit" => Some(TransferKind::Matrix),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            TransferKind::Stencil => "stencil",
            TransferKind::Matrix => "matrix",
        }
    }
}

impl fmt::Display for TransferKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Side lengths `(wf, wc)` of a fine/coarse grid pair, or the size the
/// offending vector should have had.
pub fn grid_widths(fine: usize, coarse: usize) -> Result<(usize, usize)> {
    let wf = square_width(fine).filter(|&w| w >= 3 && w % 2 == 1);
    let wc = square_width(coarse).filter(|&w| w >= 2);
    match (wf, wc) {
        (Some(wf), Some(wc)) if wf == 2 * wc - 1 => Ok((wf, wc)),
        (Some(wf), _) => {
            let w = wf.div_ceil(2);
            Err(Error::size_mismatch("coarse grid of a transfer", w * w, coarse))
        }
        (None, Some(wc)) => {
            let w = 2 * wc - 1;
            Err(Error::size_mismatch("fine grid of a transfer", w * w, fine))
        }
        (None, None) => Err(Error::size_mismatch("fine grid of a transfer", 9, fine)),
    }
}

const AXIS_WEIGHTS: [(isize, f64); 3] = [(-1, 0.5), (0, 1.0), (1, 0.5)];

/// Restrict onto the coarse nodes `start..start + out.len()`.
pub fn restrict_nodes<T: Element>(out: &mut [T], start: usize, fine: &[T], wf: usize, wc: usize) {
    let wf_i = wf as isize;
    for (k, value) in out.iter_mut().enumerate() {
        let i = start + k;
        let (fx, fy) = (2 * (i % wc) as isize, 2 * (i / wc) as isize);
        let mut acc = T::zero();
        let mut weight = T::zero();
        for (dy, wy) in AXIS_WEIGHTS {
            let y = fy + dy;
            if y < 0 || y >= wf_i {
                continue;
            }
            for (dx, wx) in AXIS_WEIGHTS {
                let x = fx + dx;
                if x < 0 || x >= wf_i {
                    continue;
                }
                let w = T::val_from_f64(wx * wy);
                acc += w * fine[(y * wf_i + x) as usize];
                weight += w;
            }
        }
        *value = acc / weight;
    }
}

/// Prolongate onto the fine nodes `start..start + out.len()`.
pub fn prolongate_nodes<T: Element>(
    out: &mut [T],
    start: usize,
    coarse: &[T],
    wf: usize,
    wc: usize,
) {
    let half = T::val_from_f64(0.5);
    for (k, value) in out.iter_mut().enumerate() {
        let i = start + k;
        let (fx, fy) = (i % wf, i / wf);
        let (cx, cy) = (fx / 2, fy / 2);
        let at = |x: usize, y: usize| coarse[y * wc + x];
        *value = match (fx % 2, fy % 2) {
            (0, 0) => at(cx, cy),
            (1, 0) => half * (at(cx, cy) + at(cx + 1, cy)),
            (0, _) => half * (at(cx, cy) + at(cx, cy + 1)),
            _ => {
                half * half
                    * (at(cx, cy) + at(cx + 1, cy) + at(cx, cy + 1) + at(cx + 1, cy + 1))
            }
        };
    }
}

/// Zero the Dirichlet-pinned border nodes of `vector`, locked on `tag`.
pub fn apply_mask<T: Element>(
    vector: &mut DeviceVector<T>,
    mask: &BorderMask,
    tag: lattix_core::MemoryTag,
) -> Result<()> {
    let mut guard = vector.write(tag)?;
    mask.apply_dirichlet(guard.as_mut_slice()?)?;
    Ok(())
}

/// Stencil restriction on the backend's device, followed by the mask pass
/// on both grids.
pub fn restrict<B, T>(
    backend: &B,
    coarse: &mut DeviceVector<T>,
    fine: &mut DeviceVector<T>,
    mask: &BorderMask,
) -> Result<()>
where
    B: NumericBackend + ?Sized,
    T: Element,
{
    let (wf, wc) = grid_widths(fine.len(), coarse.len())?;
    let tag = backend.memory();
    {
        let f = fine.read(tag)?;
        let mut c = coarse.write_only(tag)?;
        backend.restrict_slices(c.as_mut_slice()?, f.as_slice()?, wf, wc);
    }
    apply_mask(fine, mask, tag)?;
    apply_mask(coarse, mask, tag)
}

/// Stencil prolongation on the backend's device, followed by the mask pass.
pub fn prolongate<B, T>(
    backend: &B,
    fine: &mut DeviceVector<T>,
    coarse: &DeviceVector<T>,
    mask: &BorderMask,
) -> Result<()>
where
    B: NumericBackend + ?Sized,
    T: Element,
{
    let (wf, wc) = grid_widths(fine.len(), coarse.len())?;
    let tag = backend.memory();
    {
        let c = coarse.read(tag)?;
        let mut f = fine.write_only(tag)?;
        backend.prolongate_slices(f.as_mut_slice()?, c.as_slice()?, wf, wc);
    }
    apply_mask(fine, mask, tag)
}

/// `coarse = R fine` with an explicit restriction matrix.
pub fn restrict_matrix<B, T>(
    backend: &B,
    coarse: &mut DeviceVector<T>,
    fine: &DeviceVector<T>,
    resmat: &SystemMatrix<T>,
) -> Result<()>
where
    B: NumericBackend + ?Sized,
    T: Element,
{
    backend.product(resmat, fine, coarse)
}

/// `fine = P coarse` with an explicit prolongation matrix.
pub fn prolongate_matrix<B, T>(
    backend: &B,
    fine: &mut DeviceVector<T>,
    coarse: &DeviceVector<T>,
    prolmat: &SystemMatrix<T>,
) -> Result<()>
where
    B: NumericBackend + ?Sized,
    T: Element,
{
    backend.product(prolmat, coarse, fine)
}
