//! Poisson model problems on the unit square.
//!
//! `-Δu = f` with homogeneous Dirichlet conditions, discretised on the Q1
//! grid of a level. The right-hand side is `f = 2π² sin(πx) sin(πy)`, whose
//! continuous solution is `u = sin(πx) sin(πy)`.
//!
//! Boundary rows are identity rows with zero right-hand side. Interior rows
//! only couple to interior nodes, so the matrix stays symmetric positive
//! definite.

use crate::boundary::is_boundary;
use crate::element::Element;
use crate::error::{Error, Result};
use crate::grid::GridKind;
use crate::matrix::SparseMatrix;
use std::f64::consts::PI;
use std::fmt;

/// Discretisation of the Laplacian.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Stencil {
    /// Finite-difference five-point stencil.
    FivePoint,
    /// Bilinear finite-element nine-point stencil.
    #[default]
    Q1,
}

impl Stencil {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "five-point" | "5" | "fd" => Some(Stencil::FivePoint),
            "q1" | "nine-point" | "9" | "fem" => Some(Stencil::Q1),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Stencil::FivePoint => "five-point",
            Stencil::Q1 => "q1",
        }
    }

    /// Neighbour offsets `(dx, dy)` and weights, before scaling by `1/h²`.
    fn weights(self) -> &'static [(isize, isize, f64)] {
        const FIVE: [(isize, isize, f64); 5] = [
            (0, 0, 4.0),
            (-1, 0, -1.0),
            (1, 0, -1.0),
            (0, -1, -1.0),
            (0, 1, -1.0),
        ];
        const NINE: [(isize, isize, f64); 9] = [
            (0, 0, 8.0 / 3.0),
            (-1, -1, -1.0 / 3.0),
            (0, -1, -1.0 / 3.0),
            (1, -1, -1.0 / 3.0),
            (-1, 0, -1.0 / 3.0),
            (1, 0, -1.0 / 3.0),
            (-1, 1, -1.0 / 3.0),
            (0, 1, -1.0 / 3.0),
            (1, 1, -1.0 / 3.0),
        ];
        match self {
            Stencil::FivePoint => &FIVE,
            Stencil::Q1 => &NINE,
        }
    }
}

impl fmt::Display for Stencil {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn q1_width(level: u32) -> Result<usize> {
    GridKind::Q1
        .width(level)
        .ok_or(Error::LevelTooLarge {
            level,
            max: crate::grid::MAX_LEVEL,
        })
}

/// System matrix of the model problem on `level`.
pub fn poisson_matrix<T: Element>(level: u32, stencil: Stencil) -> Result<SparseMatrix<T>> {
    let w = q1_width(level)?;
    let n = w * w;
    let h = 1.0 / (w - 1) as f64;
    let scale = 1.0 / (h * h);

    let mut a = SparseMatrix::new(n, n);
    for i in 0..n {
        if is_boundary(i, w) {
            a.set(i, i, T::one());
            continue;
        }
        let (ix, iy) = ((i % w) as isize, (i / w) as isize);
        for &(dx, dy, weight) in stencil.weights() {
            let j = ((iy + dy) as usize) * w + (ix + dx) as usize;
            if !is_boundary(j, w) {
                a.set(i, j, T::val_from_f64(weight * scale));
            }
        }
    }
    Ok(a)
}

fn sample<T: Element>(level: u32, f: impl Fn(f64, f64) -> f64) -> Result<Vec<T>> {
    let w = q1_width(level)?;
    let h = 1.0 / (w - 1) as f64;
    Ok((0..w * w)
        .map(|i| {
            if is_boundary(i, w) {
                T::zero()
            } else {
                T::val_from_f64(f((i % w) as f64 * h, (i / w) as f64 * h))
            }
        })
        .collect())
}

/// Right-hand side of the model problem on `level`.
pub fn poisson_rhs<T: Element>(level: u32) -> Result<Vec<T>> {
    sample(level, |x, y| 2.0 * PI * PI * (PI * x).sin() * (PI * y).sin())
}

/// Continuous solution sampled at the nodes of `level`.
pub fn poisson_exact<T: Element>(level: u32) -> Result<Vec<T>> {
    sample(level, |x, y| (PI * x).sin() * (PI * y).sin())
}

/// Coarse coordinates a fine coordinate interpolates from.
fn parents(f: usize) -> ([usize; 2], usize) {
    if f % 2 == 0 {
        ([f / 2, f / 2], 1)
    } else {
        ([f / 2, f / 2 + 1], 2)
    }
}

/// Bilinear prolongation from `fine_level - 1` to `fine_level`.
///
/// Rows of fine boundary nodes and columns of coarse boundary nodes are
/// left empty, so the operator and its transpose carry Dirichlet conditions
/// without a separate mask pass.
pub fn prolongation_matrix<T: Element>(fine_level: u32) -> Result<SparseMatrix<T>> {
    if fine_level == 0 {
        return Err(Error::InvalidMatrix(
            "level 0 has no coarser level to prolongate from".to_string(),
        ));
    }
    let wf = q1_width(fine_level)?;
    let wc = q1_width(fine_level - 1)?;
    let mut p = SparseMatrix::new(wf * wf, wc * wc);

    for i in 0..wf * wf {
        if is_boundary(i, wf) {
            continue;
        }
        let (fx, fy) = (i % wf, i / wf);
        let (xs, nx) = parents(fx);
        let (ys, ny) = parents(fy);
        let weight = 1.0 / (nx * ny) as f64;
        for &cy in &ys[..ny] {
            for &cx in &xs[..nx] {
                let j = cy * wc + cx;
                if !is_boundary(j, wc) {
                    p.set(i, j, T::val_from_f64(weight));
                }
            }
        }
    }
    Ok(p)
}
