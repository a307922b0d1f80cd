//! Macro border masks and Dirichlet boundary enforcement on square grids.
//!
//! Nodes are numbered row by row starting at the bottom-left corner:
//! node `(ix, iy)` has index `iy * width + ix`.

use crate::element::Element;
use crate::error::{Error, Result};
use crate::grid::square_width;

/// Boundary code for a homogeneous Dirichlet condition.
pub const DIRICHLET: u32 = 2;

/// Boundary code for a natural (Neumann) condition; nothing is enforced.
pub const NATURAL: u32 = 0;

/// Position of a mask entry on the square macro domain.
///
/// Even entries are edges (excluding their end points), odd entries the
/// corner between the surrounding edges, running counter-clockwise from
/// the bottom edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BorderPart {
    Bottom = 0,
    BottomRight = 1,
    Right = 2,
    TopRight = 3,
    Top = 4,
    TopLeft = 5,
    Left = 6,
    BottomLeft = 7,
}

impl BorderPart {
    pub const ALL: [BorderPart; 8] = [
        BorderPart::Bottom,
        BorderPart::BottomRight,
        BorderPart::Right,
        BorderPart::TopRight,
        BorderPart::Top,
        BorderPart::TopLeft,
        BorderPart::Left,
        BorderPart::BottomLeft,
    ];

    /// Call `f` with the index of every node this part covers on a
    /// `width × width` grid.
    fn for_each_node(self, width: usize, mut f: impl FnMut(usize)) {
        if width == 0 {
            return;
        }
        let last = width - 1;
        let inner = 1..last.max(1);
        match self {
            BorderPart::Bottom => inner.for_each(|ix| f(ix)),
            BorderPart::Top => inner.for_each(|ix| f(last * width + ix)),
            BorderPart::Left => inner.for_each(|iy| f(iy * width)),
            BorderPart::Right => inner.for_each(|iy| f(iy * width + last)),
            BorderPart::BottomLeft => f(0),
            BorderPart::BottomRight => f(last),
            BorderPart::TopRight => f(last * width + last),
            BorderPart::TopLeft => f(last * width),
        }
    }
}

/// Eight boundary-condition codes describing the sides and corners of the
/// macro domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BorderMask(pub [u32; 8]);

impl Default for BorderMask {
    fn default() -> Self {
        Self::dirichlet()
    }
}

impl BorderMask {
    /// Homogeneous Dirichlet conditions everywhere.
    pub fn dirichlet() -> Self {
        Self([DIRICHLET; 8])
    }

    /// No enforced conditions.
    pub fn natural() -> Self {
        Self([NATURAL; 8])
    }

    /// Set the code of one part.
    pub fn with(mut self, part: BorderPart, code: u32) -> Self {
        self.0[part as usize] = code;
        self
    }

    pub fn code(&self, part: BorderPart) -> u32 {
        self.0[part as usize]
    }

    /// Whether `part` carries a Dirichlet condition.
    pub fn is_dirichlet(&self, part: BorderPart) -> bool {
        self.code(part) == DIRICHLET
    }

    /// For each node of a `width × width` grid, whether a Dirichlet part
    /// covers it.
    pub fn pinned_nodes(&self, width: usize) -> Vec<bool> {
        let mut pinned = vec![false; width * width];
        for part in BorderPart::ALL {
            if self.is_dirichlet(part) {
                part.for_each_node(width, |i| pinned[i] = true);
            }
        }
        pinned
    }

    /// Pin every Dirichlet node of the square grid stored in `values` to
    /// zero.
    pub fn apply_dirichlet<T: Element>(&self, values: &mut [T]) -> Result<()> {
        let width = square_width(values.len()).ok_or(Error::UnsupportedSize {
            size: values.len(),
            grid: crate::grid::GridKind::Q1,
        })?;
        for part in BorderPart::ALL {
            if self.is_dirichlet(part) {
                part.for_each_node(width, |i| values[i] = T::zero());
            }
        }
        Ok(())
    }
}

/// Whether node `i` of a `width × width` grid lies on the domain boundary.
pub fn is_boundary(i: usize, width: usize) -> bool {
    let (ix, iy) = (i % width, i / width);
    ix == 0 || iy == 0 || ix + 1 == width || iy + 1 == width
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dirichlet_mask_clears_whole_boundary() {
        let mut v = vec![1.0f64; 25];
        BorderMask::dirichlet().apply_dirichlet(&mut v).unwrap();
        for (i, &x) in v.iter().enumerate() {
            let expected = if is_boundary(i, 5) { 0.0 } else { 1.0 };
            assert_eq!(x, expected, "node {}", i);
        }
    }

    #[test]
    fn natural_mask_changes_nothing() {
        let mut v = vec![3.0f32; 9];
        BorderMask::natural().apply_dirichlet(&mut v).unwrap();
        assert!(v.iter().all(|&x| x == 3.0));
    }

    #[test]
    fn single_edge_excludes_corners() {
        let mask = BorderMask::natural().with(BorderPart::Bottom, DIRICHLET);
        let mut v = vec![1.0f64; 16];
        mask.apply_dirichlet(&mut v).unwrap();
        assert_eq!(&v[0..4], &[1.0, 0.0, 0.0, 1.0]);
        assert!(v[4..].iter().all(|&x| x == 1.0));
    }

    #[test]
    fn corner_parts() {
        let mask = BorderMask::natural()
            .with(BorderPart::TopLeft, DIRICHLET)
            .with(BorderPart::BottomRight, DIRICHLET);
        let pinned = mask.pinned_nodes(3);
        let expected = [false, false, true, false, false, false, true, false, false];
        assert_eq!(pinned, expected);
    }

    #[test]
    fn non_square_length_is_rejected() {
        let mut v = vec![0.0f64; 10];
        assert!(BorderMask::dirichlet().apply_dirichlet(&mut v).is_err());
    }
}
