//! Level sizes of structured grids.
//!
//! A multigrid level is identified by its refinement number. The number of
//! unknowns on a level follows from the grid's generating formula; the
//! reverse lookup is computed from the same formula.

use crate::error::{Error, Result};
use std::fmt;

/// Largest refinement level any grid kind supports.
pub const MAX_LEVEL: u32 = 14;

/// Family of structured grids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GridKind {
    /// Square Q1 grid with `2^l + 1` nodes per side, `(2^l + 1)^2` in total.
    #[default]
    Q1,
    /// Stacked layout with `2^(2l+1) + 2^(l+2)` unknowns per level.
    /// Only explicit matrix transfers apply to it.
    Q1Stacked,
}

impl GridKind {
    pub fn name(self) -> &'static str {
        match self {
            GridKind::Q1 => "q1",
            GridKind::Q1Stacked => "q1-stacked",
        }
    }

    /// Number of unknowns on `level`.
    pub fn level_size(self, level: u32) -> Result<usize> {
        if level > MAX_LEVEL {
            return Err(Error::LevelTooLarge {
                level,
                max: MAX_LEVEL,
            });
        }
        Ok(match self {
            GridKind::Q1 => {
                let side = (1usize << level) + 1;
                side * side
            }
            GridKind::Q1Stacked => (1usize << (2 * level + 1)) + (1usize << (level + 2)),
        })
    }

    /// Nodes per side of a square grid on `level`, if the grid is square.
    pub fn width(self, level: u32) -> Option<usize> {
        match self {
            GridKind::Q1 if level <= MAX_LEVEL => Some((1usize << level) + 1),
            _ => None,
        }
    }

    /// The level whose size is `size`.
    pub fn level_for_size(self, size: usize) -> Result<u32> {
        (0..=MAX_LEVEL)
            .find(|&l| self.level_size(l).is_ok_and(|n| n == size))
            .ok_or(Error::UnsupportedSize { size, grid: self })
    }
}

impl fmt::Display for GridKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Side length of a square grid with `n` nodes, if `n` is a perfect square.
pub fn square_width(n: usize) -> Option<usize> {
    let w = (n as f64).sqrt().round() as usize;
    (w * w == n).then_some(w)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn q1_sizes() {
        let sizes: Vec<usize> = (0..6).map(|l| GridKind::Q1.level_size(l).unwrap()).collect();
        assert_eq!(sizes, vec![4, 9, 25, 81, 289, 1089]);
        assert_eq!(GridKind::Q1.width(3), Some(9));
    }

    #[test]
    fn stacked_sizes() {
        let sizes: Vec<usize> = (1..6)
            .map(|l| GridKind::Q1Stacked.level_size(l).unwrap())
            .collect();
        assert_eq!(sizes, vec![16, 48, 160, 576, 2176]);
        assert_eq!(GridKind::Q1Stacked.width(2), None);
    }

    #[test]
    fn reverse_lookup_is_consistent() {
        for grid in [GridKind::Q1, GridKind::Q1Stacked] {
            for level in 0..=MAX_LEVEL {
                let n = grid.level_size(level).unwrap();
                assert_eq!(grid.level_for_size(n).unwrap(), level);
            }
        }
    }

    #[test]
    fn unknown_size_is_rejected() {
        assert!(matches!(
            GridKind::Q1.level_for_size(100),
            Err(Error::UnsupportedSize { size: 100, .. })
        ));
        assert!(matches!(
            GridKind::Q1.level_size(MAX_LEVEL + 1),
            Err(Error::LevelTooLarge { .. })
        ));
    }

    #[test]
    fn square_widths() {
        assert_eq!(square_width(289), Some(17));
        assert_eq!(square_width(0), Some(0));
        assert_eq!(square_width(10), None);
    }
}
