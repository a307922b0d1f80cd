//! Host-side row-wise sparse matrix used to assemble and convert operators.

use crate::element::Element;
use crate::error::{Error, Result, check_len};

/// Sparse matrix with sorted per-row column lists.
#[derive(Debug, Clone, PartialEq)]
pub struct SparseMatrix<T: Element> {
    rows: usize,
    cols: usize,
    entries: Vec<Vec<(usize, T)>>,
}

impl<T: Element> SparseMatrix<T> {
    /// An all-zero `rows × cols` matrix.
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            entries: vec![Vec::new(); rows],
        }
    }

    /// The `n × n` identity.
    pub fn identity(n: usize) -> Self {
        let mut m = Self::new(n, n);
        for i in 0..n {
            m.entries[i].push((i, T::one()));
        }
        m
    }

    /// Build from `(row, column, value)` triplets. Duplicates are summed.
    pub fn from_triplets(
        rows: usize,
        cols: usize,
        triplets: impl IntoIterator<Item = (usize, usize, T)>,
    ) -> Result<Self> {
        let mut m = Self::new(rows, cols);
        for (r, c, v) in triplets {
            if r >= rows || c >= cols {
                return Err(Error::InvalidMatrix(format!(
                    "entry ({}, {}) outside a {}x{} matrix",
                    r, c, rows, cols
                )));
            }
            m.add(r, c, v);
        }
        Ok(m)
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn is_square(&self) -> bool {
        self.rows == self.cols
    }

    /// Number of stored entries.
    pub fn nnz(&self) -> usize {
        self.entries.iter().map(Vec::len).sum()
    }

    /// Longest row, in stored entries.
    pub fn max_row_len(&self) -> usize {
        self.entries.iter().map(Vec::len).max().unwrap_or(0)
    }

    /// Stored entries of `row`, sorted by column.
    pub fn row(&self, row: usize) -> &[(usize, T)] {
        &self.entries[row]
    }

    fn slot(&mut self, r: usize, c: usize) -> &mut T {
        let row = &mut self.entries[r];
        let pos = match row.binary_search_by_key(&c, |&(col, _)| col) {
            Ok(pos) => pos,
            Err(pos) => {
                row.insert(pos, (c, T::zero()));
                pos
            }
        };
        &mut row[pos].1
    }

    /// Overwrite entry `(r, c)`.
    pub fn set(&mut self, r: usize, c: usize, value: T) {
        *self.slot(r, c) = value;
    }

    /// Add `value` to entry `(r, c)`.
    pub fn add(&mut self, r: usize, c: usize, value: T) {
        *self.slot(r, c) += value;
    }

    /// Entry `(r, c)`, zero if not stored.
    pub fn get(&self, r: usize, c: usize) -> T {
        self.entries[r]
            .binary_search_by_key(&c, |&(col, _)| col)
            .map(|pos| self.entries[r][pos].1)
            .unwrap_or_else(|_| T::zero())
    }

    /// Remove every stored entry of `row`.
    pub fn clear_row(&mut self, row: usize) {
        self.entries[row].clear();
    }

    /// All stored entries as `(row, column, value)`.
    pub fn triplets(&self) -> impl Iterator<Item = (usize, usize, T)> + '_ {
        self.entries
            .iter()
            .enumerate()
            .flat_map(|(r, row)| row.iter().map(move |&(c, v)| (r, c, v)))
    }

    /// The transposed matrix.
    pub fn transpose(&self) -> Self {
        let mut t = Self::new(self.cols, self.rows);
        // Rows are visited in order, so every transposed row stays sorted.
        for (r, c, v) in self.triplets() {
            t.entries[c].push((r, v));
        }
        t
    }

    /// Main diagonal of a square matrix.
    pub fn diagonal(&self) -> Result<Vec<T>> {
        check_len("diagonal of a square matrix", self.rows, self.cols)?;
        Ok((0..self.rows).map(|i| self.get(i, i)).collect())
    }

    /// `y = A x` on the host.
    pub fn multiply(&self, x: &[T]) -> Result<Vec<T>> {
        check_len("sparse product operand", self.cols, x.len())?;
        Ok(self
            .entries
            .iter()
            .map(|row| row.iter().map(|&(c, v)| v * x[c]).sum())
            .collect())
    }
}
