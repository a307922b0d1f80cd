//! Text formats for persisted matrices and vectors.
//!
//! - ELL: a header line `rows columns nnz`, then one `row column value`
//!   line per entry (0-based indices). Lines starting with `%` or `#` are
//!   comments.
//! - EXP: one value per line in exponential notation.
//!
//! A Poisson hierarchy on disk is a directory holding `poisson_A_<l>.ell`
//! per level, `poisson_prol_<l>.ell` per level above the coarsest,
//! `poisson_rhs` for the finest level and optionally `poisson_sol`, a
//! reference solution.

use crate::element::Element;
use crate::error::{Error, Result};
use crate::matrix::SparseMatrix;
use crate::poisson::{self, Stencil};
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

fn parse_err(path: &Path, line: usize, message: impl Into<String>) -> Error {
    Error::Parse {
        path: path.to_path_buf(),
        line,
        message: message.into(),
    }
}

fn field<F: FromStr>(path: &Path, line: usize, token: Option<&str>, what: &str) -> Result<F> {
    let token = token.ok_or_else(|| parse_err(path, line, format!("missing {}", what)))?;
    token
        .parse()
        .map_err(|_| parse_err(path, line, format!("invalid {} '{}'", what, token)))
}

/// Content lines with their 1-based line numbers.
fn content_lines(path: &Path) -> Result<impl Iterator<Item = Result<(usize, String)>>> {
    let reader = BufReader::new(File::open(path)?);
    Ok(reader
        .lines()
        .enumerate()
        .map(|(i, line)| line.map(|l| (i + 1, l)).map_err(Error::from))
        .filter(|entry| match entry {
            Ok((_, l)) => {
                let t = l.trim();
                !(t.is_empty() || t.starts_with('%') || t.starts_with('#'))
            }
            Err(_) => true,
        }))
}

/// Read a matrix in ELL text format.
pub fn read_ell<T: Element>(path: impl AsRef<Path>) -> Result<SparseMatrix<T>> {
    let path = path.as_ref();
    let mut lines = content_lines(path)?;

    let (line_no, header) = lines
        .next()
        .ok_or_else(|| parse_err(path, 0, "missing header"))??;
    let mut tokens = header.split_whitespace();
    let rows: usize = field(path, line_no, tokens.next(), "row count")?;
    let cols: usize = field(path, line_no, tokens.next(), "column count")?;
    let nnz: usize = field(path, line_no, tokens.next(), "entry count")?;

    let mut triplets = Vec::with_capacity(nnz);
    for entry in lines {
        let (line_no, line) = entry?;
        let mut tokens = line.split_whitespace();
        let r: usize = field(path, line_no, tokens.next(), "row")?;
        let c: usize = field(path, line_no, tokens.next(), "column")?;
        let v: f64 = field(path, line_no, tokens.next(), "value")?;
        if r >= rows || c >= cols {
            return Err(parse_err(
                path,
                line_no,
                format!("entry ({}, {}) outside a {}x{} matrix", r, c, rows, cols),
            ));
        }
        triplets.push((r, c, T::val_from_f64(v)));
    }
    if triplets.len() != nnz {
        return Err(parse_err(
            path,
            0,
            format!("header announces {} entries, found {}", nnz, triplets.len()),
        ));
    }
    SparseMatrix::from_triplets(rows, cols, triplets)
}

/// Write a matrix in ELL text format.
pub fn write_ell<T: Element>(path: impl AsRef<Path>, matrix: &SparseMatrix<T>) -> Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    writeln!(out, "{} {} {}", matrix.rows(), matrix.cols(), matrix.nnz())?;
    for (r, c, v) in matrix.triplets() {
        writeln!(out, "{} {} {:.17e}", r, c, v.val_to_f64())?;
    }
    out.flush()?;
    Ok(())
}

/// Read a vector in EXP format.
pub fn read_exp<T: Element>(path: impl AsRef<Path>) -> Result<Vec<T>> {
    let path = path.as_ref();
    content_lines(path)?
        .map(|entry| {
            let (line_no, line) = entry?;
            let v: f64 = field(path, line_no, line.split_whitespace().next(), "value")?;
            Ok(T::val_from_f64(v))
        })
        .collect()
}

/// Write a vector in EXP format.
pub fn write_exp<T: Element>(path: impl AsRef<Path>, values: &[T]) -> Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    for v in values {
        writeln!(out, "{:.17e}", v.val_to_f64())?;
    }
    out.flush()?;
    Ok(())
}

/// System matrix file of `level` inside a hierarchy directory.
pub fn system_file(dir: &Path, level: u32) -> PathBuf {
    dir.join(format!("poisson_A_{}.ell", level))
}

/// Prolongation matrix file from `level - 1` to `level`.
pub fn prolongation_file(dir: &Path, level: u32) -> PathBuf {
    dir.join(format!("poisson_prol_{}.ell", level))
}

/// Right-hand side file of the finest level.
pub fn rhs_file(dir: &Path) -> PathBuf {
    dir.join("poisson_rhs")
}

/// Reference solution file of the finest level.
pub fn solution_file(dir: &Path) -> PathBuf {
    dir.join("poisson_sol")
}

/// Write the generated Poisson hierarchy for levels `0..=max_level`,
/// with the continuous solution as reference.
pub fn write_poisson_directory(
    dir: impl AsRef<Path>,
    max_level: u32,
    stencil: Stencil,
) -> Result<()> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir)?;
    for level in 0..=max_level {
        let a = poisson::poisson_matrix::<f64>(level, stencil)?;
        write_ell(system_file(dir, level), &a)?;
        if level > 0 {
            write_ell(
                prolongation_file(dir, level),
                &poisson::prolongation_matrix::<f64>(level)?,
            )?;
        }
    }
    write_exp(rhs_file(dir), &poisson::poisson_rhs::<f64>(max_level)?)?;
    write_exp(solution_file(dir), &poisson::poisson_exact::<f64>(max_level)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn ell_file_with_comments() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.ell");
        fs::write(
            &path,
            "% generated\n3 3 3\n0 0 4.0e0\n# off-diagonal\n1 2 -1.5e-1\n2 2 1e0\n",
        )
        .unwrap();

        let m: SparseMatrix<f64> = read_ell(&path).unwrap();
        assert_eq!(m.nnz(), 3);
        assert_eq!(m.get(1, 2), -0.15);
    }

    #[test]
    fn ell_written_matrix_reads_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("p.ell");
        let m = crate::poisson::prolongation_matrix::<f64>(3).unwrap();
        write_ell(&path, &m).unwrap();
        assert_eq!(read_ell::<f64>(&path).unwrap(), m);
    }

    #[test]
    fn ell_entry_count_must_match_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.ell");
        fs::write(&path, "2 2 2\n0 0 1.0\n").unwrap();
        assert!(matches!(read_ell::<f32>(&path), Err(Error::Parse { .. })));
    }

    #[test]
    fn ell_reports_line_of_bad_value() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.ell");
        fs::write(&path, "2 2 1\n0 1 abc\n").unwrap();
        match read_ell::<f64>(&path) {
            Err(Error::Parse { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected parse error, got {:?}", other),
        }
    }

    #[test]
    fn exp_vector_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rhs");
        let v = vec![1.0e-3f64, -2.5, 0.0, 123456.789];
        write_exp(&path, &v).unwrap();
        assert_eq!(read_exp::<f64>(&path).unwrap(), v);
    }

    #[test]
    fn missing_file_is_io_error() {
        assert!(matches!(
            read_exp::<f64>("/nonexistent/lattix/rhs"),
            Err(Error::Io(_))
        ));
    }

    #[test]
    fn poisson_directory_layout() {
        let dir = tempdir().unwrap();
        write_poisson_directory(dir.path(), 2, Stencil::FivePoint).unwrap();
        for level in 0..=2 {
            assert!(system_file(dir.path(), level).exists());
        }
        assert!(!prolongation_file(dir.path(), 0).exists());
        let p = read_ell::<f64>(prolongation_file(dir.path(), 2)).unwrap();
        assert_eq!((p.rows(), p.cols()), (25, 9));
        assert_eq!(read_exp::<f64>(rhs_file(dir.path())).unwrap().len(), 25);
        assert_eq!(read_exp::<f64>(solution_file(dir.path())).unwrap().len(), 25);
    }
}
