//! Error types for lattix-core.

use crate::grid::GridKind;
use lattix_memory::MemoryError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("size mismatch in {context}: expected {expected}, got {actual}")]
    SizeMismatch {
        context: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("{size} is not a level size of the {grid} grid")]
    UnsupportedSize { size: usize, grid: GridKind },

    #[error("level {level} exceeds the largest supported level {max}")]
    LevelTooLarge { level: u32, max: u32 },

    #[error("invalid matrix: {0}")]
    InvalidMatrix(String),

    #[error("{path}:{line}: {message}")]
    Parse {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Memory(#[from] MemoryError),
}

impl Error {
    /// Shorthand for [`Error::SizeMismatch`].
    pub fn size_mismatch(context: &'static str, expected: usize, actual: usize) -> Self {
        Error::SizeMismatch {
            context,
            expected,
            actual,
        }
    }
}

/// Return a size mismatch error unless `actual == expected`.
pub fn check_len(context: &'static str, expected: usize, actual: usize) -> Result<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(Error::size_mismatch(context, expected, actual))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
