//! Error types for lattix-solver.

use lattix_memory::MemoryError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("size mismatch in {context}: expected {expected}, got {actual}")]
    SizeMismatch {
        context: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("invalid multigrid configuration: {0}")]
    InvalidConfig(String),

    #[error("backend error: {0}")]
    Backend(String),

    #[error(transparent)]
    Core(lattix_core::Error),

    #[error(transparent)]
    Memory(#[from] MemoryError),
}

impl Error {
    pub fn size_mismatch(context: &'static str, expected: usize, actual: usize) -> Self {
        Error::SizeMismatch {
            context,
            expected,
            actual,
        }
    }

    pub fn is_size_mismatch(&self) -> bool {
        matches!(self, Error::SizeMismatch { .. })
    }
}

// Size mismatches keep their variant so callers match on one name only.
impl From<lattix_core::Error> for Error {
    fn from(err: lattix_core::Error) -> Self {
        match err {
            lattix_core::Error::SizeMismatch {
                context,
                expected,
                actual,
            } => Error::SizeMismatch {
                context,
                expected,
                actual,
            },
            lattix_core::Error::Memory(e) => Error::Memory(e),
            other => Error::Core(other),
        }
    }
}

/// Return a size mismatch error unless `actual == expected`.
pub(crate) fn check_len(context: &'static str, expected: usize, actual: usize) -> Result<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(Error::size_mismatch(context, expected, actual))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
