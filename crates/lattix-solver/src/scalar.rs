//! Scalar reference backend.

use crate::operator::NumericBackend;

/// Single-threaded host backend running the reference kernels.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScalarBackend;

impl NumericBackend for ScalarBackend {
    fn name(&self) -> &str {
        "cpu"
    }
}
