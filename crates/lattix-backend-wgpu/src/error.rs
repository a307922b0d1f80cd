//! Error types for the wgpu backend.

use std::fmt;

/// wgpu backend error type.
#[derive(Debug)]
#[non_exhaustive]
pub enum WgpuError {
    /// GPU device initialization failed.
    DeviceInit(String),
    /// No suitable GPU adapter found.
    NoAdapter,
    /// Buffer creation or mapping failed.
    Buffer(String),
    /// GPU operation failed.
    Compute(String),
    /// A block has no buffer on the device.
    MissingBuffer(u64),
    /// Buffer size exceeds GPU limits.
    BufferTooLarge {
        /// Required buffer size in bytes.
        required: u64,
        /// Maximum buffer size supported.
        max_buffer: u64,
    },
}

impl fmt::Display for WgpuError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WgpuError::DeviceInit(msg) => write!(f, "GPU device initialization failed: {}", msg),
            WgpuError::NoAdapter => write!(f, "No suitable GPU adapter found"),
            WgpuError::Buffer(msg) => write!(f, "GPU buffer operation failed: {}", msg),
            WgpuError::Compute(msg) => write!(f, "GPU compute operation failed: {}", msg),
            WgpuError::MissingBuffer(id) => write!(f, "Block #{} has no GPU buffer", id),
            WgpuError::BufferTooLarge {
                required,
                max_buffer,
            } => {
                write!(
                    f,
                    "Block requires {} bytes but max buffer size is {}",
                    required, max_buffer
                )
            }
        }
    }
}

impl std::error::Error for WgpuError {}

impl From<WgpuError> for lattix_solver::Error {
    fn from(err: WgpuError) -> Self {
        lattix_solver::Error::Backend(err.to_string())
    }
}

/// Result type for wgpu operations.
pub type Result<T> = std::result::Result<T, WgpuError>;
