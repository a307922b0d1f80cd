//! wgpu GPU backend for Lattix.
//!
//! - [`WgpuContext`]: device and queue of one adapter
//! - [`WgpuMemoryBackend`]: GPU buffers as a device of the memory arbiter
//! - [`WgpuBackend`]: numeric backend running grid transfers as compute
//!   shaders

pub mod backend;
pub mod context;
pub mod error;
pub mod memory;
pub mod transfer;

pub use backend::WgpuBackend;
pub use context::WgpuContext;
pub use error::{Result, WgpuError};
pub use memory::WgpuMemoryBackend;
pub use transfer::{TransferKernels, TransferOp};
