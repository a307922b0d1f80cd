//! Cross-device memory coordination for Lattix.
//!
//! This crate provides:
//! - [`MemoryArbiter`]: lock, ownership and transfer bookkeeping for every
//!   registered buffer, shared by all compute backends
//! - [`MemoryBackend`]: per-device upload/download/alloc primitives, with
//!   host and local-store implementations
//! - [`DeviceVector`]: an arbiter-registered dense vector with RAII lock guards
//!
//! # Example
//!
//! ```
//! use lattix_memory::{DeviceVector, MemoryArbiter, MemoryTag};
//!
//! let arbiter = MemoryArbiter::shared();
//! let mut v = DeviceVector::from_vec(&arbiter, vec![1.0f64, 2.0, 3.0]);
//! {
//!     let mut guard = v.write(MemoryTag::Cpu).unwrap();
//!     guard.as_mut_slice().unwrap()[0] = 10.0;
//! }
//! assert_eq!(v.to_vec().unwrap(), vec![10.0, 2.0, 3.0]);
//! ```

pub mod arbiter;
pub mod backend;
pub mod error;
pub mod local_store;
pub mod tag;
pub mod vector;

pub use arbiter::{BlockStatus, MemoryArbiter};
pub use backend::{DevicePtr, HostMemoryBackend, HostRegion, MemoryBackend};
pub use error::{MemoryError, Result};
pub use local_store::LocalStoreBackend;
pub use tag::{LockMode, MemId, MemoryTag};
pub use vector::{DeviceVector, ReadGuard, WriteGuard};
