//! Host compute backends for Lattix.
//!
//! Provides [`NumericBackend`](lattix_solver::NumericBackend)
//! implementations that run on the host:
//! - [`SimdBackend`]: reference kernels with AVX2/AVX-512 dot products and
//!   scaled sums from `lattix-simd`
//! - [`MultiCoreBackend`]: every kernel partitioned across a rayon pool
//! - [`AcceleratorBackend`]: reference kernels on the local-store device,
//!   so every operand round-trips through the memory arbiter

pub mod accelerator;
pub mod multicore;
pub mod simd;

pub use accelerator::AcceleratorBackend;
pub use multicore::{MultiCoreBackend, MultiCoreConfig};
pub use simd::SimdBackend;
