//! SIMD-accelerated numerical kernels for Lattix.
//!
//! Provides runtime-detected SIMD implementations for:
//! - f64 and f32 dot products (CG, norms, adaptive correction factors)
//! - f64 and f32 scaled sums `y += alpha * x` (corrections and CG updates)
//!
//! On x86/x86_64 systems, automatically uses AVX-512 or AVX2+FMA when available.
//! Falls back to scalar on all other architectures.

pub mod capability;
pub mod dot;
pub mod scaled_sum;

pub use capability::SimdCapability;
pub use dot::{dot_f32, dot_f32_scalar, dot_f64, dot_f64_scalar};
pub use scaled_sum::{scaled_sum_f32, scaled_sum_f32_scalar, scaled_sum_f64, scaled_sum_f64_scalar};
