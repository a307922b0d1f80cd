//! # Lattix
//!
//! Geometric multigrid for structured grids, on whichever device holds the
//! data.
//!
//! Lattix provides:
//! - A V-cycle solver with damped Jacobi smoothing and a CG coarse solver
//! - Stencil or matrix based grid transfer
//! - Mixed-precision defect correction around a single-precision hierarchy
//! - A memory arbiter that keeps vectors coherent across host, local-store
//!   and GPU memory
//! - Poisson model problems and the ELL/EXP file formats
//!
//! ## Quick Start
//!
//! ```rust
//! use lattix::prelude::*;
//!
//! let arbiter = MemoryArbiter::shared();
//! let config = MgConfig::default().with_tolerance(1e-8);
//! let mut info = MgInfo::<f64>::poisson(&arbiter, 5, config, Stencil::Q1).unwrap();
//!
//! let backend = AnyBackend::create(&ComputeBackend::Cpu, &arbiter).unwrap();
//! let result = solve_multigrid(&backend, &mut info).unwrap();
//! assert!(result.converged());
//! ```
//!
//! ## Features
//!
//! - `wgpu` - Enable the wgpu GPU backend
//! - `full` - Enable all optional features

mod any;

// Re-export core crates
pub use lattix_core as core;
pub use lattix_memory as memory;
pub use lattix_simd as simd;
pub use lattix_solver as solver;

// Re-export CPU backends
pub use lattix_backend_cpu as backend_cpu;

#[cfg(feature = "wgpu")]
pub use lattix_backend_wgpu as backend_wgpu;

pub use any::AnyBackend;

// ============================================================================
// Convenient re-exports from lattix_core and lattix_memory
// ============================================================================

pub use lattix_core::{
    BorderMask,
    BorderPart,
    DeviceVector,
    Element,
    // Errors
    Error as CoreError,
    GridKind,
    MatrixFormat,
    MemoryArbiter,
    MemoryTag,
    SparseMatrix,
    Stencil,
    SystemMatrix,
};

pub use lattix_memory::{BlockStatus, MemoryBackend, MemoryError};

// ============================================================================
// Convenient re-exports from lattix_solver
// ============================================================================

pub use lattix_solver::{
    CancellationToken,
    // CG
    CgConfig,
    CgResult,
    // Backends
    ComputeBackend,
    // Errors
    Error,
    // Hierarchy
    MgConfig,
    MgInfo,
    MgInfoBuilder,
    // Mixed precision
    MixedPrecisionConfig,
    MixedPrecisionResult,
    MultigridResult,
    NumericBackend,
    Result,
    ScalarBackend,
    SolveStatus,
    TransferKind,
    solve_cg,
    solve_mixed_precision,
    // V-cycle
    solve_multigrid,
};

pub use lattix_backend_cpu::{AcceleratorBackend, MultiCoreBackend, MultiCoreConfig, SimdBackend};

// ============================================================================
// Prelude module for convenient imports
// ============================================================================

/// Prelude module containing commonly used types and traits.
///
/// ```rust
/// use lattix::prelude::*;
/// ```
pub mod prelude {
    // Memory
    pub use crate::{DeviceVector, MemoryArbiter, MemoryTag};

    // Problems
    pub use crate::{BorderMask, MatrixFormat, SparseMatrix, Stencil, SystemMatrix};

    // Backends
    pub use crate::{AnyBackend, ComputeBackend, NumericBackend};

    // Solvers
    pub use crate::{
        CancellationToken, MgConfig, MgInfo, MgInfoBuilder, MixedPrecisionConfig,
        MultigridResult, SolveStatus, TransferKind, solve_mixed_precision, solve_multigrid,
    };
}
