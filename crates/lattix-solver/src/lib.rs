//! Multigrid solvers for Lattix.
//!
//! This crate provides:
//! - The [`NumericBackend`] interface every compute backend implements
//! - Grid transfer between levels (stencil or matrix based)
//! - Damped Jacobi smoothing and a conjugate gradient coarse solver
//! - The multigrid V-cycle over an [`MgInfo`] level hierarchy
//! - Mixed-precision defect correction around a low-precision hierarchy

pub mod backend;
pub mod cancel;
pub mod cg;
pub mod error;
pub mod hierarchy;
pub mod jacobi;
pub mod kernels;
pub mod mixed;
pub mod multigrid;
pub mod operator;
pub mod scalar;
pub mod transfer;

pub use backend::ComputeBackend;
pub use cancel::CancellationToken;
pub use cg::{CgConfig, CgResult, CgWorkspace, solve_cg, solve_cg_in};
pub use error::{Error, Result};
pub use hierarchy::{MgConfig, MgInfo, MgInfoBuilder};
pub use jacobi::{JacobiSystem, damped_inverse_diagonal, jacobi, jacobi_from_zero};
pub use mixed::{MixedPrecisionConfig, MixedPrecisionResult, solve_mixed_precision};
pub use multigrid::{MultigridResult, SolveStatus, solve_multigrid};
pub use operator::NumericBackend;
pub use scalar::ScalarBackend;
pub use transfer::TransferKind;
