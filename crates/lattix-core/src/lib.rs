//! Core data structures for Lattix.
//!
//! This crate provides the element types, grid level sizes, boundary masks,
//! matrix storage formats, the Poisson model problem and the persisted
//! matrix/vector formats the multigrid solver is built on. Vectors and
//! matrix storage live in arbiter-registered [`lattix_memory::DeviceVector`]s.

pub mod boundary;
pub mod element;
pub mod error;
pub mod grid;
pub mod io;
pub mod matrix;
pub mod poisson;

pub use boundary::{BorderMask, BorderPart, DIRICHLET, NATURAL};
pub use element::{Element, ElementKind, convert};
pub use error::{Error, Result, check_len};
pub use grid::{GridKind, MAX_LEVEL};
pub use matrix::{
    Band, BandedQ1Matrix, EllMatrix, MatrixFormat, MatrixLock, MatrixView, SparseMatrix,
    SystemMatrix,
};
pub use poisson::Stencil;

pub use lattix_memory::{DeviceVector, MemoryArbiter, MemoryTag};
