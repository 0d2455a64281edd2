//! Core types for batched LU factorization.
//!
//! This crate holds everything the factorization algorithm and its backends
//! share:
//! - [`Scalar`] over the four LAPACK precisions
//! - [`MatMut`] views and [`Block`] descriptors
//! - strided and pointer-array batch layouts
//! - workspace planning and the caller-owned scratch arena
//! - the [`Level3Backend`] seam and the compute [`Handle`]

pub mod backend;
pub mod batch;
pub mod config;
pub mod error;
pub mod handle;
pub mod matrix;
pub mod scalar;
pub mod workspace;

pub use backend::{BackendType, Level3Backend};
pub use batch::{MatrixBatch, PivotBuffer, PointerBatch, StridedBatch, check_info};
pub use config::{FactorConfig, MemoryMode};
pub use error::{Error, Result};
pub use handle::Handle;
pub use matrix::{Block, MatMut};
pub use scalar::Scalar;
pub use workspace::{
    Algorithm, BUFFER_ALIGNMENT, Split, Workspace, WorkspacePlanner, WorkspaceSizes,
    WorkspaceView, split,
};
