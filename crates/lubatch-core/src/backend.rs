//! The Level-3 compute seam.
//!
//! The factorization issues two kinds of dense block operations on every
//! matrix of the batch at once: a unit-lower triangular solve (TRSM) and a
//! matrix multiply-accumulate (GEMM). Implementations decide how the batch is
//! scheduled; the callers only guarantee the blocks lie inside each matrix and
//! that the blocks of one call do not overlap.

use crate::error::Result;
use crate::matrix::{Block, MatMut};
use crate::scalar::Scalar;

/// Type of Level-3 backend being used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendType {
    /// Host threads.
    Cpu,
    /// Anything provided outside this workspace.
    External,
}

impl std::fmt::Display for BackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendType::Cpu => write!(f, "CPU"),
            BackendType::External => write!(f, "external"),
        }
    }
}

/// Batched dense block operations used by the blocked factorization.
pub trait Level3Backend: Send + Sync {
    /// Get the backend type.
    fn backend_type(&self) -> BackendType;

    /// Whether the backend can accept work. Handles over an unavailable
    /// backend reject every call.
    fn is_available(&self) -> bool {
        true
    }

    /// Minimum matrices per parallel task, taken from the handle's
    /// [`FactorConfig`](crate::FactorConfig). Backends without a host thread
    /// pool ignore it.
    fn set_min_items_per_task(&mut self, _items: usize) {}

    /// `B := alpha * inv(L) * B` on every matrix, where `L` is the unit lower
    /// triangle of block `tri` (square) and `B` is block `rhs` (same rows).
    ///
    /// `scratch` holds packed copies of `L`; its length is a multiple of
    /// `tri.len()` and bounds how many matrices are processed per pass.
    fn trsm_lower_unit<T: Scalar>(
        &self,
        mats: &mut [MatMut<'_, T>],
        tri: Block,
        rhs: Block,
        alpha: T,
        scratch: &mut [T],
    ) -> Result<()>;

    /// `C := alpha * A * B + beta * C` on every matrix, with `A`, `B`, `C`
    /// given as blocks of the same matrix.
    ///
    /// `scratch_a` and `scratch_b` hold packed copies of `A` and `B`.
    #[allow(clippy::too_many_arguments)]
    fn gemm<T: Scalar>(
        &self,
        mats: &mut [MatMut<'_, T>],
        a: Block,
        b: Block,
        c: Block,
        alpha: T,
        beta: T,
        scratch_a: &mut [T],
        scratch_b: &mut [T],
    ) -> Result<()>;
}
