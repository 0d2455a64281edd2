//! Blocked LU entry points.
//!
//! All four factor `batch_count` matrices of shape `m x n` in place, leaving
//! `L` (unit diagonal implied) below the diagonal and `U` on and above it.
//! `ipiv` receives `min(m, n)` 1-based pivot rows per matrix at `stride_p`
//! apart, and `info[i]` the 1-based column of the first zero pivot of matrix
//! `i` (0 when there is none).

use crate::executor::{BatchExecutor, Problem};
use lubatch_core::{
    Algorithm, Handle, Level3Backend, PivotBuffer, PointerBatch, Result, Scalar, StridedBatch,
};

/// LU with partial pivoting of a pointer-array batch.
#[allow(clippy::too_many_arguments)]
pub fn getrf_batched<T: Scalar, B: Level3Backend>(
    handle: &mut Handle<B>,
    m: usize,
    n: usize,
    a: &mut [&mut [T]],
    lda: usize,
    ipiv: &mut [i32],
    stride_p: usize,
    info: &mut [i32],
    batch_count: usize,
) -> Result<()> {
    let mut batch = PointerBatch::new(a, lda);
    let mut pivots = PivotBuffer::new(ipiv, stride_p);
    BatchExecutor::new(handle).run::<T, _>(
        Problem::new(m, n, batch_count, Algorithm::Blocked),
        &mut batch,
        Some(&mut pivots),
        info,
    )
}

/// LU with partial pivoting of a strided batch.
#[allow(clippy::too_many_arguments)]
pub fn getrf_strided_batched<T: Scalar, B: Level3Backend>(
    handle: &mut Handle<B>,
    m: usize,
    n: usize,
    a: &mut [T],
    lda: usize,
    stride_a: usize,
    ipiv: &mut [i32],
    stride_p: usize,
    info: &mut [i32],
    batch_count: usize,
) -> Result<()> {
    let mut batch = StridedBatch::new(a, lda, stride_a);
    let mut pivots = PivotBuffer::new(ipiv, stride_p);
    BatchExecutor::new(handle).run::<T, _>(
        Problem::new(m, n, batch_count, Algorithm::Blocked),
        &mut batch,
        Some(&mut pivots),
        info,
    )
}

/// LU without pivoting of a pointer-array batch.
///
/// No row search is done, so small pivots are divided by as they come.
pub fn getrf_npvt_batched<T: Scalar, B: Level3Backend>(
    handle: &mut Handle<B>,
    m: usize,
    n: usize,
    a: &mut [&mut [T]],
    lda: usize,
    info: &mut [i32],
    batch_count: usize,
) -> Result<()> {
    let mut batch = PointerBatch::new(a, lda);
    BatchExecutor::new(handle).run::<T, _>(
        Problem::new(m, n, batch_count, Algorithm::Blocked),
        &mut batch,
        None,
        info,
    )
}

/// LU without pivoting of a strided batch.
#[allow(clippy::too_many_arguments)]
pub fn getrf_npvt_strided_batched<T: Scalar, B: Level3Backend>(
    handle: &mut Handle<B>,
    m: usize,
    n: usize,
    a: &mut [T],
    lda: usize,
    stride_a: usize,
    info: &mut [i32],
    batch_count: usize,
) -> Result<()> {
    let mut batch = StridedBatch::new(a, lda, stride_a);
    BatchExecutor::new(handle).run::<T, _>(
        Problem::new(m, n, batch_count, Algorithm::Blocked),
        &mut batch,
        None,
        info,
    )
}
