//! Unblocked LU entry points.
//!
//! Same contract as the blocked family, but the whole matrix goes through the
//! column-at-a-time panel code and no Level-3 scratch is planned.

use crate::executor::{BatchExecutor, Problem};
use lubatch_core::{
    Algorithm, Handle, Level3Backend, PivotBuffer, PointerBatch, Result, Scalar, StridedBatch,
};

#[allow(clippy::too_many_arguments)]
pub fn getf2_batched<T: Scalar, B: Level3Backend>(
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
        Problem::new(m, n, batch_count, Algorithm::Unblocked),
        &mut batch,
        Some(&mut pivots),
        info,
    )
}

#[allow(clippy::too_many_arguments)]
pub fn getf2_strided_batched<T: Scalar, B: Level3Backend>(
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
        Problem::new(m, n, batch_count, Algorithm::Unblocked),
        &mut batch,
        Some(&mut pivots),
        info,
    )
}

pub fn getf2_npvt_batched<T: Scalar, B: Level3Backend>(
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
        Problem::new(m, n, batch_count, Algorithm::Unblocked),
        &mut batch,
        None,
        info,
    )
}

#[allow(clippy::too_many_arguments)]
pub fn getf2_npvt_strided_batched<T: Scalar, B: Level3Backend>(
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
        Problem::new(m, n, batch_count, Algorithm::Unblocked),
        &mut batch,
        None,
        info,
    )
}
