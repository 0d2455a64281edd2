//! Batch layouts and their validation.
//!
//! Two addressing schemes are accepted:
//! - strided: one buffer, matrix `i` starts at `i * stride`
//! - pointer: one independent buffer per matrix
//!
//! Both collapse to a `Vec<MatMut>` so the factorization code never sees the
//! difference.

use crate::error::{Error, Result};
use crate::matrix::MatMut;
use crate::scalar::Scalar;

/// An indexable batch of column-major matrices.
pub trait MatrixBatch<T: Scalar> {
    /// Leading dimension shared by all matrices.
    fn lda(&self) -> usize;

    /// Check dimensions and strides without reading any buffer.
    fn check_sizes(&self, m: usize, n: usize, batch_count: usize) -> Result<()>;

    /// Check that every addressed element of the first `batch_count` matrices exists.
    fn check_buffers(&self, m: usize, n: usize, batch_count: usize) -> Result<()>;

    /// One view per matrix. Callers must have passed both checks.
    fn views(&mut self, m: usize, n: usize, batch_count: usize) -> Vec<MatMut<'_, T>>;
}

/// Single buffer holding `batch_count` matrices at a fixed stride.
#[derive(Debug)]
pub struct StridedBatch<'a, T> {
    data: &'a mut [T],
    lda: usize,
    stride: usize,
}

impl<'a, T> StridedBatch<'a, T> {
    /// Create a strided batch descriptor.
    pub fn new(data: &'a mut [T], lda: usize, stride: usize) -> Self {
        Self { data, lda, stride }
    }

    /// Distance in elements between consecutive matrices.
    pub fn stride(&self) -> usize {
        self.stride
    }
}

impl<T: Scalar> MatrixBatch<T> for StridedBatch<'_, T> {
    fn lda(&self) -> usize {
        self.lda
    }

    fn check_sizes(&self, m: usize, n: usize, batch_count: usize) -> Result<()> {
        check_dims(m, n)?;
        check_lda(m, self.lda)?;
        if batch_count > 1 {
            let extent = checked_mul(self.lda, n)?;
            if self.stride < extent {
                return Err(Error::InvalidSize(format!(
                    "stride {} is smaller than lda * n = {}",
                    self.stride, extent
                )));
            }
        }
        Ok(())
    }

    fn check_buffers(&self, m: usize, n: usize, batch_count: usize) -> Result<()> {
        let needed = strided_extent(
            self.stride,
            batch_count,
            MatMut::<T>::required_len(m, n, self.lda),
        )?;
        if self.data.len() < needed {
            return Err(Error::InvalidPointer(format!(
                "matrix buffer holds {} elements, {} required",
                self.data.len(),
                needed
            )));
        }
        Ok(())
    }

    fn views(&mut self, m: usize, n: usize, batch_count: usize) -> Vec<MatMut<'_, T>> {
        let len = MatMut::<T>::required_len(m, n, self.lda);
        let lda = self.lda;
        strided_chunks_mut(self.data, self.stride, batch_count, len)
            .into_iter()
            .map(|chunk| MatMut::new(chunk, m, n, lda))
            .collect()
    }
}

/// Array of independent per-matrix buffers.
#[derive(Debug)]
pub struct PointerBatch<'a, 'b, T> {
    matrices: &'a mut [&'b mut [T]],
    lda: usize,
}

impl<'a, 'b, T> PointerBatch<'a, 'b, T> {
    /// Create a pointer-array batch descriptor.
    pub fn new(matrices: &'a mut [&'b mut [T]], lda: usize) -> Self {
        Self { matrices, lda }
    }
}

impl<T: Scalar> MatrixBatch<T> for PointerBatch<'_, '_, T> {
    fn lda(&self) -> usize {
        self.lda
    }

    fn check_sizes(&self, m: usize, n: usize, _batch_count: usize) -> Result<()> {
        check_dims(m, n)?;
        check_lda(m, self.lda)
    }

    fn check_buffers(&self, m: usize, n: usize, batch_count: usize) -> Result<()> {
        if self.matrices.len() < batch_count {
            return Err(Error::InvalidPointer(format!(
                "pointer array holds {} matrices, batch_count is {}",
                self.matrices.len(),
                batch_count
            )));
        }
        let needed = MatMut::<T>::required_len(m, n, self.lda);
        if let Some((i, a)) = self.matrices[..batch_count]
            .iter()
            .enumerate()
            .find(|(_, a)| a.len() < needed)
        {
            return Err(Error::InvalidPointer(format!(
                "matrix {} holds {} elements, {} required",
                i,
                a.len(),
                needed
            )));
        }
        Ok(())
    }

    fn views(&mut self, m: usize, n: usize, batch_count: usize) -> Vec<MatMut<'_, T>> {
        let lda = self.lda;
        self.matrices[..batch_count]
            .iter_mut()
            .map(|a| MatMut::new(&mut a[..], m, n, lda))
            .collect()
    }
}

/// Strided buffer of per-matrix pivot records (1-based row indices).
#[derive(Debug)]
pub struct PivotBuffer<'a> {
    data: &'a mut [i32],
    stride: usize,
}

impl<'a> PivotBuffer<'a> {
    /// Create a pivot buffer descriptor.
    pub fn new(data: &'a mut [i32], stride: usize) -> Self {
        Self { data, stride }
    }

    /// Check the stride against the record length `min(m, n)`.
    pub fn check_sizes(&self, m: usize, n: usize, batch_count: usize) -> Result<()> {
        let k = m.min(n);
        if batch_count > 1 && self.stride < k {
            return Err(Error::InvalidSize(format!(
                "pivot stride {} is smaller than min(m, n) = {}",
                self.stride, k
            )));
        }
        Ok(())
    }

    /// Check that every record fits in the buffer.
    pub fn check_buffers(&self, m: usize, n: usize, batch_count: usize) -> Result<()> {
        let needed = strided_extent(self.stride, batch_count, m.min(n))?;
        if self.data.len() < needed {
            return Err(Error::InvalidPointer(format!(
                "pivot buffer holds {} entries, {} required",
                self.data.len(),
                needed
            )));
        }
        Ok(())
    }

    /// One record of length `min(m, n)` per matrix.
    pub fn records(&mut self, m: usize, n: usize, batch_count: usize) -> Vec<&mut [i32]> {
        strided_chunks_mut(self.data, self.stride, batch_count, m.min(n))
    }
}

/// Check that the per-matrix status buffer covers the batch.
pub fn check_info(info: &[i32], batch_count: usize) -> Result<()> {
    if info.len() < batch_count {
        return Err(Error::InvalidPointer(format!(
            "info buffer holds {} entries, batch_count is {}",
            info.len(),
            batch_count
        )));
    }
    Ok(())
}

/// Pivots and status values are `i32` row and column numbers.
fn check_dims(m: usize, n: usize) -> Result<()> {
    let limit = i32::MAX as usize;
    if m > limit || n > limit {
        return Err(Error::InvalidSize(format!(
            "{}x{} exceeds the largest indexable dimension {}",
            m, n, limit
        )));
    }
    Ok(())
}

fn check_lda(m: usize, lda: usize) -> Result<()> {
    if lda < m.max(1) {
        return Err(Error::InvalidSize(format!(
            "lda {} is smaller than max(1, m) = {}",
            lda,
            m.max(1)
        )));
    }
    Ok(())
}

fn checked_mul(a: usize, b: usize) -> Result<usize> {
    a.checked_mul(b)
        .ok_or_else(|| Error::InvalidSize(format!("{} * {} overflows", a, b)))
}

/// Elements spanned by `count` records of `len` elements placed `stride` apart.
fn strided_extent(stride: usize, count: usize, len: usize) -> Result<usize> {
    if count == 0 || len == 0 {
        return Ok(0);
    }
    checked_mul(stride, count - 1)?
        .checked_add(len)
        .ok_or_else(|| Error::InvalidSize("strided extent overflows".into()))
}

fn strided_chunks_mut<T>(
    data: &mut [T],
    stride: usize,
    count: usize,
    len: usize,
) -> Vec<&mut [T]> {
    let mut out = Vec::with_capacity(count);
    let mut rest = data;
    for i in 0..count {
        let (head, tail) = std::mem::take(&mut rest).split_at_mut(if i + 1 == count {
            len
        } else {
            stride
        });
        out.push(&mut head[..len]);
        rest = tail;
    }
    out
}
