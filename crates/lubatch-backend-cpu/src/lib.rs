//! Host backend for the Level-3 operations of the blocked factorization.
//!
//! Every operation packs its read-only operands into the caller's scratch
//! before touching the output block, so operand and output blocks may come
//! from the same matrix. The batch is processed in chunks of as many matrices
//! as the scratch holds, and each chunk is spread over the rayon pool. The
//! per-matrix kernels are faer's triangular solve and matrix multiply, run
//! sequentially inside each task.

use faer::linalg::matmul::matmul;
use faer::linalg::triangular_solve::solve_unit_lower_triangular_in_place;
use faer::{Accum, Par};
use lubatch_core::{BackendType, Block, Error, Level3Backend, MatMut, Result, Scalar};
use rayon::prelude::*;

/// Reference implementation of [`Level3Backend`] on host threads.
#[derive(Debug, Clone)]
pub struct HostBackend {
    min_items_per_task: usize,
}

impl Default for HostBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl HostBackend {
    /// Create a host backend using the global rayon pool.
    pub fn new() -> Self {
        log::info!(
            "Host Level-3 backend on {} threads",
            rayon::current_num_threads()
        );
        Self {
            min_items_per_task: 1,
        }
    }

    /// Set the minimum number of matrices handed to one rayon task.
    ///
    /// A [`Handle`](lubatch_core::Handle) overrides this with its
    /// configuration's `min_items_per_task`.
    pub fn with_min_items_per_task(mut self, items: usize) -> Self {
        self.min_items_per_task = items.max(1);
        self
    }

    pub fn min_items_per_task(&self) -> usize {
        self.min_items_per_task
    }

    /// Matrices per pass given `available` scratch elements and `per_item` elements each.
    fn chunk_len(available: usize, per_item: usize, batch: usize, op: &str) -> Result<usize> {
        let chunk = available / per_item;
        if chunk == 0 {
            return Err(Error::Backend(format!(
                "{} scratch holds {} elements, one matrix needs {}",
                op, available, per_item
            )));
        }
        Ok(chunk.min(batch))
    }
}

impl Level3Backend for HostBackend {
    fn backend_type(&self) -> BackendType {
        BackendType::Cpu
    }

    fn set_min_items_per_task(&mut self, items: usize) {
        self.min_items_per_task = items.max(1);
    }

    fn trsm_lower_unit<T: Scalar>(
        &self,
        mats: &mut [MatMut<'_, T>],
        tri: Block,
        rhs: Block,
        alpha: T,
        scratch: &mut [T],
    ) -> Result<()> {
        if mats.is_empty() || tri.is_empty() || rhs.is_empty() {
            return Ok(());
        }
        if tri.nrows != tri.ncols || rhs.row != tri.row || rhs.nrows != tri.nrows {
            return Err(Error::Backend(format!(
                "TRSM blocks do not conform: tri {:?}, rhs {:?}",
                tri, rhs
            )));
        }

        let per_item = tri.len();
        let chunk = Self::chunk_len(scratch.len(), per_item, mats.len(), "TRSM")?;
        log::trace!(
            "TRSM {}x{} on {} matrices, {} per pass",
            rhs.nrows,
            rhs.ncols,
            mats.len(),
            chunk
        );

        for group in mats.chunks_mut(chunk) {
            scratch[..group.len() * per_item]
                .par_chunks_mut(per_item)
                .zip(group.par_iter_mut())
                .with_min_len(self.min_items_per_task)
                .for_each(|(l, a)| {
                    a.pack_block(tri, l);
                    scale_block(a, rhs, alpha);
                    let k = tri.nrows;
                    let ld = a.ld();
                    let lower = faer::MatRef::from_column_major_slice(&*l, k, k);
                    let x = faer::MatMut::from_column_major_slice_with_stride_mut(
                        a.block_slice_mut(rhs),
                        rhs.nrows,
                        rhs.ncols,
                        ld,
                    );
                    solve_unit_lower_triangular_in_place(lower, x, Par::Seq);
                });
        }
        Ok(())
    }

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
    ) -> Result<()> {
        if mats.is_empty() || c.is_empty() {
            return Ok(());
        }
        if a.nrows != c.nrows || b.ncols != c.ncols || a.ncols != b.nrows {
            return Err(Error::Backend(format!(
                "GEMM blocks do not conform: a {:?}, b {:?}, c {:?}",
                a, b, c
            )));
        }

        // Empty inner dimension: only the beta scaling remains.
        if a.ncols == 0 {
            mats.par_iter_mut()
                .with_min_len(self.min_items_per_task)
                .for_each(|m| scale_block(m, c, beta));
            return Ok(());
        }

        let (per_a, per_b) = (a.len(), b.len());
        let chunk = Self::chunk_len(scratch_a.len(), per_a, mats.len(), "GEMM lhs")?
            .min(Self::chunk_len(scratch_b.len(), per_b, mats.len(), "GEMM rhs")?);
        log::trace!(
            "GEMM {}x{}x{} on {} matrices, {} per pass",
            c.nrows,
            c.ncols,
            a.ncols,
            mats.len(),
            chunk
        );

        // faer accumulates into or overwrites C; any other beta is applied first.
        let replace = beta == T::zero();

        for group in mats.chunks_mut(chunk) {
            let n = group.len();
            scratch_a[..n * per_a]
                .par_chunks_mut(per_a)
                .zip(scratch_b[..n * per_b].par_chunks_mut(per_b))
                .zip(group.par_iter_mut())
                .with_min_len(self.min_items_per_task)
                .for_each(|((pa, pb), m)| {
                    m.pack_block(a, pa);
                    m.pack_block(b, pb);
                    let accum = if replace {
                        Accum::Replace
                    } else {
                        scale_block(m, c, beta);
                        Accum::Add
                    };
                    let ld = m.ld();
                    let lhs = faer::MatRef::from_column_major_slice(&*pa, a.nrows, a.ncols);
                    let rhs = faer::MatRef::from_column_major_slice(&*pb, b.nrows, b.ncols);
                    let dst = faer::MatMut::from_column_major_slice_with_stride_mut(
                        m.block_slice_mut(c),
                        c.nrows,
                        c.ncols,
                        ld,
                    );
                    matmul(dst, accum, lhs, rhs, alpha, Par::Seq);
                });
        }
        Ok(())
    }
}

/// `C := beta * C` over a block; `beta == 0` clears it without reading.
fn scale_block<T: Scalar>(m: &mut MatMut<'_, T>, c: Block, beta: T) {
    if beta == T::one() {
        return;
    }
    for j in c.cols() {
        let col = m.col_segment_mut(j, c.rows());
        if beta == T::zero() {
            col.fill(T::zero());
        } else {
            col.iter_mut().for_each(|v| *v *= beta);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lubatch_core::{FactorConfig, Handle};
    use num_complex::Complex64;

    fn sample_3x3() -> Vec<f64> {
        // [[1, 2, 3], [4, 5, 6], [7, 8, 9]] in column-major order
        vec![1.0, 4.0, 7.0, 2.0, 5.0, 8.0, 3.0, 6.0, 9.0]
    }

    #[test]
    fn test_trsm_forward_substitution() {
        // L = [[1, 0], [2, 1]] in columns 0..2, B = [3, 8] in column 2.
        let mut data = vec![1.0, 2.0, 0.0, 1.0, 3.0, 8.0];
        let mut mats = vec![MatMut::new(&mut data, 2, 3, 2)];
        let mut scratch = vec![0.0; 4];
        HostBackend::new()
            .trsm_lower_unit(
                &mut mats,
                Block::new(0, 0, 2, 2),
                Block::new(0, 2, 2, 1),
                1.0,
                &mut scratch,
            )
            .unwrap();
        assert_eq!(&data[4..], &[3.0, 2.0]);
    }

    #[test]
    fn test_trsm_ignores_upper_triangle() {
        // The stored upper entry (5) belongs to U and must not be read.
        let mut data = vec![1.0, 2.0, 5.0, 1.0, 3.0, 8.0];
        let mut mats = vec![MatMut::new(&mut data, 2, 3, 2)];
        let mut scratch = vec![0.0; 4];
        HostBackend::new()
            .trsm_lower_unit(
                &mut mats,
                Block::new(0, 0, 2, 2),
                Block::new(0, 2, 2, 1),
                1.0,
                &mut scratch,
            )
            .unwrap();
        assert_eq!(&data[4..], &[3.0, 2.0]);
    }

    #[test]
    fn test_gemm_schur_complement() {
        let mut data = sample_3x3();
        let mut mats = vec![MatMut::new(&mut data, 3, 3, 3)];
        let (mut sa, mut sb) = (vec![0.0; 2], vec![0.0; 2]);
        HostBackend::new()
            .gemm(
                &mut mats,
                Block::new(1, 0, 2, 1),
                Block::new(0, 1, 1, 2),
                Block::new(1, 1, 2, 2),
                -1.0,
                1.0,
                &mut sa,
                &mut sb,
            )
            .unwrap();
        assert_eq!(data, vec![1.0, 4.0, 7.0, 2.0, -3.0, -6.0, 3.0, -6.0, -12.0]);
    }

    #[test]
    fn test_gemm_small_scratch_processes_in_chunks() {
        let mut batch: Vec<Vec<f64>> = (0..5)
            .map(|i| sample_3x3().into_iter().map(|v| v + i as f64).collect())
            .collect();
        let expected: Vec<Vec<f64>> = batch
            .iter()
            .map(|d| {
                let mut out = d.clone();
                for j in 1..3 {
                    for i in 1..3 {
                        out[i + 3 * j] = d[i + 3 * j] - d[i] * d[3 * j];
                    }
                }
                out
            })
            .collect();

        let mut mats: Vec<_> = batch
            .iter_mut()
            .map(|d| MatMut::new(d.as_mut_slice(), 3, 3, 3))
            .collect();
        // Room for two matrices per pass.
        let (mut sa, mut sb) = (vec![0.0; 4], vec![0.0; 4]);
        HostBackend::new()
            .with_min_items_per_task(2)
            .gemm(
                &mut mats,
                Block::new(1, 0, 2, 1),
                Block::new(0, 1, 1, 2),
                Block::new(1, 1, 2, 2),
                -1.0,
                1.0,
                &mut sa,
                &mut sb,
            )
            .unwrap();
        drop(mats);
        assert_eq!(batch, expected);
    }

    #[test]
    fn test_complex_trsm() {
        let i = Complex64::new(0.0, 1.0);
        let one = Complex64::new(1.0, 0.0);
        // L = [[1, 0], [i, 1]], B = [1, 0] -> x = [1, -i]
        let mut data = vec![one, i, Complex64::new(0.0, 0.0), one, one, Complex64::new(0.0, 0.0)];
        let mut mats = vec![MatMut::new(&mut data, 2, 3, 2)];
        let mut scratch = vec![Complex64::new(0.0, 0.0); 4];
        HostBackend::new()
            .trsm_lower_unit(
                &mut mats,
                Block::new(0, 0, 2, 2),
                Block::new(0, 2, 2, 1),
                one,
                &mut scratch,
            )
            .unwrap();
        assert_eq!(data[4], one);
        assert_eq!(data[5], -i);
    }

    #[test]
    fn test_insufficient_scratch_is_backend_error() {
        let mut data = sample_3x3();
        let mut mats = vec![MatMut::new(&mut data, 3, 3, 3)];
        let mut scratch = vec![0.0; 3];
        let result = HostBackend::new().trsm_lower_unit(
            &mut mats,
            Block::new(0, 0, 2, 2),
            Block::new(0, 2, 2, 1),
            1.0,
            &mut scratch,
        );
        assert!(matches!(result, Err(Error::Backend(_))));
    }

    #[test]
    fn test_empty_blocks_are_noops() {
        let mut data = sample_3x3();
        let mut mats = vec![MatMut::new(&mut data, 3, 3, 3)];
        let backend = HostBackend::new();
        backend
            .trsm_lower_unit(
                &mut mats,
                Block::new(0, 0, 2, 2),
                Block::new(0, 2, 2, 0),
                1.0,
                &mut [],
            )
            .unwrap();
        backend
            .gemm(
                &mut mats,
                Block::new(3, 0, 0, 1),
                Block::new(0, 1, 1, 2),
                Block::new(3, 1, 0, 2),
                -1.0,
                1.0,
                &mut [],
                &mut [],
            )
            .unwrap();
        drop(mats);
        assert_eq!(data, sample_3x3());
    }

    #[test]
    fn test_gemm_beta_zero_overwrites() {
        let mut data = sample_3x3();
        let mut mats = vec![MatMut::new(&mut data, 3, 3, 3)];
        let (mut sa, mut sb) = (vec![0.0; 2], vec![0.0; 2]);
        HostBackend::new()
            .gemm(
                &mut mats,
                Block::new(1, 0, 2, 1),
                Block::new(0, 1, 1, 2),
                Block::new(1, 1, 2, 2),
                2.0,
                0.0,
                &mut sa,
                &mut sb,
            )
            .unwrap();
        // C = 2 * [4, 7]^T * [2, 3]
        assert_eq!(data, vec![1.0, 4.0, 7.0, 2.0, 16.0, 28.0, 3.0, 24.0, 42.0]);
    }

    #[test]
    fn test_handle_config_sets_task_granularity() {
        let config = FactorConfig::default().with_min_items_per_task(4);
        let mut handle = Handle::with_config(HostBackend::new(), config);
        assert_eq!(handle.backend().min_items_per_task(), 4);

        handle.set_config(FactorConfig::default().with_min_items_per_task(2));
        assert_eq!(handle.backend().min_items_per_task(), 2);
    }
}
