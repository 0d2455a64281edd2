//! Unblocked, column-at-a-time elimination of a panel.
//!
//! Every column goes through the same staged sequence on the whole batch:
//! pivot search, row exchange, singularity check, scaling and the rank-1
//! update. Each stage is one parallel pass over the batch, mirroring how a
//! device would launch one kernel per stage.

use crate::pivot::PivotTracker;
use lubatch_core::{Block, MatMut, Scalar};
use num_traits::Zero;
use rayon::prelude::*;

/// Per-matrix reduction scratch used by the panel stages.
pub struct PanelScratch<'w, T: Scalar> {
    /// Largest magnitude found by the pivot search.
    pub work: &'w mut [T::Magnitude],
    /// Pivot value, then its reciprocal.
    pub pivotval: &'w mut [T],
    /// Pivot row chosen by the search.
    pub pivotidx: &'w mut [i32],
    /// First zero pivot inside the current panel.
    pub iinfo: &'w mut [i32],
}

/// Factors a panel of every matrix in the batch without Level-3 calls.
#[derive(Debug, Clone, Copy)]
pub struct PanelFactorizer {
    min_items_per_task: usize,
}

impl PanelFactorizer {
    pub fn new(min_items_per_task: usize) -> Self {
        Self {
            min_items_per_task: min_items_per_task.max(1),
        }
    }

    /// Factor `panel` in place on every matrix.
    ///
    /// The panel must start on the diagonal (`panel.row == panel.col`) and
    /// extend to the last row. Row exchanges are applied to the panel's
    /// columns only; the caller replays them elsewhere. Singularities are
    /// merged into `info` as absolute 1-based column indices.
    pub fn factor<T: Scalar>(
        &self,
        mats: &mut [MatMut<'_, T>],
        mut ipiv: Option<&mut [&mut [i32]]>,
        panel: Block,
        scratch: &mut PanelScratch<'_, T>,
        info: &mut [i32],
    ) {
        debug_assert_eq!(panel.row, panel.col);
        let batch = mats.len();
        let min_len = self.min_items_per_task;
        let steps = panel.nrows.min(panel.ncols);
        let row_end = panel.row + panel.nrows;
        let col_end = panel.col + panel.ncols;

        log::trace!(
            "Panel {}x{} at {} on {} matrices (pivot={})",
            panel.nrows,
            panel.ncols,
            panel.row,
            batch,
            ipiv.is_some()
        );

        scratch.iinfo[..batch].fill(0);

        for j in panel.col..panel.col + steps {
            if let Some(ipiv) = ipiv.as_deref_mut() {
                // Pivot search: first row of largest magnitude wins.
                mats.par_iter()
                    .zip(scratch.work[..batch].par_iter_mut())
                    .zip(scratch.pivotidx[..batch].par_iter_mut())
                    .with_min_len(min_len)
                    .for_each(|((a, best), idx)| {
                        let (row, value) = iamax(a.col_segment(j, j..row_end));
                        *best = value;
                        *idx = (j + row) as i32;
                    });

                // Exchange rows across the panel and record the pivot.
                mats.par_iter_mut()
                    .zip(ipiv.par_iter_mut())
                    .zip(scratch.pivotidx[..batch].par_iter())
                    .with_min_len(min_len)
                    .for_each(|((a, p), &idx)| {
                        let pivot_row = idx as usize;
                        a.swap_rows(j, pivot_row, panel.cols());
                        PivotTracker::record(p, j, pivot_row);
                    });
            }

            // Singularity check and reciprocal of the pivot.
            mats.par_iter()
                .zip(scratch.pivotval[..batch].par_iter_mut())
                .zip(scratch.iinfo[..batch].par_iter_mut())
                .with_min_len(min_len)
                .for_each(|((a, val), status)| {
                    let pivot = a.get(j, j);
                    if pivot.is_zero() && *status == 0 {
                        *status = j as i32 + 1;
                    }
                    *val = pivot.pivot_reciprocal();
                });

            // Scale the multipliers, then the rank-1 update of the trailing panel.
            mats.par_iter_mut()
                .zip(scratch.pivotval[..batch].par_iter())
                .with_min_len(min_len)
                .for_each(|(a, &inv)| {
                    if inv != T::one() {
                        a.col_segment_mut(j, j + 1..row_end)
                            .iter_mut()
                            .for_each(|v| *v *= inv);
                    }
                    rank1_update(a, j, row_end, col_end);
                });
        }

        PivotTracker::merge_singularity(info, &scratch.iinfo[..batch]);
    }
}

impl Default for PanelFactorizer {
    fn default() -> Self {
        Self::new(1)
    }
}

/// Offset and magnitude of the first entry of largest magnitude.
fn iamax<T: Scalar>(x: &[T]) -> (usize, T::Magnitude) {
    let mut best = (0, <T::Magnitude as Zero>::zero());
    for (i, v) in x.iter().enumerate() {
        let m = v.modulus();
        if m > best.1 {
            best = (i, m);
        }
    }
    best
}

/// `A[j+1.., j+1..] -= A[j+1.., j] * A[j, j+1..]` within the panel.
fn rank1_update<T: Scalar>(a: &mut MatMut<'_, T>, j: usize, row_end: usize, col_end: usize) {
    if j + 1 >= row_end {
        return;
    }
    for k in j + 1..col_end {
        let u = a.get(j, k);
        if u.is_zero() {
            continue;
        }
        for i in j + 1..row_end {
            let l = a.get(i, j);
            *a.get_mut(i, k) -= l * u;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_complex::Complex64;

    fn scratch_for<'w, T: Scalar>(
        work: &'w mut [T::Magnitude],
        pivotval: &'w mut [T],
        pivotidx: &'w mut [i32],
        iinfo: &'w mut [i32],
    ) -> PanelScratch<'w, T> {
        PanelScratch {
            work,
            pivotval,
            pivotidx,
            iinfo,
        }
    }

    #[test]
    fn test_iamax_first_occurrence_wins() {
        assert_eq!(iamax(&[1.0f64, -3.0, 3.0, 2.0]), (1, 3.0));
        assert_eq!(iamax(&[0.0f64, 0.0]), (0, 0.0));
    }

    #[test]
    fn test_iamax_uses_complex_modulus() {
        let x = [
            Complex64::new(2.0, 2.0),
            Complex64::new(0.0, 3.0),
            Complex64::new(-2.5, 0.0),
        ];
        assert_eq!(iamax(&x).0, 1);
    }

    #[test]
    fn test_panel_factor_3x3() {
        // [[0, 2, 1], [2, 4, 1], [0, 2, 3]] in column-major order
        let mut data = vec![0.0, 2.0, 0.0, 2.0, 4.0, 2.0, 1.0, 1.0, 3.0];
        let mut p = vec![0; 3];
        let mut info = vec![0];
        let (mut w, mut pv, mut pi, mut ii) = ([0.0f64], [0.0f64], [0i32], [0i32]);
        {
            let mut mats = vec![MatMut::new(&mut data, 3, 3, 3)];
            let mut ipiv = vec![p.as_mut_slice()];
            let mut scratch = scratch_for::<f64>(&mut w, &mut pv, &mut pi, &mut ii);
            PanelFactorizer::default().factor(
                &mut mats,
                Some(ipiv.as_mut_slice()),
                Block::new(0, 0, 3, 3),
                &mut scratch,
                &mut info,
            );
        }
        assert_eq!(p, vec![2, 2, 3]);
        assert_eq!(info, vec![0]);
        // U = [[2, 4, 1], [0, 2, 1], [0, 0, 2]], L = [[1], [0, 1], [0, 1, 1]]
        assert_eq!(data, vec![2.0, 0.0, 0.0, 4.0, 2.0, 1.0, 1.0, 1.0, 2.0]);
    }

    #[test]
    fn test_zero_matrix_is_flagged_not_scaled() {
        let mut data = vec![0.0f64; 4];
        let mut p = vec![0; 2];
        let mut info = vec![0];
        let (mut w, mut pv, mut pi, mut ii) = ([0.0f64], [0.0f64], [0i32], [0i32]);
        {
            let mut mats = vec![MatMut::new(&mut data, 2, 2, 2)];
            let mut ipiv = vec![p.as_mut_slice()];
            let mut scratch = scratch_for::<f64>(&mut w, &mut pv, &mut pi, &mut ii);
            PanelFactorizer::default().factor(
                &mut mats,
                Some(ipiv.as_mut_slice()),
                Block::new(0, 0, 2, 2),
                &mut scratch,
                &mut info,
            );
        }
        assert_eq!(p, vec![1, 2]);
        assert_eq!(info, vec![1]);
        assert!(data.iter().all(|v| *v == 0.0 && !v.is_nan()));
    }

    #[test]
    fn test_no_pivot_leaves_rows_in_place() {
        // [[4, 2], [2, 3]] -> L = [[1], [0.5, 1]], U = [[4, 2], [0, 2]]
        let mut data = vec![4.0, 2.0, 2.0, 3.0];
        let mut info = vec![0];
        let (mut w, mut pv, mut pi, mut ii) = ([0.0f64; 0], [0.0f64], [0i32; 0], [0i32]);
        {
            let mut mats = vec![MatMut::new(&mut data, 2, 2, 2)];
            let mut scratch = scratch_for::<f64>(&mut w, &mut pv, &mut pi, &mut ii);
            PanelFactorizer::default().factor(
                &mut mats,
                None,
                Block::new(0, 0, 2, 2),
                &mut scratch,
                &mut info,
            );
        }
        assert_eq!(data, vec![4.0, 0.5, 2.0, 2.0]);
        assert_eq!(info, vec![0]);
    }

    #[test]
    fn test_info_is_absolute_and_first_wins() {
        // Panel starting at (1, 1) of a 3x3 matrix whose trailing block is zero.
        let mut data = vec![1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0];
        let mut p = vec![1, 0, 0];
        let mut info = vec![0];
        let (mut w, mut pv, mut pi, mut ii) = ([0.0f64], [0.0f64], [0i32], [0i32]);
        {
            let mut mats = vec![MatMut::new(&mut data, 3, 3, 3)];
            let mut ipiv = vec![p.as_mut_slice()];
            let mut scratch = scratch_for::<f64>(&mut w, &mut pv, &mut pi, &mut ii);
            PanelFactorizer::default().factor(
                &mut mats,
                Some(ipiv.as_mut_slice()),
                Block::new(1, 1, 2, 2),
                &mut scratch,
                &mut info,
            );
        }
        assert_eq!(info, vec![2]);
        assert_eq!(p, vec![1, 2, 3]);
    }

    #[test]
    fn test_batch_items_are_independent() {
        // Item 0 needs a swap, item 1 does not, item 2 is singular.
        let mut a0 = vec![1.0, 3.0, 2.0, 4.0];
        let mut a1 = vec![5.0, 1.0, 1.0, 5.0];
        let mut a2 = vec![1.0, 1.0, 1.0, 1.0];
        let mut p = vec![0; 6];
        let mut info = vec![0; 3];
        let (mut w, mut pv, mut pi, mut ii) = ([0.0f64; 3], [0.0f64; 3], [0i32; 3], [0i32; 3]);
        {
            let mut mats = vec![
                MatMut::new(&mut a0, 2, 2, 2),
                MatMut::new(&mut a1, 2, 2, 2),
                MatMut::new(&mut a2, 2, 2, 2),
            ];
            let (p01, p2) = p.split_at_mut(4);
            let (p0, p1) = p01.split_at_mut(2);
            let mut ipiv = vec![p0, p1, p2];
            let mut scratch = scratch_for::<f64>(&mut w, &mut pv, &mut pi, &mut ii);
            PanelFactorizer::default().factor(
                &mut mats,
                Some(ipiv.as_mut_slice()),
                Block::new(0, 0, 2, 2),
                &mut scratch,
                &mut info,
            );
        }
        assert_eq!(p, vec![2, 2, 1, 2, 1, 2]);
        assert_eq!(info, vec![0, 0, 2]);
    }
}
