//! Row-permutation records and per-matrix singularity status.
//!
//! Pivots are stored as 1-based absolute row numbers: entry `j` of a record
//! says row `j` was exchanged with row `ipiv[j]` at step `j`, whatever
//! recursion depth produced it.

use lubatch_core::{MatMut, Scalar};
use rayon::prelude::*;
use std::ops::Range;

/// Records and replays row exchanges and merges singularity indices.
#[derive(Debug, Clone, Copy)]
pub struct PivotTracker {
    min_items_per_task: usize,
}

impl PivotTracker {
    pub fn new(min_items_per_task: usize) -> Self {
        Self {
            min_items_per_task: min_items_per_task.max(1),
        }
    }

    /// Store the 0-based pivot `row` chosen at step `step`.
    #[inline]
    pub fn record(ipiv: &mut [i32], step: usize, row: usize) {
        ipiv[step] = row as i32 + 1;
    }

    /// 0-based pivot row recorded at `step`.
    #[inline]
    pub fn pivot_row(ipiv: &[i32], step: usize) -> usize {
        (ipiv[step] - 1) as usize
    }

    /// Replay the exchanges of `steps`, in order, on columns `cols` of every matrix.
    pub fn apply_row_exchanges<T: Scalar>(
        &self,
        mats: &mut [MatMut<'_, T>],
        ipiv: &[&mut [i32]],
        steps: Range<usize>,
        cols: Range<usize>,
    ) {
        if steps.is_empty() || cols.is_empty() {
            return;
        }
        log::trace!(
            "Row exchanges {:?} on columns {:?} of {} matrices",
            steps,
            cols,
            mats.len()
        );
        mats.par_iter_mut()
            .zip(ipiv.par_iter())
            .with_min_len(self.min_items_per_task)
            .for_each(|(a, p)| {
                for step in steps.clone() {
                    a.swap_rows(step, Self::pivot_row(p, step), cols.clone());
                }
            });
    }

    /// Fold per-panel status into the final status, keeping the smallest
    /// nonzero index per matrix.
    pub fn merge_singularity(info: &mut [i32], iinfo: &[i32]) {
        for (dst, &src) in info.iter_mut().zip(iinfo) {
            if src != 0 && (*dst == 0 || src < *dst) {
                *dst = src;
            }
        }
    }
}

impl Default for PivotTracker {
    fn default() -> Self {
        Self::new(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_is_one_based() {
        let mut ipiv = [0; 3];
        PivotTracker::record(&mut ipiv, 1, 2);
        assert_eq!(ipiv, [0, 3, 0]);
        assert_eq!(PivotTracker::pivot_row(&ipiv, 1), 2);
    }

    #[test]
    fn test_exchanges_replay_in_order() {
        // 3x1 column [a, b, c]; step 0 swaps rows 0 and 2, step 1 swaps rows 1 and 2.
        let mut data = vec![1.0, 2.0, 3.0];
        let mut p = vec![3, 3];
        {
            let mut mats = vec![MatMut::new(&mut data, 3, 1, 3)];
            let ipiv = vec![p.as_mut_slice()];
            PivotTracker::default().apply_row_exchanges(&mut mats, &ipiv, 0..2, 0..1);
        }
        assert_eq!(data, vec![3.0, 1.0, 2.0]);
    }

    #[test]
    fn test_exchanges_limited_to_columns() {
        let mut data = vec![1.0, 2.0, 10.0, 20.0];
        let mut p = vec![2];
        {
            let mut mats = vec![MatMut::new(&mut data, 2, 2, 2)];
            let ipiv = vec![p.as_mut_slice()];
            PivotTracker::default().apply_row_exchanges(&mut mats, &ipiv, 0..1, 1..2);
        }
        assert_eq!(data, vec![1.0, 2.0, 20.0, 10.0]);
    }

    #[test]
    fn test_merge_keeps_first_failure() {
        let mut info = vec![0, 3, 5, 0];
        PivotTracker::merge_singularity(&mut info, &[2, 4, 1, 0]);
        assert_eq!(info, vec![2, 3, 1, 0]);
    }
}
