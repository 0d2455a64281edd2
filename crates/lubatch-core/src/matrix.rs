//! Column-major matrix views and block descriptors.

use std::ops::Range;

/// Rectangular region of a matrix, addressed by its top-left element.
///
/// The factorization works on every matrix of a batch at the same block, so
/// blocks are passed around instead of per-matrix sub-views.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block {
    /// First row (0-based).
    pub row: usize,
    /// First column (0-based).
    pub col: usize,
    /// Number of rows.
    pub nrows: usize,
    /// Number of columns.
    pub ncols: usize,
}

impl Block {
    /// Create a block.
    pub const fn new(row: usize, col: usize, nrows: usize, ncols: usize) -> Self {
        Self {
            row,
            col,
            nrows,
            ncols,
        }
    }

    /// True when the block holds no elements.
    pub fn is_empty(&self) -> bool {
        self.nrows == 0 || self.ncols == 0
    }

    /// Rows covered by the block.
    pub fn rows(&self) -> Range<usize> {
        self.row..self.row + self.nrows
    }

    /// Columns covered by the block.
    pub fn cols(&self) -> Range<usize> {
        self.col..self.col + self.ncols
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.nrows * self.ncols
    }
}

/// Mutable column-major view of one matrix of the batch.
#[derive(Debug)]
pub struct MatMut<'a, T> {
    data: &'a mut [T],
    nrows: usize,
    ncols: usize,
    ld: usize,
}

impl<'a, T: Copy> MatMut<'a, T> {
    /// Wrap a column-major buffer with leading dimension `ld`.
    ///
    /// The buffer must cover [`MatMut::required_len`] elements.
    pub fn new(data: &'a mut [T], nrows: usize, ncols: usize, ld: usize) -> Self {
        debug_assert!(ld >= nrows.max(1));
        debug_assert!(data.len() >= Self::required_len(nrows, ncols, ld));
        Self {
            data,
            nrows,
            ncols,
            ld,
        }
    }

    /// Elements needed to store an `nrows x ncols` matrix with leading dimension `ld`.
    pub fn required_len(nrows: usize, ncols: usize, ld: usize) -> usize {
        if nrows == 0 || ncols == 0 {
            0
        } else {
            (ncols - 1) * ld + nrows
        }
    }

    #[inline]
    pub fn nrows(&self) -> usize {
        self.nrows
    }

    #[inline]
    pub fn ncols(&self) -> usize {
        self.ncols
    }

    /// Leading dimension (distance between consecutive columns).
    #[inline]
    pub fn ld(&self) -> usize {
        self.ld
    }

    #[inline]
    pub fn get(&self, i: usize, j: usize) -> T {
        self.data[i + j * self.ld]
    }

    #[inline]
    pub fn set(&mut self, i: usize, j: usize, value: T) {
        self.data[i + j * self.ld] = value;
    }

    #[inline]
    pub fn get_mut(&mut self, i: usize, j: usize) -> &mut T {
        &mut self.data[i + j * self.ld]
    }

    /// Rows `rows` of column `j`.
    #[inline]
    pub fn col_segment(&self, j: usize, rows: Range<usize>) -> &[T] {
        let base = j * self.ld;
        &self.data[base + rows.start..base + rows.end]
    }

    /// Rows `rows` of column `j`, mutably.
    #[inline]
    pub fn col_segment_mut(&mut self, j: usize, rows: Range<usize>) -> &mut [T] {
        let base = j * self.ld;
        &mut self.data[base + rows.start..base + rows.end]
    }

    /// Elements spanned by `block`, starting at its top-left entry.
    ///
    /// Columns stay `ld` apart, so the slice is a column-major view of the
    /// block with leading dimension [`MatMut::ld`].
    pub fn block_slice_mut(&mut self, block: Block) -> &mut [T] {
        let start = block.row + block.col * self.ld;
        let len = Self::required_len(block.nrows, block.ncols, self.ld);
        &mut self.data[start..start + len]
    }

    /// Exchange rows `r1` and `r2` over the given columns.
    pub fn swap_rows(&mut self, r1: usize, r2: usize, cols: Range<usize>) {
        if r1 == r2 {
            return;
        }
        for j in cols {
            let base = j * self.ld;
            self.data.swap(base + r1, base + r2);
        }
    }

    /// Copy a block into `dst` in packed column-major order (leading dimension `block.nrows`).
    pub fn pack_block(&self, block: Block, dst: &mut [T]) {
        debug_assert!(dst.len() >= block.len());
        for (c, j) in block.cols().enumerate() {
            let src = self.col_segment(j, block.rows());
            dst[c * block.nrows..(c + 1) * block.nrows].copy_from_slice(src);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_len_accounts_for_short_last_column() {
        assert_eq!(MatMut::<f64>::required_len(3, 2, 5), 8);
        assert_eq!(MatMut::<f64>::required_len(0, 2, 5), 0);
        assert_eq!(MatMut::<f64>::required_len(3, 0, 5), 0);
    }

    #[test]
    fn leading_dimension_indexing() {
        // 2x2 matrix stored with lda = 3; the third row is padding.
        let mut data = vec![1.0, 2.0, -1.0, 3.0, 4.0, -1.0];
        let mut a = MatMut::new(&mut data, 2, 2, 3);
        assert_eq!(a.get(1, 0), 2.0);
        assert_eq!(a.get(0, 1), 3.0);
        a.swap_rows(0, 1, 0..2);
        assert_eq!(a.get(0, 0), 2.0);
        assert_eq!(a.get(1, 1), 3.0);
        assert_eq!(data[2], -1.0);
        assert_eq!(data[5], -1.0);
    }

    #[test]
    fn pack_block_is_column_major() {
        // 3x3 matrix with a[i][j] = 10 * i + j.
        let mut data: Vec<f64> = (0..9).map(|k| (10 * (k % 3) + k / 3) as f64).collect();
        let a = MatMut::new(&mut data, 3, 3, 3);
        let mut packed = vec![0.0; 4];
        a.pack_block(Block::new(1, 1, 2, 2), &mut packed);
        assert_eq!(packed, vec![11.0, 21.0, 12.0, 22.0]);
    }

    #[test]
    fn block_slice_starts_at_block_origin() {
        let mut data: Vec<f64> = (0..12).map(|k| k as f64).collect();
        let mut a = MatMut::new(&mut data, 3, 4, 3);
        let s = a.block_slice_mut(Block::new(1, 2, 2, 2));
        // Columns 2 and 3 of rows 1..3, with the row-0 entry of column 3 in between.
        assert_eq!(s, &[7.0, 8.0, 9.0, 10.0, 11.0]);
    }
}
