//! Recursive blocked driver.
//!
//! A block wider than the block size splits into a leading panel of `nb`
//! columns and a trailing part. The panel is factored (recursively with
//! `nb / 2`, or unblocked once that drops under the panel threshold), its row
//! exchanges are replayed on the trailing columns, and the trailing part is
//! updated with one batched TRSM and one batched GEMM before the lower-right
//! block is factored the same way. The lower-right exchanges are finally
//! replayed on the panel's columns, so the pivot records describe the full
//! matrix. Every block starts on the diagonal, which keeps the recorded pivot
//! rows absolute.

use crate::panel::{PanelFactorizer, PanelScratch};
use crate::pivot::PivotTracker;
use lubatch_core::{
    Block, FactorConfig, Level3Backend, MatMut, Result, Scalar, WorkspaceView, split,
};

/// Scratch threaded through the recursion.
struct Scratch<'w, T: Scalar> {
    panel: PanelScratch<'w, T>,
    work1: &'w mut [T],
    work2: &'w mut [T],
    work3: &'w mut [T],
    minus_one: T,
    one: T,
}

/// Blocked LU over a batch, delegating trailing updates to a [`Level3Backend`].
pub struct BlockedFactorizer<'b, B: Level3Backend> {
    backend: &'b B,
    block_size: usize,
    panel_threshold: usize,
    panel: PanelFactorizer,
    pivots: PivotTracker,
}

impl<'b, B: Level3Backend> BlockedFactorizer<'b, B> {
    pub fn new(backend: &'b B, config: &FactorConfig) -> Self {
        Self {
            backend,
            block_size: config.block_size,
            panel_threshold: config.panel_threshold,
            panel: PanelFactorizer::new(config.min_items_per_task),
            pivots: PivotTracker::new(config.min_items_per_task),
        }
    }

    /// Factor every `m x n` matrix of `mats` in place.
    ///
    /// `ipiv` holds one record of `min(m, n)` entries per matrix, or `None`
    /// to factor without pivoting. `view` must come from a plan made with the
    /// same shape and configuration.
    pub fn factor<T: Scalar>(
        &self,
        mats: &mut [MatMut<'_, T>],
        ipiv: Option<&mut [&mut [i32]]>,
        m: usize,
        n: usize,
        view: WorkspaceView<'_, T>,
        info: &mut [i32],
    ) -> Result<()> {
        let WorkspaceView {
            scalars,
            work,
            work1,
            work2,
            work3,
            pivotval,
            pivotidx,
            iinfo,
        } = view;

        scalars[..3].copy_from_slice(&[-T::one(), T::zero(), T::one()]);
        let mut scratch = Scratch {
            panel: PanelScratch {
                work,
                pivotval,
                pivotidx,
                iinfo,
            },
            work1,
            work2,
            work3,
            minus_one: scalars[0],
            one: scalars[2],
        };

        log::debug!(
            "{}getrf {}x{} on {} matrices: nb={}, panel<{}",
            T::PREFIX,
            m,
            n,
            mats.len(),
            self.block_size,
            self.panel_threshold
        );
        self.recurse(
            mats,
            ipiv,
            Block::new(0, 0, m, n),
            self.block_size,
            &mut scratch,
            info,
        )
    }

    fn recurse<T: Scalar>(
        &self,
        mats: &mut [MatMut<'_, T>],
        mut ipiv: Option<&mut [&mut [i32]]>,
        at: Block,
        nb: usize,
        ws: &mut Scratch<'_, T>,
        info: &mut [i32],
    ) -> Result<()> {
        let Some(step) = split(at.nrows, at.ncols, nb, self.panel_threshold) else {
            self.panel.factor(mats, ipiv, at, &mut ws.panel, info);
            return Ok(());
        };

        let d = at.row;
        let jb = step.jb;
        let (mr, nr) = (at.nrows, at.ncols);
        log::trace!("Split {}x{} at {}: jb={}", mr, nr, d, jb);

        let left = Block::new(d, d, mr, jb);
        match step.panel_block {
            Some(inner) => self.recurse(mats, ipiv.as_deref_mut(), left, inner, ws, info)?,
            None => self
                .panel
                .factor(mats, ipiv.as_deref_mut(), left, &mut ws.panel, info),
        }

        if let Some(p) = ipiv.as_deref() {
            self.pivots
                .apply_row_exchanges(mats, p, d..d + jb, d + jb..d + nr);
        }

        let tri = Block::new(d, d, jb, jb);
        let u12 = Block::new(d, d + jb, jb, nr - jb);
        let l21 = Block::new(d + jb, d, mr - jb, jb);
        let a22 = Block::new(d + jb, d + jb, mr - jb, nr - jb);

        self.backend
            .trsm_lower_unit(mats, tri, u12, ws.one, &mut ws.work1[..])?;
        self.backend.gemm(
            mats,
            l21,
            u12,
            a22,
            ws.minus_one,
            ws.one,
            &mut ws.work3[..],
            &mut ws.work2[..],
        )?;

        self.recurse(mats, ipiv.as_deref_mut(), a22, nb, ws, info)?;

        if let Some(p) = ipiv.as_deref() {
            self.pivots
                .apply_row_exchanges(mats, p, d + jb..d + mr.min(nr), d..d + jb);
        }
        Ok(())
    }
}
