//! Workspace planning and the caller-owned scratch arena.
//!
//! Sizing is a two-phase protocol: [`WorkspacePlanner::plan`] is a pure
//! function of the problem shape and configuration, and the caller allocates a
//! [`Workspace`] of at least [`WorkspaceSizes::total_bytes`] before the real
//! call. The factorization itself never allocates scratch.

use crate::config::FactorConfig;
use crate::error::{Error, Result};
use crate::scalar::Scalar;
use std::mem::size_of;

/// Every sub-buffer starts on a multiple of this many bytes.
pub const BUFFER_ALIGNMENT: usize = 256;

/// Number of named sub-buffers.
pub const NUM_SUB_BUFFERS: usize = 8;

/// Which factorization family a call belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    /// Recursive/blocked driver (GETRF).
    Blocked,
    /// Column-at-a-time elimination only (GETF2).
    Unblocked,
}

/// Byte size of each scratch sub-buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
pub struct WorkspaceSizes {
    /// Constants -1, 0 and 1 passed to Level-3 calls.
    pub scalars: usize,
    /// Pivot-search magnitudes, one per matrix.
    pub work: usize,
    /// Packed triangular blocks for TRSM.
    pub work1: usize,
    /// Packed right-hand blocks (U12) for GEMM.
    pub work2: usize,
    /// Packed left-hand blocks (L21) for GEMM.
    pub work3: usize,
    /// Pivot values and their reciprocals, one per matrix.
    pub pivotval: usize,
    /// Pivot row indices, one per matrix.
    pub pivotidx: usize,
    /// Status of the panel currently being factored, one per matrix.
    pub iinfo: usize,
}

impl WorkspaceSizes {
    /// Sizes in declaration order.
    pub fn as_array(&self) -> [usize; NUM_SUB_BUFFERS] {
        [
            self.scalars,
            self.work,
            self.work1,
            self.work2,
            self.work3,
            self.pivotval,
            self.pivotidx,
            self.iinfo,
        ]
    }

    /// Bytes required for all sub-buffers once each is aligned.
    ///
    /// Saturates at `usize::MAX`, which no workspace can hold. Sizes from
    /// [`WorkspacePlanner::plan`] never saturate.
    pub fn total_bytes(&self) -> usize {
        self.checked_total_bytes().unwrap_or(usize::MAX)
    }

    /// Like [`total_bytes`](Self::total_bytes), but `None` on overflow.
    pub fn checked_total_bytes(&self) -> Option<usize> {
        self.as_array()
            .iter()
            .try_fold(0usize, |acc, &s| acc.checked_add(align_up(s)?))
    }

    /// True when the call needs no scratch at all.
    pub fn is_zero(&self) -> bool {
        self.as_array().iter().all(|&s| s == 0)
    }
}

#[inline]
fn align_up(bytes: usize) -> Option<usize> {
    bytes.div_ceil(BUFFER_ALIGNMENT).checked_mul(BUFFER_ALIGNMENT)
}

/// `a * b`, or `InvalidSize` naming what overflowed.
fn product(a: usize, b: usize, what: &str) -> Result<usize> {
    a.checked_mul(b)
        .ok_or_else(|| Error::InvalidSize(format!("{} size overflows ({} * {})", what, a, b)))
}

/// One step of the blocked driver: the leading panel width and how that
/// panel is factored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Split {
    /// Width of the leading panel.
    pub jb: usize,
    /// Block size for the recursive panel call, `None` when it is factored unblocked.
    pub panel_block: Option<usize>,
}

/// Decide how the blocked driver treats an `m x n` block at block size `nb`.
///
/// Returns `None` when the block is factored unblocked. The planner and the
/// driver both call this so the planned scratch always matches the recursion.
pub fn split(m: usize, n: usize, nb: usize, panel_threshold: usize) -> Option<Split> {
    if m.min(n) <= nb {
        return None;
    }
    let inner = nb / 2;
    Some(Split {
        jb: nb,
        panel_block: (inner >= panel_threshold && inner > 0).then_some(inner),
    })
}

/// Largest per-matrix element counts of the three Level-3 scratch areas.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Level3Extents {
    tri: usize,
    rhs: usize,
    lhs: usize,
}

impl Level3Extents {
    fn max(self, other: Self) -> Self {
        Self {
            tri: self.tri.max(other.tri),
            rhs: self.rhs.max(other.rhs),
            lhs: self.lhs.max(other.lhs),
        }
    }
}

fn level3_extents(
    m: usize,
    n: usize,
    nb: usize,
    panel_threshold: usize,
) -> Result<Level3Extents> {
    let mut extents = Level3Extents::default();
    let (mut m, mut n) = (m, n);
    // The lower-right recursion keeps `nb`, so walk it as a loop.
    while let Some(s) = split(m, n, nb, panel_threshold) {
        if let Some(inner) = s.panel_block {
            extents = extents.max(level3_extents(m, s.jb, inner, panel_threshold)?);
        }
        extents = extents.max(Level3Extents {
            tri: product(s.jb, s.jb, "TRSM block")?,
            rhs: product(s.jb, n - s.jb, "GEMM rhs block")?,
            lhs: product(m - s.jb, s.jb, "GEMM lhs block")?,
        });
        m -= s.jb;
        n -= s.jb;
    }
    Ok(extents)
}

/// Computes workspace sizes.
#[derive(Debug, Clone, Copy, Default)]
pub struct WorkspacePlanner;

impl WorkspacePlanner {
    /// Scratch required to factor `batch_count` matrices of shape `m x n`.
    ///
    /// Deterministic in its arguments: a size query and the real call with the
    /// same arguments see identical sizes. Degenerate shapes need nothing.
    /// A shape whose scratch does not fit in `usize` bytes is `InvalidSize`.
    pub fn plan<T: Scalar>(
        m: usize,
        n: usize,
        batch_count: usize,
        pivot: bool,
        algorithm: Algorithm,
        config: &FactorConfig,
    ) -> Result<WorkspaceSizes> {
        if m == 0 || n == 0 || batch_count == 0 {
            return Ok(WorkspaceSizes::default());
        }

        let elem = size_of::<T>();
        let per_batch = |bytes: usize, what: &str| product(batch_count, bytes, what);
        let mut sizes = WorkspaceSizes {
            scalars: 3 * elem,
            work: if pivot {
                per_batch(size_of::<T::Magnitude>(), "work")?
            } else {
                0
            },
            pivotval: per_batch(elem, "pivotval")?,
            pivotidx: if pivot {
                per_batch(size_of::<i32>(), "pivotidx")?
            } else {
                0
            },
            iinfo: per_batch(size_of::<i32>(), "iinfo")?,
            ..WorkspaceSizes::default()
        };

        if algorithm == Algorithm::Blocked {
            let extents = level3_extents(m, n, config.block_size, config.panel_threshold)?;
            let chunk = config.scratch_chunk(batch_count);
            sizes.work1 = product(product(chunk, extents.tri, "work1")?, elem, "work1")?;
            sizes.work2 = product(product(chunk, extents.rhs, "work2")?, elem, "work2")?;
            sizes.work3 = product(product(chunk, extents.lhs, "work3")?, elem, "work3")?;
        }

        let total = sizes
            .checked_total_bytes()
            .ok_or_else(|| Error::InvalidSize("total workspace size overflows".into()))?;

        log::debug!(
            "{} workspace plan m={} n={} batch={} pivot={} {:?}: {} bytes",
            T::PREFIX,
            m,
            n,
            batch_count,
            pivot,
            algorithm,
            total
        );
        Ok(sizes)
    }
}

/// Caller-owned scratch arena.
///
/// Backed by 8-byte words so every sub-buffer can be reinterpreted as any
/// supported element type.
#[derive(Debug, Clone, Default)]
pub struct Workspace {
    words: Vec<u64>,
}

impl Workspace {
    /// Allocate an arena of at least `bytes` bytes.
    pub fn new(bytes: usize) -> Self {
        Self {
            words: vec![0; bytes.div_ceil(size_of::<u64>())],
        }
    }

    /// Allocate exactly what `sizes` requires.
    pub fn for_sizes(sizes: &WorkspaceSizes) -> Self {
        Self::new(sizes.total_bytes())
    }

    /// Capacity in bytes.
    pub fn capacity_bytes(&self) -> usize {
        self.words.len() * size_of::<u64>()
    }

    /// Split the arena into typed sub-buffers for one call.
    pub fn carve<T: Scalar>(&mut self, sizes: &WorkspaceSizes) -> Result<WorkspaceView<'_, T>> {
        let required = sizes.total_bytes();
        let available = self.capacity_bytes();
        if required > available {
            return Err(Error::MemoryError {
                required,
                available,
            });
        }

        let mut rest: &mut [u64] = &mut self.words;
        let scalars = take_words(&mut rest, sizes.scalars);
        let work = take_words(&mut rest, sizes.work);
        let work1 = take_words(&mut rest, sizes.work1);
        let work2 = take_words(&mut rest, sizes.work2);
        let work3 = take_words(&mut rest, sizes.work3);
        let pivotval = take_words(&mut rest, sizes.pivotval);
        let pivotidx = take_words(&mut rest, sizes.pivotidx);
        let iinfo = take_words(&mut rest, sizes.iinfo);

        Ok(WorkspaceView {
            scalars: typed::<T>(scalars, sizes.scalars),
            work: typed::<T::Magnitude>(work, sizes.work),
            work1: typed::<T>(work1, sizes.work1),
            work2: typed::<T>(work2, sizes.work2),
            work3: typed::<T>(work3, sizes.work3),
            pivotval: typed::<T>(pivotval, sizes.pivotval),
            pivotidx: typed::<i32>(pivotidx, sizes.pivotidx),
            iinfo: typed::<i32>(iinfo, sizes.iinfo),
        })
    }
}

fn take_words<'w>(rest: &mut &'w mut [u64], bytes: usize) -> &'w mut [u64] {
    let words = bytes.div_ceil(BUFFER_ALIGNMENT) * BUFFER_ALIGNMENT / size_of::<u64>();
    let (head, tail) = std::mem::take(rest).split_at_mut(words);
    *rest = tail;
    head
}

fn typed<U: bytemuck::Pod>(words: &mut [u64], bytes: usize) -> &mut [U] {
    let all: &mut [U] = bytemuck::cast_slice_mut(words);
    &mut all[..bytes / size_of::<U>()]
}

/// Typed sub-buffers of a [`Workspace`] for one call.
#[derive(Debug)]
pub struct WorkspaceView<'a, T: Scalar> {
    pub scalars: &'a mut [T],
    pub work: &'a mut [T::Magnitude],
    pub work1: &'a mut [T],
    pub work2: &'a mut [T],
    pub work3: &'a mut [T],
    pub pivotval: &'a mut [T],
    pub pivotidx: &'a mut [i32],
    pub iinfo: &'a mut [i32],
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MemoryMode;
    use num_complex::Complex64;

    #[test]
    fn degenerate_shapes_need_nothing() {
        let config = FactorConfig::default();
        for (m, n, b) in [(0, 4, 3), (4, 0, 3), (4, 4, 0)] {
            let sizes = WorkspacePlanner::plan::<f64>(m, n, b, true, Algorithm::Blocked, &config)
                .unwrap();
            assert!(sizes.is_zero());
            assert_eq!(sizes.total_bytes(), 0);
        }
    }

    #[test]
    fn plan_is_deterministic() {
        let config = FactorConfig::default().with_block_size(8).with_panel_threshold(2);
        let a = WorkspacePlanner::plan::<Complex64>(40, 33, 7, true, Algorithm::Blocked, &config)
            .unwrap();
        let b = WorkspacePlanner::plan::<Complex64>(40, 33, 7, true, Algorithm::Blocked, &config)
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn small_problems_need_no_level3_scratch() {
        let config = FactorConfig::default();
        let sizes = WorkspacePlanner::plan::<f64>(32, 32, 10, true, Algorithm::Blocked, &config)
            .unwrap();
        assert_eq!(sizes.work1 + sizes.work2 + sizes.work3, 0);
        assert_eq!(sizes.scalars, 3 * 8);
        assert_eq!(sizes.pivotidx, 10 * 4);
    }

    #[test]
    fn no_pivot_skips_search_buffers() {
        let config = FactorConfig::default();
        let sizes = WorkspacePlanner::plan::<f32>(5, 5, 4, false, Algorithm::Unblocked, &config)
            .unwrap();
        assert_eq!(sizes.work, 0);
        assert_eq!(sizes.pivotidx, 0);
        assert_eq!(sizes.pivotval, 4 * 4);
    }

    #[test]
    fn reduced_memory_plans_less_level3_scratch() {
        let optimal = FactorConfig::default().with_block_size(4).with_panel_threshold(2);
        let reduced = optimal
            .clone()
            .with_memory(MemoryMode::Reduced)
            .with_reduced_chunk(2);
        let a = WorkspacePlanner::plan::<f64>(20, 20, 10, true, Algorithm::Blocked, &optimal)
            .unwrap();
        let b = WorkspacePlanner::plan::<f64>(20, 20, 10, true, Algorithm::Blocked, &reduced)
            .unwrap();
        assert_eq!(a.work1, 5 * b.work1);
        assert_eq!(a.work2, 5 * b.work2);
        assert_eq!(a.pivotval, b.pivotval);
    }

    #[test]
    fn extents_cover_inner_panel_recursion() {
        // m = 9, nb = 8: the outer blocks are 1 x 8 and 8 x 1 but the inner
        // panel (9 x 8 at nb = 4) needs 5 x 4 and 4 x 4 blocks.
        let e = level3_extents(9, 9, 8, 2).unwrap();
        assert_eq!(e.tri, 64);
        assert_eq!(e.rhs, 16);
        assert_eq!(e.lhs, 20);
    }

    #[test]
    fn split_decisions() {
        assert_eq!(split(8, 8, 8, 2), None);
        assert_eq!(
            split(9, 9, 8, 2),
            Some(Split {
                jb: 8,
                panel_block: Some(4)
            })
        );
        assert_eq!(
            split(9, 9, 2, 2),
            Some(Split {
                jb: 2,
                panel_block: None
            })
        );
    }

    #[test]
    fn carve_rejects_small_arena() {
        let config = FactorConfig::default();
        let sizes = WorkspacePlanner::plan::<f64>(4, 4, 2, true, Algorithm::Blocked, &config)
            .unwrap();
        let mut ws = Workspace::new(sizes.total_bytes() - BUFFER_ALIGNMENT);
        let err = ws.carve::<f64>(&sizes).unwrap_err();
        assert!(matches!(err, Error::MemoryError { .. }));
    }

    #[test]
    fn carve_yields_typed_lengths() {
        let config = FactorConfig::default().with_block_size(2).with_panel_threshold(1);
        let sizes = WorkspacePlanner::plan::<Complex64>(6, 6, 3, true, Algorithm::Blocked, &config)
            .unwrap();
        let mut ws = Workspace::for_sizes(&sizes);
        let view = ws.carve::<Complex64>(&sizes).unwrap();
        assert_eq!(view.scalars.len(), 3);
        assert_eq!(view.work.len(), 3);
        assert_eq!(view.pivotval.len(), 3);
        assert_eq!(view.pivotidx.len(), 3);
        assert_eq!(view.iinfo.len(), 3);
        assert_eq!(view.work1.len(), 3 * 4);
    }

    #[test]
    fn sizes_serialize_to_json() {
        let sizes = WorkspaceSizes {
            scalars: 24,
            ..WorkspaceSizes::default()
        };
        let json = serde_json::to_string(&sizes).unwrap();
        assert!(json.contains("\"scalars\":24"));
    }

    #[test]
    fn oversized_plan_is_invalid_size() {
        let config = FactorConfig::default();
        let err = WorkspacePlanner::plan::<Complex64>(
            1 << 20,
            1 << 20,
            1 << 40,
            true,
            Algorithm::Blocked,
            &config,
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidSize(_)));
    }

    #[test]
    fn total_bytes_saturates() {
        let sizes = WorkspaceSizes {
            work1: usize::MAX / 2,
            work2: usize::MAX / 2,
            ..WorkspaceSizes::default()
        };
        assert_eq!(sizes.checked_total_bytes(), None);
        assert_eq!(sizes.total_bytes(), usize::MAX);
    }
}
