//! Batch orchestration: argument checks, workspace binding and dispatch.

use crate::blocked::BlockedFactorizer;
use crate::panel::{PanelFactorizer, PanelScratch};
use lubatch_core::{
    Algorithm, Block, Error, FactorConfig, Handle, Level3Backend, MatrixBatch, PivotBuffer,
    Result, Scalar, WorkspacePlanner, WorkspaceView, check_info,
};

/// Outcome of the argument checks that precede any work.
///
/// `QuickReturn` means the call is a valid no-op; it never reaches callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ArgCheck {
    Continue,
    QuickReturn,
}

/// Shape and algorithm family of one call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Problem {
    pub m: usize,
    pub n: usize,
    pub batch_count: usize,
    pub algorithm: Algorithm,
}

impl Problem {
    pub fn new(m: usize, n: usize, batch_count: usize, algorithm: Algorithm) -> Self {
        Self {
            m,
            n,
            batch_count,
            algorithm,
        }
    }

    /// True when the call has nothing to factor.
    pub fn is_degenerate(&self) -> bool {
        self.m == 0 || self.n == 0 || self.batch_count == 0
    }
}

/// Drives one factorization call over a whole batch on a handle.
pub struct BatchExecutor<'h, B: Level3Backend> {
    handle: &'h mut Handle<B>,
}

impl<'h, B: Level3Backend> BatchExecutor<'h, B> {
    pub fn new(handle: &'h mut Handle<B>) -> Self {
        Self { handle }
    }

    /// Validate, plan and run.
    ///
    /// Checks run in a fixed order: handle, sizes and configuration, size
    /// query, degenerate shape, buffer coverage, workspace capacity. Nothing
    /// is written before all of them pass. `ipiv` is `None` for the
    /// no-pivoting variants.
    pub fn run<T: Scalar, A: MatrixBatch<T>>(
        self,
        problem: Problem,
        a: &mut A,
        mut ipiv: Option<&mut PivotBuffer<'_>>,
        info: &mut [i32],
    ) -> Result<()> {
        self.handle.check()?;
        check_sizes(self.handle.config(), &problem, a, ipiv.as_deref())?;

        let pivot = ipiv.is_some();
        let sizes = WorkspacePlanner::plan::<T>(
            problem.m,
            problem.n,
            problem.batch_count,
            pivot,
            problem.algorithm,
            self.handle.config(),
        )?;

        if self.handle.is_device_memory_size_query() {
            self.handle.record_size_query(&sizes);
            return Ok(());
        }

        if check_buffers(&problem, a, ipiv.as_deref(), info)? == ArgCheck::QuickReturn {
            log::debug!(
                "Quick return for {}x{} batch of {}",
                problem.m,
                problem.n,
                problem.batch_count
            );
            return Ok(());
        }

        let (backend, config, workspace) = self.handle.parts_mut();
        let workspace = workspace.ok_or(Error::MemoryError {
            required: sizes.total_bytes(),
            available: 0,
        })?;
        let view = workspace.carve::<T>(&sizes)?;

        let Problem {
            m,
            n,
            batch_count,
            algorithm,
        } = problem;
        let info = &mut info[..batch_count];
        info.fill(0);

        let mut mats = a.views(m, n, batch_count);
        let mut records = ipiv.as_deref_mut().map(|p| p.records(m, n, batch_count));

        log::debug!(
            "{} {}x{} batch of {}: {}",
            T::PREFIX,
            m,
            n,
            batch_count,
            match algorithm {
                Algorithm::Blocked => config.describe(m, n),
                Algorithm::Unblocked => "unblocked".to_string(),
            }
        );

        match algorithm {
            Algorithm::Blocked => BlockedFactorizer::new(backend, config).factor(
                &mut mats,
                records.as_deref_mut(),
                m,
                n,
                view,
                info,
            )?,
            Algorithm::Unblocked => {
                let WorkspaceView {
                    work,
                    pivotval,
                    pivotidx,
                    iinfo,
                    ..
                } = view;
                let mut scratch = PanelScratch {
                    work,
                    pivotval,
                    pivotidx,
                    iinfo,
                };
                PanelFactorizer::new(config.min_items_per_task).factor(
                    &mut mats,
                    records.as_deref_mut(),
                    Block::new(0, 0, m, n),
                    &mut scratch,
                    info,
                );
            }
        }

        let singular = info.iter().filter(|&&s| s != 0).count();
        if singular > 0 {
            log::warn!(
                "{} of {} matrices have a zero pivot",
                singular,
                batch_count
            );
        }
        Ok(())
    }
}

fn check_sizes<T: Scalar, A: MatrixBatch<T>>(
    config: &FactorConfig,
    problem: &Problem,
    a: &A,
    ipiv: Option<&PivotBuffer<'_>>,
) -> Result<()> {
    config.validate()?;
    a.check_sizes(problem.m, problem.n, problem.batch_count)?;
    if let Some(p) = ipiv {
        p.check_sizes(problem.m, problem.n, problem.batch_count)?;
    }
    Ok(())
}

fn check_buffers<T: Scalar, A: MatrixBatch<T>>(
    problem: &Problem,
    a: &A,
    ipiv: Option<&PivotBuffer<'_>>,
    info: &[i32],
) -> Result<ArgCheck> {
    if problem.is_degenerate() {
        return Ok(ArgCheck::QuickReturn);
    }
    a.check_buffers(problem.m, problem.n, problem.batch_count)?;
    if let Some(p) = ipiv {
        p.check_buffers(problem.m, problem.n, problem.batch_count)?;
    }
    check_info(info, problem.batch_count)?;
    Ok(ArgCheck::Continue)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lubatch_backend_cpu::HostBackend;
    use lubatch_core::{StridedBatch, Workspace};

    #[test]
    fn test_degenerate_is_quick_return() {
        let problem = Problem::new(0, 4, 3, Algorithm::Blocked);
        let mut data: Vec<f64> = vec![];
        let batch = StridedBatch::new(&mut data, 1, 0);
        assert_eq!(
            check_buffers::<f64, _>(&problem, &batch, None, &[]).unwrap(),
            ArgCheck::QuickReturn
        );
    }

    #[test]
    fn test_short_info_is_invalid_pointer() {
        let problem = Problem::new(2, 2, 2, Algorithm::Unblocked);
        let mut data = vec![1.0f64; 8];
        let batch = StridedBatch::new(&mut data, 2, 4);
        assert!(matches!(
            check_buffers::<f64, _>(&problem, &batch, None, &[0]),
            Err(Error::InvalidPointer(_))
        ));
    }

    #[test]
    fn test_missing_workspace_is_memory_error() {
        let mut handle = Handle::new(HostBackend::new());
        let mut data = vec![2.0f64, 1.0, 1.0, 2.0];
        let mut batch = StridedBatch::new(&mut data, 2, 4);
        let mut info = vec![-1];
        let result = BatchExecutor::new(&mut handle).run::<f64, _>(
            Problem::new(2, 2, 1, Algorithm::Unblocked),
            &mut batch,
            None,
            &mut info,
        );
        assert!(matches!(result, Err(Error::MemoryError { available: 0, .. })));
        assert_eq!(info, vec![-1]);
    }

    #[test]
    fn test_run_resets_info() {
        let mut handle = Handle::new(HostBackend::new());
        handle.set_workspace(Workspace::new(4096));
        let mut data = vec![2.0f64, 1.0, 1.0, 2.0];
        let mut batch = StridedBatch::new(&mut data, 2, 4);
        let mut info = vec![-1];
        BatchExecutor::new(&mut handle)
            .run::<f64, _>(
                Problem::new(2, 2, 1, Algorithm::Unblocked),
                &mut batch,
                None,
                &mut info,
            )
            .unwrap();
        assert_eq!(info, vec![0]);
        assert_eq!(data, vec![2.0, 0.5, 1.0, 1.5]);
    }
}
