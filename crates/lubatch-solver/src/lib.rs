//! Batched LU factorization with optional partial pivoting.
//!
//! Factors many small-to-medium dense matrices at once, in the LAPACK layout:
//! `L` (unit diagonal implied) and `U` overwrite `A`, pivots are 1-based row
//! numbers and `info` flags the first zero pivot per matrix. Two families are
//! provided:
//!
//! - [`getrf_batched`] and friends: recursive blocked driver whose trailing
//!   updates go through a [`Level3Backend`]
//! - [`getf2_batched`] and friends: column-at-a-time elimination only
//!
//! Each comes in pointer-array and strided layouts, with and without pivoting.
//!
//! # Example
//!
//! ```
//! use lubatch_backend_cpu::HostBackend;
//! use lubatch_solver::{Handle, Workspace, getrf_strided_batched};
//!
//! let mut handle = Handle::new(HostBackend::new());
//!
//! let (m, n, batch) = (3, 3, 2);
//! let mut a = vec![0.0f64; 9 * batch];
//! let mut ipiv = vec![0i32; 3 * batch];
//! let mut info = vec![0i32; batch];
//!
//! // Ask how much scratch the call needs, then attach it.
//! handle.start_device_memory_size_query();
//! getrf_strided_batched(&mut handle, m, n, &mut a, 3, 9, &mut ipiv, 3, &mut info, batch).unwrap();
//! let bytes = handle.stop_device_memory_size_query().unwrap();
//! handle.set_workspace(Workspace::new(bytes));
//!
//! // Two copies of [[0, 2, 1], [2, 4, 1], [0, 2, 3]].
//! for k in 0..batch {
//!     a[9 * k..9 * (k + 1)].copy_from_slice(&[0.0, 2.0, 0.0, 2.0, 4.0, 2.0, 1.0, 1.0, 3.0]);
//! }
//! getrf_strided_batched(&mut handle, m, n, &mut a, 3, 9, &mut ipiv, 3, &mut info, batch).unwrap();
//! assert_eq!(&ipiv[..3], &[2, 2, 3]);
//! assert_eq!(info, vec![0, 0]);
//! ```

pub mod blocked;
pub mod executor;
pub mod getf2;
pub mod getrf;
pub mod panel;
pub mod pivot;

pub use blocked::BlockedFactorizer;
pub use executor::{BatchExecutor, Problem};
pub use getf2::{
    getf2_batched, getf2_npvt_batched, getf2_npvt_strided_batched, getf2_strided_batched,
};
pub use getrf::{
    getrf_batched, getrf_npvt_batched, getrf_npvt_strided_batched, getrf_strided_batched,
};
pub use panel::{PanelFactorizer, PanelScratch};
pub use pivot::PivotTracker;

pub use lubatch_core::{
    Algorithm, BackendType, Error, FactorConfig, Handle, Level3Backend, MemoryMode, Result,
    Scalar, Workspace, WorkspacePlanner, WorkspaceSizes,
};
