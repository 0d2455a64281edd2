//! Error types for batched factorization calls.

use thiserror::Error;

/// Errors that abort a call before any matrix is touched.
///
/// A singular matrix is not an error: it is recorded in the per-matrix
/// status buffer and the factorization is still produced.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// The handle cannot issue work (its backend is unavailable).
    #[error("Invalid handle: {0}")]
    InvalidHandle(String),

    /// A required buffer is missing or too short for the addressed elements.
    #[error("Invalid pointer: {0}")]
    InvalidPointer(String),

    /// A dimension, leading dimension or stride is out of range.
    #[error("Invalid size: {0}")]
    InvalidSize(String),

    /// A configuration or handle-state value is not acceptable.
    #[error("Invalid value: {0}")]
    InvalidValue(String),

    /// The attached workspace cannot hold what the call requires.
    #[error("Workspace too small: {required} bytes required, {available} available")]
    MemoryError { required: usize, available: usize },

    /// The Level-3 backend reported a fatal failure.
    #[error("Backend error: {0}")]
    Backend(String),
}

/// Result type for batched factorization operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_error_message() {
        let e = Error::MemoryError {
            required: 1024,
            available: 256,
        };
        assert_eq!(
            e.to_string(),
            "Workspace too small: 1024 bytes required, 256 available"
        );
    }
}
