// src/error.rs

use thiserror::Error;

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, LinstatError>;

/// Every recoverable failure a storage, decomposition, statistics or transform
/// operation can report.
#[derive(Debug, Error)]
pub enum LinstatError {
    /// An index or index range lies outside the container's extent.
    #[error("index {index} out of range for extent {extent}")]
    OutOfRange { index: isize, extent: usize },

    /// Operand shapes are incompatible. Shapes are reported as `(rows, cols)`;
    /// vectors use `(len, 1)`.
    #[error("dimension mismatch: expected {expected:?}, got {got:?}")]
    DimensionMismatch {
        expected: (usize, usize),
        got: (usize, usize),
    },

    /// The operation requires an invertible matrix and the input is not.
    #[error("matrix is singular (pivot magnitude {pivot:e})")]
    SingularMatrix { pivot: f64 },

    /// An iterative algorithm hit its sweep cap.
    #[error("iteration did not converge after {iterations} sweeps")]
    ConvergenceFailure { iterations: usize },

    /// A transform was applied before it was fitted or loaded.
    #[error("transform has not been fitted")]
    NotFitted,

    /// Persisted transform state is malformed or inconsistent.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A scalar argument violates the operation's domain.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// An optional LAPACK backend reported a failure.
    #[error("linear algebra backend error: {0}")]
    Backend(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl LinstatError {
    /// Shorthand for a vector length mismatch.
    pub(crate) fn len_mismatch(expected: usize, got: usize) -> Self {
        LinstatError::DimensionMismatch {
            expected: (expected, 1),
            got: (got, 1),
        }
    }

    /// Shorthand for a matrix shape mismatch.
    pub(crate) fn shape_mismatch(expected: (usize, usize), got: (usize, usize)) -> Self {
        LinstatError::DimensionMismatch { expected, got }
    }
}

impl From<serde_json::Error> for LinstatError {
    fn from(e: serde_json::Error) -> Self {
        LinstatError::Serialization(e.to_string())
    }
}

impl From<bincode::error::EncodeError> for LinstatError {
    fn from(e: bincode::error::EncodeError) -> Self {
        LinstatError::Serialization(e.to_string())
    }
}

impl From<bincode::error::DecodeError> for LinstatError {
    fn from(e: bincode::error::DecodeError) -> Self {
        LinstatError::Serialization(e.to_string())
    }
}
