//! Error types for flowsync.

use thiserror::Error;

/// Result type alias using flowsync's Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for flowsync operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Frame payload allocation failed.
    #[error("out of memory: {0}")]
    OutOfMemory(String),

    /// Malformed configuration, or an unexpected frame shape at a port.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Graph construction or wiring error (unbound port, bad node id).
    #[error("graph error: {0}")]
    Graph(String),

    /// A slice executor job returned a fatal error.
    #[error("slice job {job} failed: {code}")]
    SliceJob {
        /// Index of the failing job.
        job: usize,
        /// The error reported by the job.
        code: ErrorCode,
    },
}

impl Error {
    /// The compact code carried by link statuses for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::OutOfMemory(_) => ErrorCode::OutOfMemory,
            Error::InvalidData(_) => ErrorCode::InvalidData,
            Error::Graph(_) => ErrorCode::InvalidData,
            Error::SliceJob { code, .. } => *code,
        }
    }
}

/// Compact, copyable error code carried inside a terminal link status.
///
/// This is the propagated form of the fatal half of the error taxonomy;
/// the richer [`Error`] is what step functions return to the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Allocation failure.
    OutOfMemory,
    /// Malformed configuration or frame.
    InvalidData,
}

impl ErrorCode {
    /// Lift this code back into a full [`Error`] with the given context.
    pub fn into_error(self, context: impl Into<String>) -> Error {
        match self {
            ErrorCode::OutOfMemory => Error::OutOfMemory(context.into()),
            ErrorCode::InvalidData => Error::InvalidData(context.into()),
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCode::OutOfMemory => write!(f, "out of memory"),
            ErrorCode::InvalidData => write!(f, "invalid data"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_roundtrip() {
        let err = Error::OutOfMemory("payload".into());
        assert_eq!(err.code(), ErrorCode::OutOfMemory);

        let back = err.code().into_error("payload");
        assert!(matches!(back, Error::OutOfMemory(_)));
    }

    #[test]
    fn test_slice_job_error_display() {
        let err = Error::SliceJob {
            job: 3,
            code: ErrorCode::InvalidData,
        };
        assert_eq!(err.to_string(), "slice job 3 failed: invalid data");
    }
}
