//! # Structured Error Handling
//!
//! Crate-level error taxonomy for the upload pipeline. Component-local error
//! enums (store, tracker, validator faults) live next to their components and
//! are converted into [`UploadError`] at the operation boundary.

use std::time::Duration;

/// Errors surfaced by the upload pipeline.
///
/// Policy rejection (aggregate validation status ERROR) is deliberately not a
/// variant: a rejected upload is a normal outcome carrying the full report
/// map, not a fault.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    /// The declared archive container format is not supported. Nothing has
    /// been written to disk when this is returned.
    #[error("unsupported archive format: {0:?}")]
    UnsupportedFormat(String),

    /// Extraction, filesystem or store I/O fault. The scratch directory is
    /// released; no partial artifacts are visible.
    #[error("i/o failure: {0}")]
    Io(#[from] std::io::Error),

    /// The archive container is structurally invalid (corrupt zip, unsafe
    /// entry path).
    #[error("archive failure: {0}")]
    Archive(String),

    /// A commit-phase fault. Compensation has already run when this
    /// propagates: the version pointer is at exactly the prior state.
    #[error("persistence failure: {0}")]
    Persistence(String),

    /// The extracted directory matches neither flow layout. Fatal, not
    /// retried.
    #[error("project directory matches no known flow layout")]
    InvalidLoaderVariant,

    /// Extraction + validation exceeded the configured deadline. Never raised
    /// once the commit phase has begun.
    #[error("upload deadline of {0:?} exceeded before commit")]
    DeadlineExceeded(Duration),

    /// Configuration problem detected while assembling the pipeline, e.g. a
    /// validator name with no registered implementation.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl From<zip::result::ZipError> for UploadError {
    fn from(err: zip::result::ZipError) -> Self {
        match err {
            zip::result::ZipError::Io(io) => UploadError::Io(io),
            other => UploadError::Archive(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, UploadError>;
