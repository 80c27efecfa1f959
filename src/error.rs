//! Error types for the codescan engine.
//!
//! Errors fall into three classes: caller input errors (bad region, bad
//! path), resource errors (unreadable source, missing signature directory),
//! and engine invariant violations. The latter signal a defect in the engine
//! itself and are never downgraded to a partial result. Every error maps onto
//! a stable numeric [`StatusCode`] for callers on the far side of a language
//! boundary.

use std::path::PathBuf;
use thiserror::Error;

/// Upper bound on the byte length of a resolved signature-database path.
pub const MAX_SIGNATURE_PATH: usize = 4096;

/// Main error type for codescan operations.
#[derive(Debug, Error)]
pub enum ScanError {
    /// The requested scan region is empty, inverted, or out of bounds.
    #[error("invalid scan region: {0}")]
    InvalidRegion(String),

    /// Placeholder for capabilities not implemented; callers treat this
    /// like invalid input.
    #[error("unsupported operation: {0}")]
    Unsupported(String),

    /// The byte source does not exist, is empty, or cannot be read.
    #[error("source unavailable: {0}")]
    SourceUnavailable(String),

    /// I/O failure while reading the byte source or a signature file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The signature directory is missing, misnamed, or not a directory.
    #[error("invalid signature path {path:?}: {message}")]
    InvalidPath { path: PathBuf, message: String },

    /// The resolved signature path exceeds [`MAX_SIGNATURE_PATH`].
    #[error("signature path too long: {len} bytes (limit {MAX_SIGNATURE_PATH})")]
    PathTooLong { len: usize },

    /// A signature profile file could not be parsed.
    #[error("corrupt signature profile {path:?}: {message}")]
    CorruptSignature { path: PathBuf, message: String },

    /// Allocation failure surfaced by a collaborator.
    #[error("out of memory")]
    OutOfMemory,

    /// The engine produced output violating one of its own invariants.
    /// Indicates an engine defect, not bad input.
    #[error("engine invariant violated: {0}")]
    InternalInvariant(String),
}

/// Result type alias for codescan operations.
pub type Result<T> = std::result::Result<T, ScanError>;

/// Stable status codes for the external boundary.
///
/// The numeric values are part of the public contract and never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum StatusCode {
    /// Operation is considered a full success.
    Success = 0,
    /// Something wrong with the file (missing, unreadable, or zero-sized).
    FileError = 1,
    /// Programming error detected inside the engine.
    EngineError = 2,
    /// Signature-database path malformed or out-of-bounds length.
    SignaturePathLength = 3,
    /// The input given by the caller is bad.
    BadUserInput = 4,
    /// Allocation failure.
    OutOfMemory = 5,
    /// The requested operation is not supported.
    UnsupportedOperation = 6,
}

impl From<&ScanError> for StatusCode {
    fn from(err: &ScanError) -> Self {
        match err {
            ScanError::InvalidRegion(_) => StatusCode::BadUserInput,
            ScanError::Unsupported(_) => StatusCode::UnsupportedOperation,
            ScanError::SourceUnavailable(_) | ScanError::Io(_) => StatusCode::FileError,
            ScanError::InvalidPath { .. } | ScanError::PathTooLong { .. } => {
                StatusCode::SignaturePathLength
            }
            ScanError::CorruptSignature { .. } => StatusCode::FileError,
            ScanError::OutOfMemory => StatusCode::OutOfMemory,
            ScanError::InternalInvariant(_) => StatusCode::EngineError,
        }
    }
}

impl ScanError {
    /// Stable numeric code for this error.
    pub fn status_code(&self) -> StatusCode {
        StatusCode::from(self)
    }
}

/// Status of a completed operation, for callers that prefer codes over
/// `Result`.
pub fn status_of<T>(result: &Result<T>) -> StatusCode {
    match result {
        Ok(_) => StatusCode::Success,
        Err(e) => e.status_code(),
    }
}
