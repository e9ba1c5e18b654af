//! Intake error types.

use thiserror::Error;

/// Errors raised before a ledger file is parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntakeError {
    /// Filename does not follow `<tax-id>_<label>_<YYYYMM>.<ext>`.
    #[error("filename '{filename}' does not match <tax-id>_{label}_<YYYYMM>: {reason}")]
    InvalidFilename {
        /// Offending filename.
        filename: String,
        /// Expected label.
        label: String,
        /// What was wrong.
        reason: String,
    },

    /// Tax id in the filename belongs to another client.
    #[error("filename tax id '{found}' does not match client tax id '{expected}'")]
    TaxIdMismatch {
        /// Client tax id.
        expected: String,
        /// Tax id in the filename.
        found: String,
    },

    /// Period in the filename differs from the requested period.
    #[error("filename period {found} does not match requested period {expected}")]
    PeriodMismatch {
        /// Requested period.
        expected: String,
        /// Period in the filename.
        found: String,
    },

    /// Stored object is missing.
    #[error("uploaded file not found at '{0}'")]
    FileMissing(String),

    /// File has zero bytes.
    #[error("uploaded file is empty")]
    EmptyFile,

    /// Stored bytes differ from the bytes received at intake.
    #[error("content hash mismatch: expected {expected}, got {actual}")]
    HashMismatch {
        /// Hash recorded at intake.
        expected: String,
        /// Hash of the stored bytes.
        actual: String,
    },
}

impl IntakeError {
    /// Returns the error code for summaries and logs.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidFilename { .. } => "INVALID_FILENAME",
            Self::TaxIdMismatch { .. } => "TAX_ID_MISMATCH",
            Self::PeriodMismatch { .. } => "PERIOD_MISMATCH",
            Self::FileMissing(_) => "FILE_MISSING",
            Self::EmptyFile => "EMPTY_FILE",
            Self::HashMismatch { .. } => "HASH_MISMATCH",
        }
    }
}
