//! Consolidation error types.

use thiserror::Error;

/// Errors consolidating incidence buckets.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConsolidationError {
    /// A bucket with no elements reached consolidation.
    #[error("incidence bucket '{0}' has no elements")]
    EmptyBucket(String),

    /// Sample size must be at least one.
    #[error("sample size must be positive")]
    InvalidSampleSize,
}

impl ConsolidationError {
    /// Returns the error code for logs.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::EmptyBucket(_) => "EMPTY_INCIDENCE_BUCKET",
            Self::InvalidSampleSize => "INVALID_SAMPLE_SIZE",
        }
    }
}
