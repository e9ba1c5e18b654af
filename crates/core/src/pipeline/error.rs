//! Pipeline error types.

use ledgerline_shared::AppError;
use ledgerline_shared::types::UploadId;
use thiserror::Error;

use super::stage::Stage;
use crate::incidence::ConsolidationError;
use crate::intake::IntakeError;
use crate::reader::{HeaderNotFound, ReadError};
use crate::storage::StorageError;
use crate::store::StoreError;
use crate::upload::{UploadError, UploadState};

/// Errors that abort a pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Filename, tax id, period or content check failed.
    #[error(transparent)]
    Intake(#[from] IntakeError),

    /// File could not be read as a sheet.
    #[error(transparent)]
    Read(#[from] ReadError),

    /// No header row in the search window.
    #[error(transparent)]
    Header(#[from] HeaderNotFound),

    /// Object storage failure.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Durable store failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Upload is not in a state that allows the step.
    #[error(transparent)]
    Upload(#[from] UploadError),

    /// Incidence consolidation failed.
    #[error(transparent)]
    Consolidation(#[from] ConsolidationError),

    /// A stage exceeded its wall-clock budget.
    #[error("stage {stage} timed out after {seconds}s")]
    Timeout {
        /// Stage that timed out.
        stage: Stage,
        /// Configured budget.
        seconds: u64,
    },

    /// Series has no completed principal iteration to reprocess.
    #[error("upload {upload_id} cannot be reprocessed while {state}")]
    NotReprocessable {
        /// Principal upload of the series.
        upload_id: UploadId,
        /// Its current state.
        state: UploadState,
    },

    /// A reprocessing request carried no reason.
    #[error("reprocessing requires a reason")]
    ReasonRequired,

    /// A blocking task panicked or was cancelled.
    #[error("internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    /// Returns the error code for this error.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Intake(e) => e.error_code(),
            Self::Read(e) => e.error_code(),
            Self::Header(_) => "HEADER_NOT_FOUND",
            Self::Storage(e) => e.error_code(),
            Self::Store(e) => e.error_code(),
            Self::Upload(_) => "INVALID_UPLOAD_STATE",
            Self::Consolidation(_) => "CONSOLIDATION_FAILED",
            Self::Timeout { .. } => "STAGE_TIMEOUT",
            Self::NotReprocessable { .. } => "NOT_REPROCESSABLE",
            Self::ReasonRequired => "REASON_REQUIRED",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Returns true if running the same upload again may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout { .. } => true,
            Self::Storage(e) => e.is_transient(),
            Self::Store(e) => e.is_transient(),
            _ => false,
        }
    }
}

impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        let message = err.to_string();
        match err {
            PipelineError::Intake(_)
            | PipelineError::Read(_)
            | PipelineError::Header(_)
            | PipelineError::ReasonRequired => Self::Validation(message),
            PipelineError::Storage(StorageError::NotFound { .. })
            | PipelineError::Store(StoreError::NotFound { .. }) => Self::NotFound(message),
            PipelineError::Storage(StorageError::FileTooLarge { .. })
            | PipelineError::Storage(StorageError::UnsupportedExtension { .. }) => {
                Self::Validation(message)
            }
            PipelineError::Storage(_) => Self::Storage(message),
            PipelineError::Store(StoreError::Conflict(_)) => Self::Conflict(message),
            PipelineError::Store(_) => Self::Database(message),
            PipelineError::Upload(_) | PipelineError::NotReprocessable { .. } => {
                Self::BusinessRule(message)
            }
            PipelineError::Consolidation(_) | PipelineError::Internal(_) => {
                Self::Internal(message)
            }
            PipelineError::Timeout { .. } => Self::Conflict(message),
        }
    }
}
