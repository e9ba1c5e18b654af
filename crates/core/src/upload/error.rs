//! Upload error types.

use thiserror::Error;

use super::types::UploadState;

/// Errors changing an upload's state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UploadError {
    /// Attempted a transition the lifecycle does not allow.
    #[error("Invalid upload state transition from {from} to {to}")]
    InvalidTransition {
        /// Current state.
        from: UploadState,
        /// Attempted target state.
        to: UploadState,
    },

    /// Failing an upload requires a message.
    #[error("Error message is required when failing an upload")]
    ErrorMessageRequired,
}

impl UploadError {
    /// Returns the error code for logs.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidTransition { .. } => "INVALID_UPLOAD_TRANSITION",
            Self::ErrorMessageRequired => "ERROR_MESSAGE_REQUIRED",
        }
    }
}
