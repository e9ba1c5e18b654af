//! Upload lifecycle transitions.
//!
//! Terminal states (`completed`, `error`) reject every transition. A
//! further attempt on the same file is a new iteration with its own record.

use chrono::Utc;

use super::error::UploadError;
use super::types::{UploadState, UploadTransition};

/// Stateless service validating upload state transitions.
pub struct UploadLifecycle;

impl UploadLifecycle {
    /// Starts the first pipeline run of a received upload.
    ///
    /// # Returns
    /// * `Ok(UploadTransition::Start)` with `Processing`
    /// * `Err(UploadError::InvalidTransition)` unless the upload is `Received`
    pub fn start_processing(current: UploadState) -> Result<UploadTransition, UploadError> {
        Self::start(current, UploadState::Processing)
    }

    /// Starts a reprocessing run of a received iteration.
    ///
    /// # Returns
    /// * `Ok(UploadTransition::Start)` with `Reprocessing`
    /// * `Err(UploadError::InvalidTransition)` unless the upload is `Received`
    pub fn start_reprocessing(current: UploadState) -> Result<UploadTransition, UploadError> {
        Self::start(current, UploadState::Reprocessing)
    }

    /// Completes a running upload, recording row warnings if any.
    ///
    /// # Returns
    /// * `Ok(UploadTransition::Complete)` from `Processing` or `Reprocessing`
    /// * `Err(UploadError::InvalidTransition)` otherwise
    pub fn complete(
        current: UploadState,
        warnings: Option<String>,
    ) -> Result<UploadTransition, UploadError> {
        if !current.is_running() {
            return Err(UploadError::InvalidTransition {
                from: current,
                to: UploadState::Completed,
            });
        }
        Ok(UploadTransition::Complete {
            new_state: UploadState::Completed,
            completed_at: Utc::now(),
            warnings: warnings.filter(|w| !w.trim().is_empty()),
        })
    }

    /// Fails a running upload with one top-line message.
    ///
    /// # Returns
    /// * `Ok(UploadTransition::Fail)` from `Processing` or `Reprocessing`
    /// * `Err(UploadError::ErrorMessageRequired)` if the message is blank
    /// * `Err(UploadError::InvalidTransition)` otherwise
    pub fn fail(current: UploadState, message: String) -> Result<UploadTransition, UploadError> {
        if message.trim().is_empty() {
            return Err(UploadError::ErrorMessageRequired);
        }
        if !current.is_running() {
            return Err(UploadError::InvalidTransition {
                from: current,
                to: UploadState::Error,
            });
        }
        Ok(UploadTransition::Fail {
            new_state: UploadState::Error,
            failed_at: Utc::now(),
            message,
        })
    }

    fn start(current: UploadState, to: UploadState) -> Result<UploadTransition, UploadError> {
        match current {
            UploadState::Received => Ok(UploadTransition::Start {
                new_state: to,
                started_at: Utc::now(),
            }),
            _ => Err(UploadError::InvalidTransition { from: current, to }),
        }
    }
}
