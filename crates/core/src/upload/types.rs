//! Upload domain types.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use ledgerline_shared::types::{ClientId, ClosureId, Period, UploadId};

use super::summary::ProcessingSummary;

/// Upload processing state.
///
/// The valid transitions are:
/// - Received → Processing → Completed | Error
/// - Received → Reprocessing → Completed | Error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadState {
    /// Stored, not yet picked up.
    Received,
    /// First pipeline run in progress.
    Processing,
    /// Reprocessing iteration in progress.
    Reprocessing,
    /// Finished (possibly with row warnings).
    Completed,
    /// Aborted with a fatal error.
    Error,
}

impl UploadState {
    /// Returns the string representation of the state.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::Processing => "processing",
            Self::Reprocessing => "reprocessing",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }

    /// Parses a state from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "received" => Some(Self::Received),
            "processing" => Some(Self::Processing),
            "reprocessing" => Some(Self::Reprocessing),
            "completed" => Some(Self::Completed),
            "error" => Some(Self::Error),
            _ => None,
        }
    }

    /// Returns true for states that accept no further transition.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }

    /// Returns true while a run is in progress.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        matches!(self, Self::Processing | Self::Reprocessing)
    }
}

impl fmt::Display for UploadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A validated state change with its audit data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadTransition {
    /// A run started.
    Start {
        /// Processing or Reprocessing.
        new_state: UploadState,
        /// When the run started.
        started_at: DateTime<Utc>,
    },
    /// A run completed.
    Complete {
        /// Completed.
        new_state: UploadState,
        /// When the run completed.
        completed_at: DateTime<Utc>,
        /// Semicolon-joined row warnings, if any.
        warnings: Option<String>,
    },
    /// A run failed.
    Fail {
        /// Error.
        new_state: UploadState,
        /// When the run failed.
        failed_at: DateTime<Utc>,
        /// Top-line error message.
        message: String,
    },
}

impl UploadTransition {
    /// Returns the new state resulting from this transition.
    #[must_use]
    pub const fn new_state(&self) -> UploadState {
        match self {
            Self::Start { new_state, .. }
            | Self::Complete { new_state, .. }
            | Self::Fail { new_state, .. } => *new_state,
        }
    }

    /// Text stored in the upload's error field after the transition.
    #[must_use]
    pub fn error_text(&self) -> Option<&str> {
        match self {
            Self::Start { .. } => None,
            Self::Complete { warnings, .. } => warnings.as_deref(),
            Self::Fail { message, .. } => Some(message),
        }
    }

    /// When the transition happened.
    #[must_use]
    pub const fn at(&self) -> DateTime<Utc> {
        match self {
            Self::Start { started_at, .. } => *started_at,
            Self::Complete { completed_at, .. } => *completed_at,
            Self::Fail { failed_at, .. } => *failed_at,
        }
    }
}

/// Intake data for a new upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUpload {
    /// Owning client.
    pub client_id: ClientId,
    /// Closure the upload belongs to.
    pub closure_id: ClosureId,
    /// Accounting period.
    pub period: Period,
    /// Filename as uploaded.
    pub original_filename: String,
    /// Object storage key.
    pub storage_path: String,
    /// SHA-256 of the uploaded bytes.
    pub content_hash: String,
}

/// One uploaded ledger file and one iteration of its series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadRecord {
    /// Upload identifier.
    pub id: UploadId,
    /// Owning client.
    pub client_id: ClientId,
    /// Closure the upload belongs to.
    pub closure_id: ClosureId,
    /// Accounting period.
    pub period: Period,
    /// Filename as uploaded.
    pub original_filename: String,
    /// Object storage key.
    pub storage_path: String,
    /// SHA-256 of the uploaded bytes.
    pub content_hash: String,
    /// Processing state.
    pub state: UploadState,
    /// Fatal error, or semicolon-joined row warnings after completion.
    pub error: Option<String>,
    /// Structured summary of the last run.
    pub summary: Option<ProcessingSummary>,
    /// Iteration number within the (client, closure) series, from 1.
    pub iteration: u32,
    /// True for the series' current iteration.
    pub is_principal: bool,
    /// Upload whose parsed movements this iteration evaluates.
    pub source_upload_id: UploadId,
    /// Why this iteration was requested.
    pub reprocess_reason: Option<String>,
    /// Who requested this iteration.
    pub reprocessed_by: Option<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update time.
    pub updated_at: DateTime<Utc>,
}

impl UploadRecord {
    /// Builds the first iteration of a series in state `Received`.
    #[must_use]
    pub fn received(new: NewUpload) -> Self {
        let id = UploadId::new();
        let now = Utc::now();
        Self {
            id,
            client_id: new.client_id,
            closure_id: new.closure_id,
            period: new.period,
            original_filename: new.original_filename,
            storage_path: new.storage_path,
            content_hash: new.content_hash,
            state: UploadState::Received,
            error: None,
            summary: None,
            iteration: 1,
            is_principal: true,
            source_upload_id: id,
            reprocess_reason: None,
            reprocessed_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Builds the next iteration of `previous`'s series in state `Reprocessing`.
    #[must_use]
    pub fn next_iteration(previous: &Self, iteration: u32, reason: &str, actor: &str) -> Self {
        let now = Utc::now();
        Self {
            id: UploadId::new(),
            state: UploadState::Reprocessing,
            error: None,
            summary: None,
            iteration,
            is_principal: false,
            source_upload_id: previous.source_upload_id,
            reprocess_reason: Some(reason.to_string()),
            reprocessed_by: Some(actor.to_string()),
            created_at: now,
            updated_at: now,
            ..previous.clone()
        }
    }

    /// Applies a validated transition.
    pub fn apply(&mut self, transition: &UploadTransition) {
        self.state = transition.new_state();
        self.error = transition.error_text().map(str::to_string);
        self.updated_at = transition.at();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_upload() -> NewUpload {
        NewUpload {
            client_id: ClientId::new(),
            closure_id: ClosureId::new(),
            period: "202403".parse().unwrap(),
            original_filename: "761234567_LibroMayor_202403.xlsx".to_string(),
            storage_path: "c/202403/u/761234567_LibroMayor_202403.xlsx".to_string(),
            content_hash: "ab".repeat(32),
        }
    }

    #[test]
    fn test_state_names() {
        for state in [
            UploadState::Received,
            UploadState::Processing,
            UploadState::Reprocessing,
            UploadState::Completed,
            UploadState::Error,
        ] {
            assert_eq!(UploadState::parse(state.as_str()), Some(state));
        }
        assert_eq!(UploadState::parse("PROCESSING"), Some(UploadState::Processing));
        assert_eq!(UploadState::parse("done"), None);
        assert!(UploadState::Completed.is_terminal());
        assert!(UploadState::Reprocessing.is_running());
    }

    #[test]
    fn test_received_record_is_its_own_source() {
        let record = UploadRecord::received(new_upload());
        assert_eq!(record.iteration, 1);
        assert!(record.is_principal);
        assert_eq!(record.source_upload_id, record.id);
        assert_eq!(record.state, UploadState::Received);
    }

    #[test]
    fn test_next_iteration_keeps_series_and_source() {
        let first = UploadRecord::received(new_upload());
        let second = UploadRecord::next_iteration(&first, 2, "catalog fixed", "analyst@firm");
        assert_ne!(second.id, first.id);
        assert_eq!(second.iteration, 2);
        assert_eq!(second.state, UploadState::Reprocessing);
        assert!(!second.is_principal);
        assert_eq!(second.source_upload_id, first.id);
        assert_eq!(second.closure_id, first.closure_id);
        assert_eq!(second.reprocess_reason.as_deref(), Some("catalog fixed"));
    }
}
