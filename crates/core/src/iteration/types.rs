//! Reprocessing request, outcome and history types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use ledgerline_shared::types::{HistoryEntryId, UploadId};

use super::diff::IterationDiff;

/// A request to re-evaluate an upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReprocessRequest {
    /// Any upload of the series; the principal iteration is evaluated.
    pub upload_id: UploadId,
    /// Why reprocessing was requested.
    pub reason: String,
    /// Who requested it.
    pub actor: String,
}

/// Result of a reprocessing run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IterationOutcome {
    /// The new iteration's upload id.
    pub upload_id: UploadId,
    /// The new iteration number.
    pub iteration: u32,
    /// The upload that was principal before.
    pub previous_upload_id: UploadId,
    /// Incidence diff against the previous iteration.
    pub diff: IterationDiff,
    /// Movements whose incomplete flag was cleared.
    pub movements_corrected: usize,
}

/// Append-only record of one reprocessing run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReprocessingHistoryEntry {
    /// Entry identifier.
    pub id: HistoryEntryId,
    /// The new iteration's upload id.
    pub upload_id: UploadId,
    /// The upload that was principal before.
    pub previous_upload_id: UploadId,
    /// Iteration number.
    pub iteration: u32,
    /// Active incidences before the run.
    pub previous_incidences: usize,
    /// Incidences after the run.
    pub current_incidences: usize,
    /// Incidences absent before.
    pub new_incidences: usize,
    /// Fully or partially resolved incidences.
    pub resolved_incidences: usize,
    /// Incidences whose count grew.
    pub worsened_incidences: usize,
    /// Movements whose incomplete flag was cleared.
    pub movements_corrected: usize,
    /// Run time in milliseconds.
    pub duration_ms: u64,
    /// Why reprocessing was requested.
    pub reason: String,
    /// Who requested it.
    pub actor: String,
    /// Full diff detail.
    pub diff: IterationDiff,
    /// When the entry was written.
    pub created_at: DateTime<Utc>,
}

impl ReprocessingHistoryEntry {
    /// Builds the entry for a finished run.
    #[must_use]
    pub fn record(
        outcome: &IterationOutcome,
        previous_incidences: usize,
        current_incidences: usize,
        duration_ms: u64,
        request: &ReprocessRequest,
    ) -> Self {
        Self {
            id: HistoryEntryId::new(),
            upload_id: outcome.upload_id,
            previous_upload_id: outcome.previous_upload_id,
            iteration: outcome.iteration,
            previous_incidences,
            current_incidences,
            new_incidences: outcome.diff.new.len(),
            resolved_incidences: outcome.diff.resolved.len(),
            worsened_incidences: outcome.diff.worsened.len(),
            movements_corrected: outcome.movements_corrected,
            duration_ms,
            reason: request.reason.clone(),
            actor: request.actor.clone(),
            diff: outcome.diff.clone(),
            created_at: Utc::now(),
        }
    }
}
