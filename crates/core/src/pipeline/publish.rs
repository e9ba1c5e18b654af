//! Cache snapshots written after a run.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use ledgerline_shared::types::UploadId;

use crate::cache::{SnapshotCache, SnapshotKind};
use crate::incidence::{ConsolidatedIncidence, IncidenceKind, Severity};
use crate::upload::{ProcessingSummary, UploadRecord, UploadState};

/// `processing-status` snapshot of a period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingStatus {
    /// Upload the status describes.
    pub upload_id: UploadId,
    /// Iteration number.
    pub iteration: u32,
    /// Upload state.
    pub state: UploadState,
    /// Error or warning text.
    pub error: Option<String>,
    /// Run summary, when the run got that far.
    pub summary: Option<ProcessingSummary>,
    /// Last state change.
    pub updated_at: DateTime<Utc>,
}

impl From<&UploadRecord> for ProcessingStatus {
    fn from(upload: &UploadRecord) -> Self {
        Self {
            upload_id: upload.id,
            iteration: upload.iteration,
            state: upload.state,
            error: upload.error.clone(),
            summary: upload.summary.clone(),
            updated_at: upload.updated_at,
        }
    }
}

/// One entry of the `alerts` snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    /// Incidence kind.
    pub kind: IncidenceKind,
    /// Sub-code.
    pub sub_code: Option<String>,
    /// Severity.
    pub severity: Severity,
    /// Affected elements.
    pub affected_count: usize,
}

impl From<&ConsolidatedIncidence> for Alert {
    fn from(incidence: &ConsolidatedIncidence) -> Self {
        Self {
            kind: incidence.kind,
            sub_code: incidence.sub_code.clone(),
            severity: incidence.severity,
            affected_count: incidence.affected_count,
        }
    }
}

/// Alerts ordered by severity, most severe first.
#[must_use]
pub fn alerts(incidences: &[ConsolidatedIncidence]) -> Vec<Alert> {
    let mut alerts: Vec<Alert> = incidences.iter().map(Alert::from).collect();
    alerts.sort_by(|a, b| b.severity.cmp(&a.severity));
    alerts
}

/// Writes the status snapshot and, when given, the alerts snapshot.
///
/// Runs after the upload's outcome is durable. Cache failures and a backend
/// slower than `budget` are logged and never propagate.
pub(crate) async fn publish(
    cache: Option<&SnapshotCache>,
    upload: &UploadRecord,
    incidences: Option<&[ConsolidatedIncidence]>,
    budget: Duration,
) {
    let Some(cache) = cache else {
        return;
    };

    if tokio::time::timeout(budget, write_snapshots(cache, upload, incidences))
        .await
        .is_err()
    {
        warn!(
            upload_id = %upload.id,
            timeout_secs = budget.as_secs(),
            "snapshot publication timed out"
        );
    }
}

async fn write_snapshots(
    cache: &SnapshotCache,
    upload: &UploadRecord,
    incidences: Option<&[ConsolidatedIncidence]>,
) {
    let status = ProcessingStatus::from(upload);
    if let Err(err) = cache
        .put(
            upload.client_id,
            upload.period,
            SnapshotKind::ProcessingStatus,
            &status,
            None,
        )
        .await
    {
        warn!(upload_id = %upload.id, error = %err, "failed to publish processing status");
    }

    if let Some(incidences) = incidences {
        if let Err(err) = cache
            .put(
                upload.client_id,
                upload.period,
                SnapshotKind::Alerts,
                &alerts(incidences),
                None,
            )
            .await
        {
            warn!(upload_id = %upload.id, error = %err, "failed to publish alerts");
        }
    }
}
