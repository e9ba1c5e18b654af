//! Ledger ingestion pipeline.
//!
//! A run takes one upload id through the ordered stages in [`Stage`], each
//! under the configured wall-clock budget. A fatal error in any stage
//! deletes the upload's ledger rows and leaves the upload in `error` with a
//! single message. Reprocessing re-evaluates an existing upload's movements
//! as a new iteration of the same series.
//!
//! # Modules
//!
//! - `error` - Pipeline error umbrella
//! - `stage` - Stage order and timeouts
//! - `ingest` - Intake and first-run stages
//! - `reprocess` - Iteration runs and diffs
//! - `publish` - Cache snapshots

mod error;
mod ingest;
mod publish;
mod reprocess;
mod stage;

#[cfg(test)]
mod tests;

pub use error::PipelineError;
pub use ingest::SubmitRequest;
pub use publish::{Alert, ProcessingStatus, alerts};
pub use stage::Stage;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use ledgerline_shared::config::PipelineSettings;
use ledgerline_shared::types::UploadId;

use crate::cache::SnapshotCache;
use crate::catalog::CatalogSnapshot;
use crate::incidence::{ConsolidatedIncidence, IncidenceConsolidator};
use crate::iteration::{IterationLocks, ReprocessingHistoryEntry};
use crate::store::LedgerStore;
use crate::upload::UploadRecord;
use crate::validation::{EnrichmentError, ExceptionSet};

/// An upload with its active incidences and its series history.
#[derive(Debug, Clone)]
pub struct UploadStatus {
    /// The upload.
    pub upload: UploadRecord,
    /// Other iterations of the same series, by iteration.
    pub series: Vec<UploadRecord>,
    /// Active incidences of the upload.
    pub incidences: Vec<ConsolidatedIncidence>,
    /// Reprocessing history of the series.
    pub history: Vec<ReprocessingHistoryEntry>,
}

/// Runs ingestion and reprocessing against a store, a file store and an
/// optional snapshot cache. Cheap to clone; clones share locks.
#[derive(Clone)]
pub struct LedgerPipeline {
    store: Arc<dyn LedgerStore>,
    storage: crate::storage::StorageService,
    cache: Option<SnapshotCache>,
    settings: Arc<PipelineSettings>,
    consolidator: IncidenceConsolidator,
    iteration_locks: Arc<IterationLocks>,
}

impl std::fmt::Debug for LedgerPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedgerPipeline")
            .field("storage", &self.storage)
            .field("cache", &self.cache.is_some())
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl LedgerPipeline {
    /// Creates a pipeline without a snapshot cache.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::Consolidation` for a zero sample size.
    pub fn new(
        store: Arc<dyn LedgerStore>,
        storage: crate::storage::StorageService,
        settings: PipelineSettings,
    ) -> Result<Self, PipelineError> {
        let consolidator = IncidenceConsolidator::new(settings.sample_size)?;
        Ok(Self {
            store,
            storage,
            cache: None,
            settings: Arc::new(settings),
            consolidator,
            iteration_locks: Arc::new(IterationLocks::new()),
        })
    }

    /// Publishes snapshots to `cache` after each run.
    #[must_use]
    pub fn with_cache(mut self, cache: SnapshotCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// The underlying store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn LedgerStore> {
        &self.store
    }

    /// Loads an upload, its series, active incidences and history.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::Store` if the upload does not exist.
    pub async fn status(&self, upload_id: UploadId) -> Result<UploadStatus, PipelineError> {
        let upload = self.store.get_upload(upload_id).await?;
        let series = self.store.series(upload.client_id, upload.closure_id).await?;
        let incidences = self.store.active_incidences(upload_id).await?;
        let history = self.store.history(upload.client_id, upload.closure_id).await?;
        Ok(UploadStatus {
            upload,
            series,
            incidences,
            history,
        })
    }

    fn stage_budget(&self) -> Duration {
        Duration::from_secs(self.settings.stage_timeout_secs)
    }

    /// Loads catalogs and exceptions for a run. Either one failing degrades
    /// to an empty snapshot; the flag reports whether that happened.
    async fn load_reference_data(
        &self,
        client_id: ledgerline_shared::types::ClientId,
    ) -> (CatalogSnapshot, ExceptionSet, bool) {
        let mut degraded = false;

        let catalogs = match self.store.load_catalogs(client_id).await {
            Ok(catalogs) => catalogs,
            Err(err) => {
                let err = EnrichmentError::CatalogUnavailable {
                    catalog: "reference catalogs".to_string(),
                    reason: err.to_string(),
                };
                tracing::warn!(%client_id, error = %err, "running with empty catalogs");
                degraded = true;
                CatalogSnapshot::unavailable()
            }
        };

        let exceptions = match self.store.load_exceptions(client_id).await {
            Ok(exceptions) => exceptions,
            Err(err) => {
                let err = EnrichmentError::ExceptionsUnavailable(err.to_string());
                tracing::warn!(%client_id, error = %err, "running without exceptions");
                degraded = true;
                ExceptionSet::default()
            }
        };

        (catalogs, exceptions, degraded)
    }
}

fn severity_counts(incidences: &[ConsolidatedIncidence]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for incidence in incidences {
        *counts
            .entry(incidence.severity.as_str().to_string())
            .or_insert(0) += 1;
    }
    counts
}
