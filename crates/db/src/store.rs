//! PostgreSQL implementation of the pipeline's [`LedgerStore`].

use async_trait::async_trait;
use sea_orm::{DatabaseConnection, TransactionTrait};
use tracing::debug;

use ledgerline_core::catalog::CatalogSnapshot;
use ledgerline_core::incidence::ConsolidatedIncidence;
use ledgerline_core::iteration::ReprocessingHistoryEntry;
use ledgerline_core::ledger::{Account, ClientProfile, Movement};
use ledgerline_core::parser::ParsedLedger;
use ledgerline_core::store::{IterationCommit, LedgerStore, LedgerWrite, StoreError};
use ledgerline_core::upload::UploadRecord;
use ledgerline_core::validation::{EnrichmentOutcome, ExceptionSet};
use ledgerline_shared::types::{ClientId, ClosureId, UploadId};

use crate::error::RepositoryError;
use crate::repositories::{
    IncidenceRepository, LedgerRepository, ReferenceRepository, UploadRepository, incidence,
    ledger, upload,
};

/// [`LedgerStore`] over a `SeaORM` PostgreSQL connection.
#[derive(Debug, Clone)]
pub struct PgLedgerStore {
    db: DatabaseConnection,
    reference: ReferenceRepository,
    uploads: UploadRepository,
    ledger: LedgerRepository,
    incidences: IncidenceRepository,
}

impl PgLedgerStore {
    /// Creates a store over an open connection.
    #[must_use]
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            reference: ReferenceRepository::new(db.clone()),
            uploads: UploadRepository::new(db.clone()),
            ledger: LedgerRepository::new(db.clone()),
            incidences: IncidenceRepository::new(db.clone()),
            db,
        }
    }

    /// Reference data repository.
    #[must_use]
    pub const fn reference(&self) -> &ReferenceRepository {
        &self.reference
    }

    /// Ledger repository.
    #[must_use]
    pub const fn ledger(&self) -> &LedgerRepository {
        &self.ledger
    }

    async fn commit(&self, commit: IterationCommit<'_>) -> Result<(), RepositoryError> {
        let upload = commit.upload;
        let txn = self.db.begin().await?;
        upload::lock_series(&txn, upload.client_id, upload.closure_id).await?;

        let obsoleted = incidence::obsolete_in(&txn, commit.previous_upload_id).await?;
        incidence::replace_in(&txn, upload.id, commit.incidences).await?;
        ledger::apply_enrichment_in(&txn, commit.enrichment).await?;
        incidence::append_history_in(&txn, upload.client_id, upload.closure_id, commit.history)
            .await?;
        upload::update_status_in(&txn, upload).await?;
        upload::promote_in(&txn, upload).await?;

        txn.commit().await?;
        debug!(
            upload_id = %upload.id,
            previous_upload_id = %commit.previous_upload_id,
            obsoleted,
            "iteration committed"
        );
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    async fn client_profile(&self, client_id: ClientId) -> Result<ClientProfile, StoreError> {
        Ok(self.reference.client_profile(client_id).await?)
    }

    async fn create_upload(&self, upload: &UploadRecord) -> Result<(), StoreError> {
        Ok(self.uploads.create(upload).await?)
    }

    async fn get_upload(&self, upload_id: UploadId) -> Result<UploadRecord, StoreError> {
        Ok(self.uploads.get(upload_id).await?)
    }

    async fn update_upload(&self, upload: &UploadRecord) -> Result<(), StoreError> {
        Ok(self.uploads.update_status(upload).await?)
    }

    async fn series(
        &self,
        client_id: ClientId,
        closure_id: ClosureId,
    ) -> Result<Vec<UploadRecord>, StoreError> {
        Ok(self.uploads.series(client_id, closure_id).await?)
    }

    async fn load_catalogs(&self, client_id: ClientId) -> Result<CatalogSnapshot, StoreError> {
        Ok(self.reference.catalogs(client_id).await?)
    }

    async fn load_exceptions(&self, client_id: ClientId) -> Result<ExceptionSet, StoreError> {
        Ok(self.reference.exceptions(client_id).await?)
    }

    async fn replace_ledger(
        &self,
        upload: &UploadRecord,
        ledger: &ParsedLedger,
    ) -> Result<LedgerWrite, StoreError> {
        Ok(self.ledger.replace(upload, ledger).await?)
    }

    async fn discard_ledger(&self, upload_id: UploadId) -> Result<(), StoreError> {
        Ok(self.ledger.discard(upload_id).await?)
    }

    async fn accounts(&self, client_id: ClientId) -> Result<Vec<Account>, StoreError> {
        Ok(self.ledger.accounts(client_id).await?)
    }

    async fn movements(&self, upload_id: UploadId) -> Result<Vec<Movement>, StoreError> {
        Ok(self.ledger.movements(upload_id).await?)
    }

    async fn apply_enrichment(&self, outcome: &EnrichmentOutcome) -> Result<(), StoreError> {
        Ok(self.ledger.apply_enrichment(outcome).await?)
    }

    async fn active_incidences(
        &self,
        upload_id: UploadId,
    ) -> Result<Vec<ConsolidatedIncidence>, StoreError> {
        Ok(self.incidences.active(upload_id).await?)
    }

    async fn replace_incidences(
        &self,
        upload_id: UploadId,
        incidences: &[ConsolidatedIncidence],
    ) -> Result<(), StoreError> {
        Ok(self.incidences.replace(upload_id, incidences).await?)
    }

    async fn begin_iteration(
        &self,
        previous: &UploadRecord,
        reason: &str,
        actor: &str,
    ) -> Result<UploadRecord, StoreError> {
        Ok(self.uploads.begin_iteration(previous, reason, actor).await?)
    }

    async fn promote_principal(&self, upload_id: UploadId) -> Result<(), StoreError> {
        Ok(self.uploads.promote(upload_id).await?)
    }

    async fn commit_iteration(&self, commit: IterationCommit<'_>) -> Result<(), StoreError> {
        Ok(self.commit(commit).await?)
    }

    async fn history(
        &self,
        client_id: ClientId,
        closure_id: ClosureId,
    ) -> Result<Vec<ReprocessingHistoryEntry>, StoreError> {
        Ok(self.incidences.history(client_id, closure_id).await?)
    }
}
