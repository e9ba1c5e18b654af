//! Durable state behind the pipeline.
//!
//! [`LedgerStore`] is the seam between the pipeline and persistence. The
//! PostgreSQL implementation lives in `ledgerline-db`; [`MemoryStore`] keeps
//! everything in process for tests and dry runs.
//!
//! # Modules
//!
//! - `error` - Store error type
//! - `memory` - In-process implementation

mod error;
mod memory;

pub use error::StoreError;
pub use memory::MemoryStore;

use async_trait::async_trait;

use ledgerline_shared::types::{ClientId, ClosureId, UploadId};

use crate::catalog::CatalogSnapshot;
use crate::incidence::ConsolidatedIncidence;
use crate::iteration::ReprocessingHistoryEntry;
use crate::ledger::{Account, ClientProfile, Movement};
use crate::parser::ParsedLedger;
use crate::upload::UploadRecord;
use crate::validation::{EnrichmentOutcome, ExceptionSet};

/// Counts written by [`LedgerStore::replace_ledger`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerWrite {
    /// Account codes this upload saw for the first time.
    pub new_account_codes: Vec<String>,
    /// Distinct accounts referenced by the file.
    pub accounts: usize,
    /// Opening balances upserted.
    pub opening_balances: usize,
    /// Movements inserted.
    pub movements: usize,
}

/// Everything a reprocessing run writes, applied in one transaction.
#[derive(Debug, Clone, Copy)]
pub struct IterationCommit<'a> {
    /// The new iteration, already in its final state.
    pub upload: &'a UploadRecord,
    /// Principal iteration being superseded.
    pub previous_upload_id: UploadId,
    /// Flags and account enrichment for the source movements.
    pub enrichment: &'a EnrichmentOutcome,
    /// Incidences of the new iteration.
    pub incidences: &'a [ConsolidatedIncidence],
    /// History entry for the run.
    pub history: &'a ReprocessingHistoryEntry,
}

/// Persistence operations used by the pipeline.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Loads a client profile.
    async fn client_profile(&self, client_id: ClientId) -> Result<ClientProfile, StoreError>;

    /// Inserts a new upload record.
    async fn create_upload(&self, upload: &UploadRecord) -> Result<(), StoreError>;

    /// Loads an upload record.
    async fn get_upload(&self, upload_id: UploadId) -> Result<UploadRecord, StoreError>;

    /// Persists state, error text, summary and timestamps of an upload.
    async fn update_upload(&self, upload: &UploadRecord) -> Result<(), StoreError>;

    /// Every iteration of a (client, closure) series, ordered by iteration.
    async fn series(
        &self,
        client_id: ClientId,
        closure_id: ClosureId,
    ) -> Result<Vec<UploadRecord>, StoreError>;

    /// Reference catalogs as seen by one client.
    async fn load_catalogs(&self, client_id: ClientId) -> Result<CatalogSnapshot, StoreError>;

    /// Active validation exceptions of a client.
    async fn load_exceptions(&self, client_id: ClientId) -> Result<ExceptionSet, StoreError>;

    /// Replaces the ledger rows of an upload with a freshly parsed ledger.
    ///
    /// Accounts are created on first sight; opening balances are upserted per
    /// (closure, account) and remember the row they replaced. Calling this
    /// twice for the same upload leaves the same rows as calling it once.
    async fn replace_ledger(
        &self,
        upload: &UploadRecord,
        ledger: &ParsedLedger,
    ) -> Result<LedgerWrite, StoreError>;

    /// Deletes the movements, opening balances, incidences and accounts an
    /// upload created. Opening balances it replaced go back to the upload
    /// that wrote them before.
    async fn discard_ledger(&self, upload_id: UploadId) -> Result<(), StoreError>;

    /// All accounts of a client.
    async fn accounts(&self, client_id: ClientId) -> Result<Vec<Account>, StoreError>;

    /// Movements parsed by an upload, in file order.
    async fn movements(&self, upload_id: UploadId) -> Result<Vec<Movement>, StoreError>;

    /// Writes account enrichment and movement flags.
    async fn apply_enrichment(&self, outcome: &EnrichmentOutcome) -> Result<(), StoreError>;

    /// Active incidences of an upload.
    async fn active_incidences(
        &self,
        upload_id: UploadId,
    ) -> Result<Vec<ConsolidatedIncidence>, StoreError>;

    /// Replaces the incidences of an upload.
    async fn replace_incidences(
        &self,
        upload_id: UploadId,
        incidences: &[ConsolidatedIncidence],
    ) -> Result<(), StoreError>;

    /// Allocates the next iteration of the previous upload's series and
    /// inserts it in state `reprocessing`. Iteration numbers never repeat
    /// within a series, even under concurrent callers.
    async fn begin_iteration(
        &self,
        previous: &UploadRecord,
        reason: &str,
        actor: &str,
    ) -> Result<UploadRecord, StoreError>;

    /// Makes an upload the only principal iteration of its series.
    async fn promote_principal(&self, upload_id: UploadId) -> Result<(), StoreError>;

    /// Obsoletes the previous iteration's incidences, stores the new ones,
    /// appends history and moves the principal flag, atomically.
    async fn commit_iteration(&self, commit: IterationCommit<'_>) -> Result<(), StoreError>;

    /// Reprocessing history of a series, oldest first.
    async fn history(
        &self,
        client_id: ClientId,
        closure_id: ClosureId,
    ) -> Result<Vec<ReprocessingHistoryEntry>, StoreError>;
}
