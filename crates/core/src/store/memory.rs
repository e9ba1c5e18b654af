//! In-process [`LedgerStore`].
//!
//! One mutex guards the whole state, so every trait call behaves like a
//! single transaction.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio::sync::Mutex;

use ledgerline_shared::types::{AccountId, ClientId, ClosureId, MovementId, UploadId};

use super::{IterationCommit, LedgerStore, LedgerWrite, StoreError};
use crate::catalog::{
    CatalogSnapshot, ClassificationCatalog, DocumentTypeCatalog, EnglishNameCatalog,
};
use crate::incidence::ConsolidatedIncidence;
use crate::iteration::ReprocessingHistoryEntry;
use crate::ledger::{Account, ClientProfile, Movement, OpeningBalance};
use crate::parser::ParsedLedger;
use crate::upload::UploadRecord;
use crate::validation::{EnrichmentOutcome, ExceptionKind, ExceptionSet, ValidationException};

/// Opening balance of one (closure, account), owned by the upload that
/// wrote it last.
#[derive(Debug, Clone)]
struct OpeningRow {
    owner: UploadId,
    balance: OpeningBalance,
    /// Owner and amount this row replaced, restored on discard.
    displaced: Option<(UploadId, Decimal)>,
}

#[derive(Debug, Default)]
struct State {
    clients: HashMap<ClientId, ClientProfile>,
    document_types: BTreeMap<String, String>,
    english_names: HashMap<ClientId, BTreeMap<String, String>>,
    classifications: HashMap<ClientId, Vec<(String, String, String)>>,
    exceptions: Vec<ValidationException>,
    catalogs_unavailable: bool,
    fail_incidence_writes: bool,
    uploads: HashMap<UploadId, UploadRecord>,
    accounts: Vec<Account>,
    openings: Vec<OpeningRow>,
    movements: Vec<Movement>,
    incidences: Vec<ConsolidatedIncidence>,
    history: Vec<(ClientId, ClosureId, ReprocessingHistoryEntry)>,
}

impl State {
    fn upload(&self, id: UploadId) -> Result<&UploadRecord, StoreError> {
        self.uploads
            .get(&id)
            .ok_or_else(|| StoreError::not_found("upload", id))
    }

    fn account_id(&self, client_id: ClientId, code: &str) -> Option<AccountId> {
        self.accounts
            .iter()
            .find(|a| a.client_id == client_id && a.code == code)
            .map(|a| a.id)
    }

    /// Returns the account id and whether this upload created it.
    fn ensure_account(&mut self, upload: &UploadRecord, code: &str, name: &str) -> (AccountId, bool) {
        if let Some(account) = self
            .accounts
            .iter()
            .find(|a| a.client_id == upload.client_id && a.code == code)
        {
            return (account.id, account.created_by_upload == Some(upload.id));
        }
        let account = Account {
            id: AccountId::new(),
            client_id: upload.client_id,
            code: code.to_string(),
            name: name.to_string(),
            english_name: None,
            classification: BTreeMap::new(),
            created_by_upload: Some(upload.id),
        };
        let id = account.id;
        self.accounts.push(account);
        (id, true)
    }

    /// Drops the opening balances an upload owns, handing displaced rows
    /// back to their previous owner.
    fn release_openings(&mut self, upload_id: UploadId) {
        self.openings.retain_mut(|row| {
            if row.owner != upload_id {
                return true;
            }
            match row.displaced.take() {
                Some((owner, amount)) => {
                    row.owner = owner;
                    row.balance.balance = amount;
                    true
                }
                None => false,
            }
        });
    }

    fn apply_enrichment(&mut self, outcome: &EnrichmentOutcome) {
        for update in &outcome.account_updates {
            if let Some(account) = self.accounts.iter_mut().find(|a| a.id == update.account_id) {
                if let Some(name) = &update.english_name {
                    account.english_name = Some(name.clone());
                }
                if let Some(classification) = &update.classification {
                    account.classification = classification.clone();
                }
            }
        }

        let by_id: HashMap<MovementId, _> = outcome
            .movements
            .iter()
            .map(|m| (m.movement_id, m))
            .collect();
        for movement in &mut self.movements {
            if let Some(result) = by_id.get(&movement.id) {
                movement.incomplete = result.incomplete;
                movement.document_type_ref = result.document_type_ref.clone();
            }
        }
    }
}

/// [`LedgerStore`] kept entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a client.
    pub async fn add_client(&self, profile: ClientProfile) {
        self.state.lock().await.clients.insert(profile.id, profile);
    }

    /// Adds a document type to the shared catalog.
    pub async fn add_document_type(&self, code: &str, description: &str) {
        self.state
            .lock()
            .await
            .document_types
            .insert(code.to_string(), description.to_string());
    }

    /// Adds an English name for one client's account.
    pub async fn add_english_name(&self, client_id: ClientId, account_code: &str, name: &str) {
        self.state
            .lock()
            .await
            .english_names
            .entry(client_id)
            .or_default()
            .insert(account_code.to_string(), name.to_string());
    }

    /// Adds a classification option for one client's account.
    pub async fn add_classification(
        &self,
        client_id: ClientId,
        account_code: &str,
        set: &str,
        option: &str,
    ) {
        self.state
            .lock()
            .await
            .classifications
            .entry(client_id)
            .or_default()
            .push((account_code.to_string(), set.to_string(), option.to_string()));
    }

    /// Adds a validation exception.
    pub async fn add_exception(&self, exception: ValidationException) {
        self.state.lock().await.exceptions.push(exception);
    }

    /// Removes a validation exception. Returns true if it existed.
    pub async fn revoke_exception(
        &self,
        client_id: ClientId,
        account_code: &str,
        kind: ExceptionKind,
    ) -> bool {
        let mut state = self.state.lock().await;
        let before = state.exceptions.len();
        state.exceptions.retain(|e| {
            !(e.client_id == client_id && e.account_code == account_code && e.kind == kind)
        });
        state.exceptions.len() != before
    }

    /// Makes catalog loading fail until reset.
    pub async fn set_catalogs_unavailable(&self, unavailable: bool) {
        self.state.lock().await.catalogs_unavailable = unavailable;
    }

    /// Makes incidence writes fail until reset.
    pub async fn set_fail_incidence_writes(&self, fail: bool) {
        self.state.lock().await.fail_incidence_writes = fail;
    }

    /// Opening balances currently stored for a closure.
    pub async fn opening_balances(&self, closure_id: ClosureId) -> Vec<OpeningBalance> {
        self.state
            .lock()
            .await
            .openings
            .iter()
            .filter(|row| row.balance.closure_id == closure_id)
            .map(|row| row.balance.clone())
            .collect()
    }

    /// Every incidence of an upload, active or not.
    pub async fn all_incidences(&self, upload_id: UploadId) -> Vec<ConsolidatedIncidence> {
        self.state
            .lock()
            .await
            .incidences
            .iter()
            .filter(|i| i.upload_id == upload_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn client_profile(&self, client_id: ClientId) -> Result<ClientProfile, StoreError> {
        self.state
            .lock()
            .await
            .clients
            .get(&client_id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("client", client_id))
    }

    async fn create_upload(&self, upload: &UploadRecord) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if state.uploads.contains_key(&upload.id) {
            return Err(StoreError::Conflict(format!("upload {} already exists", upload.id)));
        }
        if upload.is_principal {
            for other in state.uploads.values_mut() {
                if other.client_id == upload.client_id && other.closure_id == upload.closure_id {
                    other.is_principal = false;
                }
            }
        }
        state.uploads.insert(upload.id, upload.clone());
        Ok(())
    }

    async fn get_upload(&self, upload_id: UploadId) -> Result<UploadRecord, StoreError> {
        self.state.lock().await.upload(upload_id).cloned()
    }

    async fn update_upload(&self, upload: &UploadRecord) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        let stored = state
            .uploads
            .get_mut(&upload.id)
            .ok_or_else(|| StoreError::not_found("upload", upload.id))?;
        stored.state = upload.state;
        stored.error.clone_from(&upload.error);
        stored.summary.clone_from(&upload.summary);
        stored.updated_at = upload.updated_at;
        Ok(())
    }

    async fn series(
        &self,
        client_id: ClientId,
        closure_id: ClosureId,
    ) -> Result<Vec<UploadRecord>, StoreError> {
        let state = self.state.lock().await;
        let mut series: Vec<UploadRecord> = state
            .uploads
            .values()
            .filter(|u| u.client_id == client_id && u.closure_id == closure_id)
            .cloned()
            .collect();
        series.sort_by_key(|u| u.iteration);
        Ok(series)
    }

    async fn load_catalogs(&self, client_id: ClientId) -> Result<CatalogSnapshot, StoreError> {
        let state = self.state.lock().await;
        if state.catalogs_unavailable {
            return Err(StoreError::Backend("catalog tables unavailable".to_string()));
        }
        Ok(CatalogSnapshot {
            document_types: DocumentTypeCatalog::new(state.document_types.clone()),
            english_names: EnglishNameCatalog::new(
                state.english_names.get(&client_id).cloned().unwrap_or_default(),
            ),
            classifications: ClassificationCatalog::new(
                state
                    .classifications
                    .get(&client_id)
                    .cloned()
                    .unwrap_or_default(),
            ),
        })
    }

    async fn load_exceptions(&self, client_id: ClientId) -> Result<ExceptionSet, StoreError> {
        let state = self.state.lock().await;
        Ok(ExceptionSet::new(
            state
                .exceptions
                .iter()
                .filter(|e| e.client_id == client_id)
                .cloned(),
        ))
    }

    async fn replace_ledger(
        &self,
        upload: &UploadRecord,
        ledger: &ParsedLedger,
    ) -> Result<LedgerWrite, StoreError> {
        let mut state = self.state.lock().await;
        state.upload(upload.id)?;

        state.movements.retain(|m| m.upload_id != upload.id);
        state.release_openings(upload.id);

        let mut write = LedgerWrite::default();
        for parsed in &ledger.accounts {
            let (_, created) = state.ensure_account(upload, &parsed.code, &parsed.name);
            if created {
                write.new_account_codes.push(parsed.code.clone());
            }
        }
        write.accounts = ledger.accounts.len();

        for opening in &ledger.opening_balances {
            let (account_id, _) = state.ensure_account(upload, &opening.account_code, "");
            let existing = state.openings.iter().position(|row| {
                row.balance.closure_id == upload.closure_id && row.balance.account_id == account_id
            });
            let displaced = existing.and_then(|index| {
                let row = state.openings.swap_remove(index);
                if row.owner == upload.id {
                    row.displaced
                } else {
                    Some((row.owner, row.balance.balance))
                }
            });
            state.openings.push(OpeningRow {
                owner: upload.id,
                balance: OpeningBalance {
                    closure_id: upload.closure_id,
                    account_id,
                    account_code: opening.account_code.clone(),
                    balance: opening.balance,
                },
                displaced,
            });
            write.opening_balances += 1;
        }

        for parsed in &ledger.movements {
            let account_id = match state.account_id(upload.client_id, &parsed.account_code) {
                Some(id) => id,
                None => state.ensure_account(upload, &parsed.account_code, "").0,
            };
            state.movements.push(Movement {
                id: MovementId::new(),
                client_id: upload.client_id,
                closure_id: upload.closure_id,
                upload_id: upload.id,
                account_id,
                account_code: parsed.account_code.clone(),
                date: parsed.date,
                document_type: parsed.document_type.clone(),
                document_type_ref: None,
                document_number: parsed.document_number.clone(),
                debit: parsed.debit,
                credit: parsed.credit,
                description: parsed.description.clone(),
                cost_center: parsed.cost_center.clone(),
                auxiliary: parsed.auxiliary.clone(),
                internal_number: parsed.internal_number.clone(),
                row_number: parsed.row_number,
                incomplete: false,
            });
            write.movements += 1;
        }

        Ok(write)
    }

    async fn discard_ledger(&self, upload_id: UploadId) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        state.movements.retain(|m| m.upload_id != upload_id);
        state.release_openings(upload_id);
        state.incidences.retain(|i| i.upload_id != upload_id);

        let referenced: Vec<AccountId> = state.movements.iter().map(|m| m.account_id).collect();
        state.accounts.retain(|a| {
            a.created_by_upload != Some(upload_id) || referenced.contains(&a.id)
        });
        Ok(())
    }

    async fn accounts(&self, client_id: ClientId) -> Result<Vec<Account>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .accounts
            .iter()
            .filter(|a| a.client_id == client_id)
            .cloned()
            .collect())
    }

    async fn movements(&self, upload_id: UploadId) -> Result<Vec<Movement>, StoreError> {
        let state = self.state.lock().await;
        let mut movements: Vec<Movement> = state
            .movements
            .iter()
            .filter(|m| m.upload_id == upload_id)
            .cloned()
            .collect();
        movements.sort_by_key(|m| m.row_number);
        Ok(movements)
    }

    async fn apply_enrichment(&self, outcome: &EnrichmentOutcome) -> Result<(), StoreError> {
        self.state.lock().await.apply_enrichment(outcome);
        Ok(())
    }

    async fn active_incidences(
        &self,
        upload_id: UploadId,
    ) -> Result<Vec<ConsolidatedIncidence>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .incidences
            .iter()
            .filter(|i| i.upload_id == upload_id && i.active)
            .cloned()
            .collect())
    }

    async fn replace_incidences(
        &self,
        upload_id: UploadId,
        incidences: &[ConsolidatedIncidence],
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if state.fail_incidence_writes {
            return Err(StoreError::Backend("incidence table unavailable".to_string()));
        }
        state.incidences.retain(|i| i.upload_id != upload_id);
        state.incidences.extend_from_slice(incidences);
        Ok(())
    }

    async fn begin_iteration(
        &self,
        previous: &UploadRecord,
        reason: &str,
        actor: &str,
    ) -> Result<UploadRecord, StoreError> {
        let mut state = self.state.lock().await;
        let latest = state
            .uploads
            .values()
            .filter(|u| u.client_id == previous.client_id && u.closure_id == previous.closure_id)
            .map(|u| u.iteration)
            .max()
            .ok_or_else(|| StoreError::not_found("upload", previous.id))?;

        let record = UploadRecord::next_iteration(previous, latest + 1, reason, actor);
        state.uploads.insert(record.id, record.clone());
        Ok(record)
    }

    async fn promote_principal(&self, upload_id: UploadId) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        let (client_id, closure_id) = {
            let upload = state.upload(upload_id)?;
            (upload.client_id, upload.closure_id)
        };
        for upload in state.uploads.values_mut() {
            if upload.client_id == client_id && upload.closure_id == closure_id {
                upload.is_principal = upload.id == upload_id;
            }
        }
        Ok(())
    }

    async fn commit_iteration(&self, commit: IterationCommit<'_>) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        state.upload(commit.previous_upload_id)?;
        state.upload(commit.upload.id)?;
        if state.fail_incidence_writes {
            return Err(StoreError::Backend("incidence table unavailable".to_string()));
        }

        for incidence in &mut state.incidences {
            if incidence.upload_id == commit.previous_upload_id {
                incidence.active = false;
            }
        }
        state.incidences.retain(|i| i.upload_id != commit.upload.id);
        state.incidences.extend_from_slice(commit.incidences);
        state.apply_enrichment(commit.enrichment);

        let (client_id, closure_id) = (commit.upload.client_id, commit.upload.closure_id);
        state
            .history
            .push((client_id, closure_id, commit.history.clone()));

        for upload in state.uploads.values_mut() {
            if upload.client_id == client_id && upload.closure_id == closure_id {
                upload.is_principal = upload.id == commit.upload.id;
            }
        }
        if let Some(stored) = state.uploads.get_mut(&commit.upload.id) {
            let is_principal = stored.is_principal;
            *stored = commit.upload.clone();
            stored.is_principal = is_principal;
        }
        Ok(())
    }

    async fn history(
        &self,
        client_id: ClientId,
        closure_id: ClosureId,
    ) -> Result<Vec<ReprocessingHistoryEntry>, StoreError> {
        let state = self.state.lock().await;
        let mut entries: Vec<ReprocessingHistoryEntry> = state
            .history
            .iter()
            .filter(|(c, s, _)| *c == client_id && *s == closure_id)
            .map(|(_, _, e)| e.clone())
            .collect();
        entries.sort_by_key(|e| e.iteration);
        Ok(entries)
    }
}
