//! Catalog enrichment and movement checks.
//!
//! Each movement runs three independent checks (document type, English
//! name, classification). A failed check marks the movement incomplete
//! unless an exception for that account and check exists. Account
//! enrichment is per field, so an account still gains its English name
//! when the document-type check fails on its movements.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use ledgerline_shared::types::{AccountId, MovementId};

use super::exceptions::{ExceptionKind, ExceptionSet};
use crate::catalog::{CatalogSnapshot, Lookup, normalize_document_code};
use crate::ledger::{Account, Movement};

/// A failed, non-suppressed check on one movement.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "check", content = "code", rename_all = "snake_case")]
pub enum CheckFailure {
    /// Document type present but not in the catalog (normalized code).
    UnrecognizedDocumentType(String),
    /// Document type cell was blank.
    NullDocumentType,
    /// Bilingual client and the account has no English name.
    MissingEnglishName,
    /// The account has no classification.
    MissingClassification,
}

impl CheckFailure {
    /// Exception kind that suppresses this failure.
    #[must_use]
    pub const fn exception_kind(&self) -> ExceptionKind {
        match self {
            Self::UnrecognizedDocumentType(_) | Self::NullDocumentType => {
                ExceptionKind::DocumentType
            }
            Self::MissingEnglishName => ExceptionKind::EnglishName,
            Self::MissingClassification => ExceptionKind::Classification,
        }
    }
}

/// Enrichment result for one movement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementEnrichment {
    /// Movement identifier.
    pub movement_id: MovementId,
    /// Catalog code the document type resolved to.
    pub document_type_ref: Option<String>,
    /// New incomplete flag.
    pub incomplete: bool,
    /// True when the stored flag was set and is now cleared.
    pub corrected: bool,
    /// Non-suppressed failures, in check order.
    pub failures: Vec<CheckFailure>,
}

/// Catalog values to write onto an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountUpdate {
    /// Account identifier.
    pub account_id: AccountId,
    /// Account code.
    pub account_code: String,
    /// English name to set, if it changed.
    pub english_name: Option<String>,
    /// Classification to set, if it changed.
    pub classification: Option<BTreeMap<String, String>>,
}

/// Output of one enrichment pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichmentOutcome {
    /// One entry per input movement, same order.
    pub movements: Vec<MovementEnrichment>,
    /// Accounts that gained catalog data.
    pub account_updates: Vec<AccountUpdate>,
    /// Accounts after applying `account_updates`.
    pub accounts: Vec<Account>,
    /// Movements whose incomplete flag went from true to false.
    pub corrected_movements: usize,
    /// Movements left incomplete.
    pub incomplete_movements: usize,
}

/// Applies catalogs and exceptions to a client's accounts and movements.
#[derive(Debug, Clone, Copy)]
pub struct MovementEnricher<'a> {
    catalogs: &'a CatalogSnapshot,
    exceptions: &'a ExceptionSet,
    bilingual: bool,
}

impl<'a> MovementEnricher<'a> {
    /// Creates an enricher for one run.
    #[must_use]
    pub const fn new(
        catalogs: &'a CatalogSnapshot,
        exceptions: &'a ExceptionSet,
        bilingual: bool,
    ) -> Self {
        Self {
            catalogs,
            exceptions,
            bilingual,
        }
    }

    /// Enriches accounts, then checks every movement against the enriched accounts.
    #[must_use]
    pub fn enrich(&self, accounts: &[Account], movements: &[Movement]) -> EnrichmentOutcome {
        let mut enriched_accounts = Vec::with_capacity(accounts.len());
        let mut account_updates = Vec::new();
        for account in accounts {
            let (account, update) = self.enrich_account(account);
            if let Some(update) = update {
                account_updates.push(update);
            }
            enriched_accounts.push(account);
        }

        let by_code: HashMap<&str, &Account> = enriched_accounts
            .iter()
            .map(|a| (a.code.as_str(), a))
            .collect();

        let mut outcome_movements = Vec::with_capacity(movements.len());
        let mut corrected_movements = 0;
        let mut incomplete_movements = 0;
        for movement in movements {
            let result = self.check_movement(movement, by_code.get(movement.account_code.as_str()).copied());
            corrected_movements += usize::from(result.corrected);
            incomplete_movements += usize::from(result.incomplete);
            outcome_movements.push(result);
        }

        EnrichmentOutcome {
            movements: outcome_movements,
            account_updates,
            accounts: enriched_accounts,
            corrected_movements,
            incomplete_movements,
        }
    }

    fn enrich_account(&self, account: &Account) -> (Account, Option<AccountUpdate>) {
        let mut enriched = account.clone();

        let english_name = match self.catalogs.english_names.lookup(&account.code) {
            Lookup::Found(name) if account.english_name.as_deref() != Some(name) => {
                enriched.english_name = Some(name.to_string());
                Some(name.to_string())
            }
            _ => None,
        };

        let classification = match self.catalogs.classifications.lookup(&account.code) {
            Lookup::Found(sets) if &account.classification != sets => {
                enriched.classification = sets.clone();
                Some(sets.clone())
            }
            _ => None,
        };

        let update = (english_name.is_some() || classification.is_some()).then(|| AccountUpdate {
            account_id: account.id,
            account_code: account.code.clone(),
            english_name,
            classification,
        });
        (enriched, update)
    }

    fn check_movement(&self, movement: &Movement, account: Option<&Account>) -> MovementEnrichment {
        let mut failures = Vec::new();
        let mut document_type_ref = None;

        match movement.document_type.as_deref().map(str::trim) {
            None | Some("") => failures.push(CheckFailure::NullDocumentType),
            Some(code) => match self.catalogs.document_types.lookup(code) {
                Lookup::Found(_) => document_type_ref = Some(normalize_document_code(code)),
                Lookup::NotFound => failures.push(CheckFailure::UnrecognizedDocumentType(
                    normalize_document_code(code),
                )),
            },
        }

        if self.bilingual && !account.is_some_and(Account::has_english_name) {
            failures.push(CheckFailure::MissingEnglishName);
        }
        if !account.is_some_and(Account::has_classification) {
            failures.push(CheckFailure::MissingClassification);
        }

        failures.retain(|failure| {
            !self
                .exceptions
                .suppresses(&movement.account_code, failure.exception_kind())
        });

        let incomplete = !failures.is_empty();
        MovementEnrichment {
            movement_id: movement.id,
            document_type_ref,
            incomplete,
            corrected: movement.incomplete && !incomplete,
            failures,
        }
    }
}
