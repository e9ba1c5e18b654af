//! Ledger record types.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use ledgerline_shared::types::{AccountId, ClientId, ClosureId, MovementId, UploadId};

/// Client attributes the pipeline needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientProfile {
    /// Client identifier.
    pub id: ClientId,
    /// Tax identifier encoded in uploaded filenames.
    pub tax_id: String,
    /// Display name.
    pub name: String,
    /// Whether the client reports in two languages (enables the English-name check).
    pub bilingual: bool,
}

impl ClientProfile {
    /// Compares a tax id from a filename against the profile, ignoring case and dots.
    #[must_use]
    pub fn matches_tax_id(&self, candidate: &str) -> bool {
        normalize_tax_id(&self.tax_id) == normalize_tax_id(candidate)
    }
}

fn normalize_tax_id(raw: &str) -> String {
    raw.chars()
        .filter(|c| *c != '.' && !c.is_whitespace())
        .flat_map(char::to_uppercase)
        .collect()
}

/// A client-scoped account from the chart of accounts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Account identifier.
    pub id: AccountId,
    /// Owning client.
    pub client_id: ClientId,
    /// Account code as written in the ledger (e.g. "1101").
    pub code: String,
    /// Display name.
    pub name: String,
    /// English display name, if known.
    pub english_name: Option<String>,
    /// Classification assignments: classification set -> option.
    pub classification: BTreeMap<String, String>,
    /// Upload that first saw this code.
    pub created_by_upload: Option<UploadId>,
}

impl Account {
    /// Returns true if an English name is recorded.
    #[must_use]
    pub fn has_english_name(&self) -> bool {
        self.english_name
            .as_deref()
            .is_some_and(|name| !name.trim().is_empty())
    }

    /// Returns true if at least one classification is assigned.
    #[must_use]
    pub fn has_classification(&self) -> bool {
        !self.classification.is_empty()
    }
}

/// Prior-period balance of an account for one closure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpeningBalance {
    /// Closure the balance belongs to.
    pub closure_id: ClosureId,
    /// Account identifier.
    pub account_id: AccountId,
    /// Account code (denormalized for reporting).
    pub account_code: String,
    /// Balance carried from the prior period.
    pub balance: Decimal,
}

/// A single debit/credit line of the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Movement {
    /// Movement identifier.
    pub id: MovementId,
    /// Owning client.
    pub client_id: ClientId,
    /// Closure (period) the movement belongs to.
    pub closure_id: ClosureId,
    /// Upload that parsed this movement.
    pub upload_id: UploadId,
    /// Account identifier.
    pub account_id: AccountId,
    /// Account code.
    pub account_code: String,
    /// Accounting date.
    pub date: NaiveDate,
    /// Document-type code as written in the file.
    pub document_type: Option<String>,
    /// Catalog code the document type resolved to, if any.
    pub document_type_ref: Option<String>,
    /// Document number.
    pub document_number: Option<String>,
    /// Debit amount.
    pub debit: Decimal,
    /// Credit amount.
    pub credit: Decimal,
    /// Free-text description.
    pub description: Option<String>,
    /// Cost center.
    pub cost_center: Option<String>,
    /// Auxiliary (counterparty) reference.
    pub auxiliary: Option<String>,
    /// Internal voucher number.
    pub internal_number: Option<String>,
    /// 1-based row number in the source sheet.
    pub row_number: u32,
    /// True when a non-suppressed validation check failed.
    pub incomplete: bool,
}

impl Movement {
    /// Gross amount moved (debit + credit).
    #[must_use]
    pub fn amount(&self) -> Decimal {
        self.debit + self.credit
    }

    /// Net effect on a debit-normal balance.
    #[must_use]
    pub fn net(&self) -> Decimal {
        self.debit - self.credit
    }

    /// Human-readable reference used in incidence samples.
    #[must_use]
    pub fn reference(&self) -> String {
        format!("row {} ({})", self.row_number, self.account_code)
    }
}
