//! Parser output types.

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::ledger::{AccountBalance, closing_balances};

/// Account seen in an opening-balance row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedAccount {
    /// Account code.
    pub code: String,
    /// Display name from the opening row.
    pub name: String,
}

/// Opening balance of an account block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedOpening {
    /// Account code.
    pub account_code: String,
    /// Opening amount.
    pub balance: Decimal,
    /// One-based row number of the opening row.
    pub row_number: u32,
}

/// Movement row before identifiers are assigned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedMovement {
    /// Account block the row belongs to.
    pub account_code: String,
    /// Movement date.
    pub date: NaiveDate,
    /// Document-type code as written, if any.
    pub document_type: Option<String>,
    /// Document number.
    pub document_number: Option<String>,
    /// Debit amount.
    pub debit: Decimal,
    /// Credit amount.
    pub credit: Decimal,
    /// Description.
    pub description: Option<String>,
    /// Cost center.
    pub cost_center: Option<String>,
    /// Auxiliary reference.
    pub auxiliary: Option<String>,
    /// Internal voucher number.
    pub internal_number: Option<String>,
    /// One-based row number in the source file.
    pub row_number: u32,
}

/// Why a row was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowErrorKind {
    /// Date cell could not be parsed.
    InvalidDate,
    /// Debit, credit or balance cell could not be parsed.
    InvalidAmount,
    /// Dated row before any opening-balance row.
    OutsideAccountBlock,
}

/// A rejected row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowError {
    /// One-based row number.
    pub row_number: u32,
    /// Error category.
    pub kind: RowErrorKind,
    /// Human-readable detail.
    pub message: String,
}

impl fmt::Display for RowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "row {}: {}", self.row_number, self.message)
    }
}

/// Everything extracted from one ledger file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedLedger {
    /// Accounts in first-seen order.
    pub accounts: Vec<ParsedAccount>,
    /// Opening balances, one per account (last opening row wins).
    pub opening_balances: Vec<ParsedOpening>,
    /// Movements in file order.
    pub movements: Vec<ParsedMovement>,
    /// Rejected rows in file order.
    pub errors: Vec<RowError>,
    /// Earliest movement date.
    pub min_date: Option<NaiveDate>,
    /// Latest movement date.
    pub max_date: Option<NaiveDate>,
    /// Rows inspected below the header.
    pub rows_scanned: usize,
}

impl ParsedLedger {
    /// Closing balance per account code.
    #[must_use]
    pub fn closing_balances(&self) -> BTreeMap<String, AccountBalance> {
        closing_balances(
            self.opening_balances
                .iter()
                .map(|o| (o.account_code.as_str(), o.balance)),
            self.movements
                .iter()
                .map(|m| (m.account_code.as_str(), m.debit, m.credit)),
        )
    }

    /// Row errors rendered for the upload warning field.
    #[must_use]
    pub fn warnings(&self) -> Vec<String> {
        self.errors.iter().map(ToString::to_string).collect()
    }

    pub(super) fn record_account(&mut self, code: &str, name: &str) {
        if !self.accounts.iter().any(|a| a.code == code) {
            self.accounts.push(ParsedAccount {
                code: code.to_string(),
                name: name.to_string(),
            });
        }
    }

    pub(super) fn upsert_opening(&mut self, opening: ParsedOpening) {
        match self
            .opening_balances
            .iter_mut()
            .find(|o| o.account_code == opening.account_code)
        {
            Some(existing) => *existing = opening,
            None => self.opening_balances.push(opening),
        }
    }

    pub(super) fn push_movement(&mut self, movement: ParsedMovement) {
        self.min_date = Some(self.min_date.map_or(movement.date, |d| d.min(movement.date)));
        self.max_date = Some(self.max_date.map_or(movement.date, |d| d.max(movement.date)));
        self.movements.push(movement);
    }

    pub(super) fn push_error(&mut self, row_number: u32, kind: RowErrorKind, message: String) {
        self.errors.push(RowError {
            row_number,
            kind,
            message,
        });
    }
}
