//! Account balance calculations.
//!
//! Ledger exports are debit-normal: closing = opening + debits - credits.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Balance of one account over a period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountBalance {
    /// Account code.
    pub account_code: String,
    /// Opening balance carried from the prior period.
    pub opening: Decimal,
    /// Total debit amount.
    pub debit_total: Decimal,
    /// Total credit amount.
    pub credit_total: Decimal,
    /// Closing balance.
    pub balance: Decimal,
}

impl AccountBalance {
    /// Creates a balance starting from the given opening amount.
    #[must_use]
    pub fn new(account_code: impl Into<String>, opening: Decimal) -> Self {
        Self {
            account_code: account_code.into(),
            opening,
            debit_total: Decimal::ZERO,
            credit_total: Decimal::ZERO,
            balance: opening,
        }
    }

    /// Adds a debit amount.
    pub fn add_debit(&mut self, amount: Decimal) {
        self.debit_total += amount;
        self.recompute();
    }

    /// Adds a credit amount.
    pub fn add_credit(&mut self, amount: Decimal) {
        self.credit_total += amount;
        self.recompute();
    }

    fn recompute(&mut self) {
        self.balance = self.opening + self.debit_total - self.credit_total;
    }
}

/// Computes closing balances per account code.
///
/// Accounts that only appear in movements start from zero.
#[must_use]
pub fn closing_balances<'a, O, M>(openings: O, movements: M) -> BTreeMap<String, AccountBalance>
where
    O: IntoIterator<Item = (&'a str, Decimal)>,
    M: IntoIterator<Item = (&'a str, Decimal, Decimal)>,
{
    let mut balances: BTreeMap<String, AccountBalance> = BTreeMap::new();

    for (code, opening) in openings {
        balances.insert(code.to_string(), AccountBalance::new(code, opening));
    }

    for (code, debit, credit) in movements {
        let entry = balances
            .entry(code.to_string())
            .or_insert_with(|| AccountBalance::new(code, Decimal::ZERO));
        entry.add_debit(debit);
        entry.add_credit(credit);
    }

    balances
}
