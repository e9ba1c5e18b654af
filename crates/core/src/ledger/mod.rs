//! Durable ledger domain: clients, accounts, opening balances and movements.
//!
//! These are the records the pipeline reads from and writes to the
//! `LedgerStore`. Parsing produces id-less drafts (see `crate::parser`);
//! the store assigns identifiers when it persists them.

pub mod balance;
pub mod types;

pub use balance::{AccountBalance, closing_balances};
pub use types::{Account, ClientProfile, Movement, OpeningBalance};
