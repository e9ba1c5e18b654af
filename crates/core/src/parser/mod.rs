//! General-ledger parser.
//!
//! Walks the rows below the header with an explicit [`ParserState`]: an
//! opening-balance row (`Saldo anterior: 1101 Caja`) starts an account block
//! and every dated row inside a block becomes a movement. Bad rows are
//! collected as [`RowError`]s and parsing continues.

mod ledger;
mod types;
mod values;

#[cfg(test)]
mod ledger_props;
#[cfg(test)]
mod values_props;

pub use ledger::{LedgerParser, ParserState, parse_opening_label};
pub use types::{ParsedAccount, ParsedLedger, ParsedMovement, ParsedOpening, RowError, RowErrorKind};
pub use values::{AmountError, DateError, parse_amount, parse_date};
