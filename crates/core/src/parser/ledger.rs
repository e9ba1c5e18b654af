//! Row-by-row ledger parsing.

use rust_decimal::Decimal;
use tracing::debug;

use super::types::{ParsedLedger, ParsedMovement, ParsedOpening, RowErrorKind};
use super::values::{parse_amount, parse_date};
use crate::reader::{Cell, Column, ColumnIndex, Sheet};

const OPENING_PREFIXES: [&str; 2] = ["opening balance:", "saldo anterior:"];

/// Where the row loop currently stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParserState {
    /// No opening-balance row seen yet.
    AwaitingAccount,
    /// Inside the block of the given account.
    InAccountBlock {
        /// Account code of the current block.
        account_code: String,
    },
}

/// Splits `opening balance: <code> <name>` into code and name.
///
/// Matching is case-insensitive; a missing name yields an empty string.
#[must_use]
pub fn parse_opening_label(text: &str) -> Option<(String, String)> {
    let text = text.trim();
    let rest = OPENING_PREFIXES.iter().find_map(|prefix| {
        text.get(..prefix.len())
            .filter(|head| head.eq_ignore_ascii_case(prefix))
            .map(|_| &text[prefix.len()..])
    })?;

    let rest = rest.trim();
    let (code, name) = rest
        .split_once(char::is_whitespace)
        .map_or((rest, ""), |(code, name)| (code, name.trim()));
    if code.is_empty() {
        return None;
    }
    Some((code.to_string(), name.to_string()))
}

/// Parses the rows below a detected header.
#[derive(Debug, Clone)]
pub struct LedgerParser<'a> {
    columns: &'a ColumnIndex,
}

impl<'a> LedgerParser<'a> {
    /// Creates a parser for the given column layout.
    #[must_use]
    pub const fn new(columns: &'a ColumnIndex) -> Self {
        Self { columns }
    }

    /// Parses every row after the header row.
    #[must_use]
    pub fn parse(&self, sheet: &Sheet) -> ParsedLedger {
        let mut out = ParsedLedger::default();
        let mut state = ParserState::AwaitingAccount;

        for (idx, row) in sheet
            .rows()
            .iter()
            .enumerate()
            .skip(self.columns.header_row() + 1)
        {
            out.rows_scanned += 1;
            let row_number = u32::try_from(idx + 1).unwrap_or(u32::MAX);
            state = self.step(state, row, row_number, &mut out);
        }

        debug!(
            rows = out.rows_scanned,
            accounts = out.accounts.len(),
            movements = out.movements.len(),
            errors = out.errors.len(),
            "ledger parsed"
        );
        out
    }

    fn step(
        &self,
        state: ParserState,
        row: &[Cell],
        row_number: u32,
        out: &mut ParsedLedger,
    ) -> ParserState {
        if let Some((code, name)) = self.opening_label(row) {
            out.record_account(&code, &name);
            match self.opening_amount(row) {
                Ok(balance) => out.upsert_opening(ParsedOpening {
                    account_code: code.clone(),
                    balance,
                    row_number,
                }),
                Err(message) => out.push_error(row_number, RowErrorKind::InvalidAmount, message),
            }
            return ParserState::InAccountBlock { account_code: code };
        }

        let date_cell = self.columns.cell(row, Column::Date);
        if date_cell.is_empty() {
            return state;
        }

        let ParserState::InAccountBlock { account_code } = &state else {
            out.push_error(
                row_number,
                RowErrorKind::OutsideAccountBlock,
                "movement outside account block".to_string(),
            );
            return state;
        };

        let date = match parse_date(date_cell) {
            Ok(date) => date,
            Err(err) => {
                out.push_error(row_number, RowErrorKind::InvalidDate, err.to_string());
                return state;
            }
        };
        let amounts = parse_amount(self.columns.cell(row, Column::Debit)).and_then(|debit| {
            parse_amount(self.columns.cell(row, Column::Credit)).map(|credit| (debit, credit))
        });
        let (debit, credit) = match amounts {
            Ok(pair) => pair,
            Err(err) => {
                out.push_error(row_number, RowErrorKind::InvalidAmount, err.to_string());
                return state;
            }
        };

        out.push_movement(ParsedMovement {
            account_code: account_code.clone(),
            date,
            document_type: self.text(row, Column::DocumentType),
            document_number: self.text(row, Column::DocumentNumber),
            debit,
            credit,
            description: self.text(row, Column::Description),
            cost_center: self.text(row, Column::CostCenter),
            auxiliary: self.text(row, Column::Auxiliary),
            internal_number: self.text(row, Column::InternalNumber),
            row_number,
        });
        state
    }

    /// The label lives in the account column when there is one, otherwise in
    /// the first non-empty cell.
    fn opening_label(&self, row: &[Cell]) -> Option<(String, String)> {
        let mapped = self.columns.cell(row, Column::Account);
        let primary = if mapped.is_empty() {
            row.iter().find(|cell| !cell.is_empty())?
        } else {
            mapped
        };
        parse_opening_label(primary.as_text()?)
    }

    fn opening_amount(&self, row: &[Cell]) -> Result<Decimal, String> {
        let balance = self.columns.cell(row, Column::Balance);
        let source = if balance.is_empty() {
            self.columns.cell(row, Column::Debit)
        } else {
            balance
        };
        parse_amount(source).map_err(|err| format!("opening balance: {err}"))
    }

    fn text(&self, row: &[Cell], column: Column) -> Option<String> {
        self.columns.cell(row, column).to_text()
    }
}
