//! Reader error types.

use thiserror::Error;

use super::header::Column;

/// Structural errors reading a ledger file.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReadError {
    /// File does not exist.
    #[error("ledger file not found: {0}")]
    NotFound(String),

    /// File has no sheet or no content.
    #[error("ledger file is empty")]
    Empty,

    /// File could not be decoded.
    #[error("ledger file is corrupt: {0}")]
    Corrupt(String),

    /// Extension is not a known spreadsheet format.
    #[error("unsupported ledger format '.{0}'")]
    UnsupportedFormat(String),
}

impl ReadError {
    /// Returns the error code for summaries and logs.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "FILE_NOT_FOUND",
            Self::Empty => "EMPTY_FILE",
            Self::Corrupt(_) => "CORRUPT_FILE",
            Self::UnsupportedFormat(_) => "UNSUPPORTED_FORMAT",
        }
    }
}

/// No row within the search window carries the required columns.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("header row not found in the first {searched_rows} rows (missing: {})", format_missing(.missing))]
pub struct HeaderNotFound {
    /// Rows inspected.
    pub searched_rows: usize,
    /// Required columns absent from the best candidate row.
    pub missing: Vec<Column>,
}

fn format_missing(missing: &[Column]) -> String {
    missing
        .iter()
        .map(|c| c.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}
