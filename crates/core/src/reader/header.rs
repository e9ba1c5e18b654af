//! Header row detection.
//!
//! Ledger exports put a variable number of title rows (company name, date
//! range, page headers) above the real column header, so the header is found
//! by scanning instead of assumed at row 0.

use std::collections::BTreeMap;

use super::{Cell, HeaderNotFound, Sheet};

/// Semantic columns of a general-ledger export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Column {
    /// Account code (optional; opening rows carry the code otherwise).
    Account,
    /// Movement date.
    Date,
    /// Document-type code.
    DocumentType,
    /// Document number.
    DocumentNumber,
    /// Debit amount.
    Debit,
    /// Credit amount.
    Credit,
    /// Free-text description.
    Description,
    /// Cost center.
    CostCenter,
    /// Auxiliary (counterparty) reference.
    Auxiliary,
    /// Internal voucher number.
    InternalNumber,
    /// Running balance.
    Balance,
}

impl Column {
    /// Every column, in display order.
    pub const ALL: [Self; 11] = [
        Self::Account,
        Self::Date,
        Self::DocumentType,
        Self::DocumentNumber,
        Self::Debit,
        Self::Credit,
        Self::Description,
        Self::CostCenter,
        Self::Auxiliary,
        Self::InternalNumber,
        Self::Balance,
    ];

    /// Columns a header row must contain.
    pub const REQUIRED: [Self; 3] = [Self::Date, Self::Debit, Self::Credit];

    /// Stable name used in errors.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Account => "account",
            Self::Date => "date",
            Self::DocumentType => "document_type",
            Self::DocumentNumber => "document_number",
            Self::Debit => "debit",
            Self::Credit => "credit",
            Self::Description => "description",
            Self::CostCenter => "cost_center",
            Self::Auxiliary => "auxiliary",
            Self::InternalNumber => "internal_number",
            Self::Balance => "balance",
        }
    }

    /// Normalized header names that map to this column.
    #[must_use]
    pub const fn aliases(self) -> &'static [&'static str] {
        match self {
            Self::Account => &["CUENTA", "CODIGOCUENTA", "CODCUENTA", "ACCOUNT", "ACCOUNTCODE"],
            Self::Date => &["FECHA", "FECHACONTABLE", "DATE"],
            Self::DocumentType => &["TIPODOCUMENTO", "TIPODOC", "TD", "DOCUMENTTYPE", "DOCTYPE"],
            Self::DocumentNumber => &[
                "NUMERODOCUMENTO",
                "NDOC",
                "NDOCUMENTO",
                "NRODOCUMENTO",
                "NUMDOC",
                "DOCUMENTNUMBER",
            ],
            Self::Debit => &["DEBE", "CARGO", "CARGOS", "DEBITO", "DEBIT"],
            Self::Credit => &["HABER", "ABONO", "ABONOS", "CREDITO", "CREDIT"],
            Self::Description => &["GLOSA", "DESCRIPCION", "DETALLE", "DESCRIPTION"],
            Self::CostCenter => &["CENTRODECOSTO", "CENTROCOSTO", "CCOSTO", "COSTCENTER"],
            Self::Auxiliary => &["AUXILIAR", "AUXILIARY"],
            Self::InternalNumber => &["NUMEROINTERNO", "NINTERNO", "INTERNALNUMBER"],
            Self::Balance => &["SALDO", "BALANCE"],
        }
    }

    /// Maps a raw header cell to a column.
    #[must_use]
    pub fn from_header(raw: &str) -> Option<Self> {
        let normalized = normalize_header(raw);
        if normalized.is_empty() {
            return None;
        }
        Self::ALL
            .into_iter()
            .find(|column| column.aliases().contains(&normalized.as_str()))
    }
}

/// Uppercases, strips Latin diacritics and drops anything not `[A-Z0-9]`.
#[must_use]
pub fn normalize_header(raw: &str) -> String {
    raw.chars()
        .flat_map(char::to_uppercase)
        .map(strip_diacritic)
        .filter(char::is_ascii_alphanumeric)
        .collect()
}

fn strip_diacritic(c: char) -> char {
    match c {
        'Á' | 'À' | 'Â' | 'Ä' | 'Ã' => 'A',
        'É' | 'È' | 'Ê' | 'Ë' => 'E',
        'Í' | 'Ì' | 'Î' | 'Ï' => 'I',
        'Ó' | 'Ò' | 'Ô' | 'Ö' | 'Õ' => 'O',
        'Ú' | 'Ù' | 'Û' | 'Ü' => 'U',
        'Ñ' => 'N',
        'Ç' => 'C',
        other => other,
    }
}

/// Position of the header row and of each recognized column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnIndex {
    header_row: usize,
    positions: BTreeMap<Column, usize>,
}

static EMPTY_CELL: Cell = Cell::Empty;

impl ColumnIndex {
    /// Zero-based index of the header row.
    #[must_use]
    pub const fn header_row(&self) -> usize {
        self.header_row
    }

    /// Zero-based position of a column, if mapped.
    #[must_use]
    pub fn position(&self, column: Column) -> Option<usize> {
        self.positions.get(&column).copied()
    }

    /// Returns true if the column was found in the header.
    #[must_use]
    pub fn has(&self, column: Column) -> bool {
        self.positions.contains_key(&column)
    }

    /// Cell of `row` under `column`; `Empty` when unmapped or out of range.
    #[must_use]
    pub fn cell<'a>(&self, row: &'a [Cell], column: Column) -> &'a Cell {
        self.position(column)
            .and_then(|idx| row.get(idx))
            .unwrap_or(&EMPTY_CELL)
    }

    fn from_row(header_row: usize, row: &[Cell]) -> Self {
        let mut positions = BTreeMap::new();
        for (idx, cell) in row.iter().enumerate() {
            let Some(text) = cell.as_text() else { continue };
            if let Some(column) = Column::from_header(text) {
                positions.entry(column).or_insert(idx);
            }
        }
        Self {
            header_row,
            positions,
        }
    }
}

/// Finds the header row within the first `search_window` rows.
///
/// A row qualifies when it maps every required column; among qualifying rows
/// the one matching most of `expected` wins, earliest first on ties.
///
/// # Errors
///
/// Returns `HeaderNotFound` listing the required columns missing from the
/// closest candidate.
pub fn find_header_row(
    sheet: &Sheet,
    expected: &[Column],
    search_window: usize,
) -> Result<ColumnIndex, HeaderNotFound> {
    let searched_rows = sheet.len().min(search_window);
    let mut best: Option<(usize, ColumnIndex)> = None;
    let mut closest_missing: Vec<Column> = Column::REQUIRED.to_vec();

    for (row_idx, row) in sheet.rows().iter().take(search_window).enumerate() {
        let candidate = ColumnIndex::from_row(row_idx, row);
        let missing: Vec<Column> = Column::REQUIRED
            .into_iter()
            .filter(|column| !candidate.has(*column))
            .collect();

        if !missing.is_empty() {
            if missing.len() < closest_missing.len() {
                closest_missing = missing;
            }
            continue;
        }

        let score = expected.iter().filter(|c| candidate.has(**c)).count();
        if best.as_ref().is_none_or(|(best_score, _)| score > *best_score) {
            best = Some((score, candidate));
        }
    }

    best.map(|(_, index)| index).ok_or(HeaderNotFound {
        searched_rows,
        missing: closest_missing,
    })
}
