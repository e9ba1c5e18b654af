//! Spreadsheet reading.
//!
//! Workbooks (xlsx, xlsm, xls, ods) go through `calamine`; delimited text
//! exports go through `csv`. Either way the first worksheet is converted once
//! into an owned [`Sheet`] of [`Cell`] values, so the parser never sees a
//! floating point number.

mod cell;
mod delimited;
mod error;
mod header;
mod workbook;

pub use cell::Cell;
pub use error::{HeaderNotFound, ReadError};
pub use header::{Column, ColumnIndex, find_header_row, normalize_header};

use std::path::Path;

/// Source format of a ledger file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SheetFormat {
    /// Any workbook format `calamine` understands (xlsx, xlsm, xls, ods).
    Workbook,
    /// Delimited text (`;` or `,`).
    Delimited,
}

impl SheetFormat {
    /// Picks the format from a file extension (case-insensitive).
    #[must_use]
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "xlsx" | "xlsm" | "xls" | "ods" => Some(Self::Workbook),
            "csv" | "txt" => Some(Self::Delimited),
            _ => None,
        }
    }

    /// Picks the format from a path's extension.
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }
}

/// First worksheet of a ledger file, as owned rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sheet {
    rows: Vec<Vec<Cell>>,
}

impl Sheet {
    /// Builds a sheet from rows.
    #[must_use]
    pub fn new(rows: Vec<Vec<Cell>>) -> Self {
        Self { rows }
    }

    /// All rows in file order.
    #[must_use]
    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true if the sheet has no non-empty cell.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.iter().flatten().all(Cell::is_empty)
    }
}

/// Opens a ledger file from disk.
///
/// # Errors
///
/// `ReadError::NotFound` when the path does not exist, `ReadError::Empty`
/// for a sheet without content, `ReadError::Corrupt` when the bytes cannot
/// be decoded.
pub fn open(path: &Path) -> Result<Sheet, ReadError> {
    if !path.exists() {
        return Err(ReadError::NotFound(path.display().to_string()));
    }
    let format = SheetFormat::from_path(path).ok_or_else(|| {
        ReadError::UnsupportedFormat(
            path.extension()
                .map(|ext| ext.to_string_lossy().into_owned())
                .unwrap_or_default(),
        )
    })?;
    let bytes = std::fs::read(path).map_err(|e| ReadError::Corrupt(e.to_string()))?;
    from_bytes(bytes, format)
}

/// Reads a ledger file already loaded in memory.
///
/// # Errors
///
/// Same as [`open`], minus `NotFound`.
pub fn from_bytes(bytes: Vec<u8>, format: SheetFormat) -> Result<Sheet, ReadError> {
    if bytes.is_empty() {
        return Err(ReadError::Empty);
    }
    let sheet = match format {
        SheetFormat::Workbook => workbook::read_first_sheet(bytes)?,
        SheetFormat::Delimited => delimited::read(&bytes)?,
    };
    if sheet.is_empty() {
        return Err(ReadError::Empty);
    }
    Ok(sheet)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_extension() {
        assert_eq!(SheetFormat::from_extension("XLSX"), Some(SheetFormat::Workbook));
        assert_eq!(SheetFormat::from_extension("ods"), Some(SheetFormat::Workbook));
        assert_eq!(SheetFormat::from_extension("csv"), Some(SheetFormat::Delimited));
        assert_eq!(SheetFormat::from_extension("pdf"), None);
    }

    #[test]
    fn test_open_missing_file() {
        let result = open(Path::new("/nonexistent/761234567_LibroMayor_202403.xlsx"));
        assert!(matches!(result, Err(ReadError::NotFound(_))));
    }

    #[test]
    fn test_from_bytes_empty() {
        assert!(matches!(
            from_bytes(Vec::new(), SheetFormat::Delimited),
            Err(ReadError::Empty)
        ));
        assert!(matches!(
            from_bytes(b";;\n;;\n".to_vec(), SheetFormat::Delimited),
            Err(ReadError::Empty)
        ));
    }

    #[test]
    fn test_garbage_workbook_is_corrupt() {
        let result = from_bytes(b"definitely not a zip archive".to_vec(), SheetFormat::Workbook);
        assert!(matches!(result, Err(ReadError::Corrupt(_))));
    }

    #[test]
    fn test_from_bytes_delimited() {
        let sheet = from_bytes(
            b"FECHA;DEBE;HABER\n01/03/2024;500;0\n".to_vec(),
            SheetFormat::Delimited,
        )
        .unwrap();
        assert_eq!(sheet.len(), 2);
        assert_eq!(sheet.rows()[0][0], Cell::Text("FECHA".into()));
    }
}
