//! Workbook formats via `calamine`.

use std::io::Cursor;

use calamine::{Reader, open_workbook_auto_from_rs};

use super::{Cell, ReadError, Sheet};

/// Reads the first worksheet of an xlsx/xlsm/xls/ods workbook.
pub(super) fn read_first_sheet(bytes: Vec<u8>) -> Result<Sheet, ReadError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))
        .map_err(|e| ReadError::Corrupt(e.to_string()))?;

    let range = match workbook.worksheet_range_at(0) {
        Some(Ok(range)) => range,
        Some(Err(e)) => return Err(ReadError::Corrupt(e.to_string())),
        None => return Err(ReadError::Empty),
    };

    // Ranges start at the first used cell; pad so row numbers match the file.
    let (first_row, first_col) = range.start().unwrap_or((0, 0));
    let mut rows: Vec<Vec<Cell>> = (0..first_row).map(|_| Vec::new()).collect();
    for row in range.rows() {
        let mut cells: Vec<Cell> = (0..first_col).map(|_| Cell::Empty).collect();
        cells.extend(row.iter().map(Cell::from));
        rows.push(cells);
    }

    Ok(Sheet::new(rows))
}
