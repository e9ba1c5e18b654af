//! Delimited text exports via `csv`.

use csv::ReaderBuilder;

use super::{Cell, ReadError, Sheet};

const SNIFF_LINES: usize = 10;

/// Reads a `;`, `,` or tab separated export. Invalid UTF-8 is replaced.
pub(super) fn read(bytes: &[u8]) -> Result<Sheet, ReadError> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    let delimiter = sniff_delimiter(bytes);

    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes);

    let mut rows = Vec::new();
    for record in reader.byte_records() {
        let record = record.map_err(|e| ReadError::Corrupt(e.to_string()))?;
        rows.push(
            record
                .iter()
                .map(|field| Cell::text(&String::from_utf8_lossy(field)))
                .collect(),
        );
    }

    Ok(Sheet::new(rows))
}

/// Picks the delimiter that occurs most often in the leading lines.
///
/// Semicolon wins ties: locales that write decimal commas export with `;`.
fn sniff_delimiter(bytes: &[u8]) -> u8 {
    let mut counts = [(b';', 0usize), (b',', 0), (b'\t', 0)];
    for line in bytes.split(|b| *b == b'\n').take(SNIFF_LINES) {
        for (delimiter, count) in &mut counts {
            *count += line.iter().filter(|b| **b == *delimiter).count();
        }
    }
    counts
        .iter()
        .fold((b';', 0), |best, &(delimiter, count)| {
            if count > best.1 { (delimiter, count) } else { best }
        })
        .0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sniff_delimiter() {
        assert_eq!(sniff_delimiter(b"a;b;c\n1;2;3"), b';');
        assert_eq!(sniff_delimiter(b"a,b,c\n1,2,3"), b',');
        assert_eq!(sniff_delimiter(b"a\tb\tc"), b'\t');
        assert_eq!(sniff_delimiter(b"single column"), b';');
    }

    #[test]
    fn test_read_semicolon_export_with_bom_and_latin1() {
        let mut bytes = b"\xEF\xBB\xBFCUENTA;GLOSA\n".to_vec();
        bytes.extend_from_slice(b"1101;Dep\xF3sito\n");
        let sheet = read(&bytes).unwrap();
        assert_eq!(sheet.rows()[0][0], Cell::Text("CUENTA".into()));
        let glosa = sheet.rows()[1][1].as_text().unwrap();
        assert!(glosa.starts_with("Dep"));
        assert!(glosa.ends_with("sito"));
    }

    #[test]
    fn test_read_ragged_rows() {
        let sheet = read(b"a;b;c\n\"Saldo anterior: 1101 Caja\"\n1;2\n").unwrap();
        assert_eq!(sheet.len(), 3);
        assert_eq!(sheet.rows()[1].len(), 1);
        assert_eq!(sheet.rows()[2][1], Cell::Text("2".into()));
    }
}
