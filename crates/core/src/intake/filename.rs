//! Ledger filename contract: `<tax-id>_<label>_<YYYYMM>[.<ext>]`.

use std::path::Path;

use ledgerline_shared::types::Period;

use super::error::IntakeError;
use crate::ledger::ClientProfile;

/// Extensions accepted for uploaded ledgers (lowercase).
pub const SUPPORTED_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xls", "ods", "csv"];

/// Components of a validated ledger filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerFileName {
    /// Tax id prefix as written in the filename.
    pub tax_id: String,
    /// Period suffix.
    pub period: Period,
    /// Lowercased extension, if any.
    pub extension: Option<String>,
}

impl LedgerFileName {
    /// Parses a filename against the expected label.
    ///
    /// Directory components are ignored; the label match is case-insensitive.
    pub fn parse(filename: &str, label: &str) -> Result<Self, IntakeError> {
        let invalid = |reason: &str| IntakeError::InvalidFilename {
            filename: filename.to_string(),
            label: label.to_string(),
            reason: reason.to_string(),
        };

        let base = Path::new(filename)
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| invalid("missing file name"))?;

        let (stem, extension) = match base.rsplit_once('.') {
            Some((stem, ext)) => (stem, Some(ext.to_ascii_lowercase())),
            None => (base, None),
        };

        if let Some(ext) = &extension {
            if !SUPPORTED_EXTENSIONS.contains(&ext.as_str()) {
                return Err(invalid(&format!("unsupported extension '.{ext}'")));
            }
        }

        let mut parts = stem.rsplitn(3, '_');
        let period_part = parts.next().unwrap_or_default();
        let label_part = parts.next().ok_or_else(|| invalid("missing label"))?;
        let tax_id = parts.next().ok_or_else(|| invalid("missing tax id"))?;

        if tax_id.trim().is_empty() {
            return Err(invalid("empty tax id"));
        }
        if !label_part.eq_ignore_ascii_case(label) {
            return Err(invalid(&format!("expected label '{label}', found '{label_part}'")));
        }
        let period: Period = period_part
            .parse()
            .map_err(|err: ledgerline_shared::types::PeriodParseError| invalid(&err.to_string()))?;

        Ok(Self {
            tax_id: tax_id.to_string(),
            period,
            extension,
        })
    }

    /// Checks that the filename belongs to the client and the requested period.
    pub fn check_against(&self, client: &ClientProfile, period: Period) -> Result<(), IntakeError> {
        if !client.matches_tax_id(&self.tax_id) {
            return Err(IntakeError::TaxIdMismatch {
                expected: client.tax_id.clone(),
                found: self.tax_id.clone(),
            });
        }
        if self.period != period {
            return Err(IntakeError::PeriodMismatch {
                expected: period.to_string(),
                found: self.period.to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledgerline_shared::types::ClientId;
    use rstest::rstest;

    fn client() -> ClientProfile {
        ClientProfile {
            id: ClientId::new(),
            tax_id: "76.123.456-7".to_string(),
            name: "Comercial Andes".to_string(),
            bilingual: false,
        }
    }

    #[test]
    fn test_parse_valid_filename() {
        let name = LedgerFileName::parse("761234567_LibroMayor_202403.xlsx", "LibroMayor").unwrap();
        assert_eq!(name.tax_id, "761234567");
        assert_eq!(name.period.to_string(), "202403");
        assert_eq!(name.extension.as_deref(), Some("xlsx"));
    }

    #[test]
    fn test_parse_tax_id_with_underscores_and_directory() {
        let name =
            LedgerFileName::parse("uploads/76_123_libromayor_202412.CSV", "LibroMayor").unwrap();
        assert_eq!(name.tax_id, "76_123");
        assert_eq!(name.extension.as_deref(), Some("csv"));
    }

    #[rstest]
    #[case("761234567_LibroMayor.xlsx")]
    #[case("761234567_Balance_202403.xlsx")]
    #[case("761234567_LibroMayor_2024.xlsx")]
    #[case("761234567_LibroMayor_202413.xlsx")]
    #[case("761234567_LibroMayor_202403.pdf")]
    #[case("_LibroMayor_202403.xlsx")]
    fn test_parse_rejects(#[case] filename: &str) {
        assert!(matches!(
            LedgerFileName::parse(filename, "LibroMayor"),
            Err(IntakeError::InvalidFilename { .. })
        ));
    }

    #[test]
    fn test_check_against_client_and_period() {
        let name = LedgerFileName::parse("76123456-7_LibroMayor_202403.xlsx", "LibroMayor").unwrap();
        let march: Period = "202403".parse().unwrap();
        let april: Period = "202404".parse().unwrap();
        assert!(name.check_against(&client(), march).is_ok());
        assert!(matches!(
            name.check_against(&client(), april),
            Err(IntakeError::PeriodMismatch { .. })
        ));

        let other = LedgerFileName::parse("99999999-9_LibroMayor_202403.xlsx", "LibroMayor").unwrap();
        assert!(matches!(
            other.check_against(&client(), march),
            Err(IntakeError::TaxIdMismatch { .. })
        ));
    }
}
