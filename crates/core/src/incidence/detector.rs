//! Incidence detection.
//!
//! Two scans feed one set of buckets keyed by [`IncidenceKey`]:
//! the movement scan buckets every non-suppressed check failure of the
//! incomplete movements, and the account scan reports account-level gaps
//! for every account the upload touches, whatever its movements' flags.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use rust_decimal::Decimal;

use ledgerline_shared::types::UploadId;

use super::types::{IncidenceElement, IncidenceKey, IncidenceKind};
use crate::ledger::{Account, Movement};
use crate::validation::{CheckFailure, EnrichmentOutcome, ExceptionKind, ExceptionSet};

/// Elements per incidence key, in first-seen order.
pub type IncidenceBuckets = BTreeMap<IncidenceKey, Vec<IncidenceElement>>;

/// Inputs of one detection pass.
#[derive(Debug, Clone, Copy)]
pub struct DetectionInput<'a> {
    /// Movements of the evaluated upload.
    pub movements: &'a [Movement],
    /// Enrichment of those movements (accounts already enriched).
    pub enrichment: &'a EnrichmentOutcome,
    /// Client exceptions.
    pub exceptions: &'a ExceptionSet,
    /// Whether the English-name checks apply.
    pub bilingual: bool,
    /// Upload whose newly created accounts are reported.
    pub source_upload_id: UploadId,
}

/// Stateless incidence detector.
pub struct IncidenceDetector;

impl IncidenceDetector {
    /// Runs the movement scan and the account scan.
    #[must_use]
    pub fn detect(input: &DetectionInput<'_>) -> IncidenceBuckets {
        let mut buckets = IncidenceBuckets::new();
        Self::scan_movements(input, &mut buckets);
        Self::scan_accounts(input, &mut buckets);
        buckets
    }

    fn scan_movements(input: &DetectionInput<'_>, buckets: &mut IncidenceBuckets) {
        let results: HashMap<_, _> = input
            .enrichment
            .movements
            .iter()
            .map(|m| (m.movement_id, m))
            .collect();

        for movement in input.movements {
            let Some(result) = results.get(&movement.id) else {
                continue;
            };
            if !result.incomplete {
                continue;
            }
            for failure in &result.failures {
                buckets
                    .entry(failure_key(failure))
                    .or_default()
                    .push(movement_element(movement));
            }
        }
    }

    fn scan_accounts(input: &DetectionInput<'_>, buckets: &mut IncidenceBuckets) {
        let mut totals: HashMap<&str, (Decimal, Decimal)> = HashMap::new();
        for movement in input.movements {
            let entry = totals.entry(movement.account_code.as_str()).or_default();
            entry.0 += movement.debit;
            entry.1 += movement.credit;
        }

        let mut in_scope: Vec<&Account> = input
            .enrichment
            .accounts
            .iter()
            .filter(|a| {
                totals.contains_key(a.code.as_str())
                    || a.created_by_upload == Some(input.source_upload_id)
            })
            .collect();
        in_scope.sort_by(|a, b| a.code.cmp(&b.code));
        let mut seen = BTreeSet::new();

        for account in in_scope {
            if !seen.insert(account.code.as_str()) {
                continue;
            }
            let (debit, credit) = totals
                .get(account.code.as_str())
                .copied()
                .unwrap_or_default();
            let suppressed = |kind| input.exceptions.suppresses(&account.code, kind);
            let mut push = |kind| {
                buckets
                    .entry(IncidenceKey::new(kind))
                    .or_default()
                    .push(account_element(account, debit, credit));
            };

            if !account.has_classification() && !suppressed(ExceptionKind::Classification) {
                push(IncidenceKind::AccountWithoutClassification);
            }
            if input.bilingual
                && !account.has_english_name()
                && !suppressed(ExceptionKind::EnglishName)
            {
                push(IncidenceKind::AccountWithoutEnglishName);
            }
            if account.created_by_upload == Some(input.source_upload_id)
                && !suppressed(ExceptionKind::NewAccount)
            {
                push(IncidenceKind::NewAccountDetected);
            }
        }
    }
}

fn failure_key(failure: &CheckFailure) -> IncidenceKey {
    match failure {
        CheckFailure::UnrecognizedDocumentType(code) => {
            IncidenceKey::with_sub_code(IncidenceKind::UnrecognizedDocumentType, code.clone())
        }
        CheckFailure::NullDocumentType => IncidenceKey::new(IncidenceKind::NullDocumentType),
        CheckFailure::MissingEnglishName => IncidenceKey::new(IncidenceKind::MissingEnglishName),
        CheckFailure::MissingClassification => {
            IncidenceKey::new(IncidenceKind::MissingClassification)
        }
    }
}

fn movement_element(movement: &Movement) -> IncidenceElement {
    IncidenceElement {
        reference: movement.reference(),
        account_code: movement.account_code.clone(),
        movement_id: Some(movement.id),
        row_number: Some(movement.row_number),
        date: Some(movement.date),
        debit: movement.debit,
        credit: movement.credit,
    }
}

fn account_element(account: &Account, debit: Decimal, credit: Decimal) -> IncidenceElement {
    IncidenceElement {
        reference: format!("account {} {}", account.code, account.name),
        account_code: account.code.clone(),
        movement_id: None,
        row_number: None,
        date: None,
        debit,
        credit,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CatalogSnapshot, ClassificationCatalog, DocumentTypeCatalog, EnglishNameCatalog};
    use crate::fixtures;
    use crate::validation::{MovementEnricher, ValidationException};
    use rust_decimal_macros::dec;

    fn catalogs() -> CatalogSnapshot {
        CatalogSnapshot {
            document_types: DocumentTypeCatalog::new([("33".to_string(), "Factura".to_string())]),
            english_names: EnglishNameCatalog::new([("1101".to_string(), "Cash".to_string())]),
            classifications: ClassificationCatalog::new([(
                "1101".to_string(),
                "IFRS".to_string(),
                "Current assets".to_string(),
            )]),
        }
    }

    fn detect(
        accounts: &[Account],
        movements: &[Movement],
        exceptions: &ExceptionSet,
        bilingual: bool,
        source_upload_id: UploadId,
    ) -> IncidenceBuckets {
        let catalogs = catalogs();
        let enrichment = MovementEnricher::new(&catalogs, exceptions, bilingual).enrich(accounts, movements);
        IncidenceDetector::detect(&DetectionInput {
            movements,
            enrichment: &enrichment,
            exceptions,
            bilingual,
            source_upload_id,
        })
    }

    #[test]
    fn test_unknown_document_type_is_single_bucket_with_sub_code() {
        let caja = fixtures::account("1101", "Caja");
        let movements = vec![
            fixtures::movement(&caja, Some("33"), dec!(500), dec!(0), 4),
            fixtures::movement(&caja, Some("99"), dec!(0), dec!(200), 5),
        ];
        let buckets = detect(&[caja], &movements, &ExceptionSet::default(), false, UploadId::new());

        assert_eq!(buckets.len(), 1);
        let key = IncidenceKey::with_sub_code(IncidenceKind::UnrecognizedDocumentType, "99");
        assert_eq!(buckets[&key].len(), 1);
        assert_eq!(buckets[&key][0].row_number, Some(5));
    }

    #[test]
    fn test_account_scan_reports_gaps_and_new_accounts() {
        let upload_id = UploadId::new();
        let mut proveedores = fixtures::account("2101", "Proveedores");
        proveedores.created_by_upload = Some(upload_id);
        let movements = vec![
            fixtures::movement(&proveedores, Some("33"), dec!(0), dec!(150), 8),
            fixtures::movement(&proveedores, Some("33"), dec!(0), dec!(50), 9),
        ];
        let buckets = detect(&[proveedores], &movements, &ExceptionSet::default(), true, upload_id);

        let without_class = &buckets[&IncidenceKey::new(IncidenceKind::AccountWithoutClassification)];
        assert_eq!(without_class.len(), 1);
        assert_eq!(without_class[0].credit, dec!(200));
        assert!(buckets.contains_key(&IncidenceKey::new(IncidenceKind::AccountWithoutEnglishName)));
        assert!(buckets.contains_key(&IncidenceKey::new(IncidenceKind::NewAccountDetected)));
        assert_eq!(
            buckets[&IncidenceKey::new(IncidenceKind::MissingClassification)].len(),
            2
        );
    }

    #[test]
    fn test_accounts_outside_upload_are_ignored() {
        let caja = fixtures::account("1101", "Caja");
        let idle = fixtures::account("9999", "Sin movimientos");
        let movements = vec![fixtures::movement(&caja, Some("33"), dec!(1), dec!(0), 4)];
        let buckets = detect(&[caja, idle], &movements, &ExceptionSet::default(), true, UploadId::new());
        assert!(buckets.is_empty());
    }

    #[test]
    fn test_exceptions_suppress_every_kind() {
        let upload_id = UploadId::new();
        let mut proveedores = fixtures::account("2101", "Proveedores");
        proveedores.created_by_upload = Some(upload_id);
        let movements = vec![fixtures::movement(&proveedores, None, dec!(0), dec!(10), 8)];
        let exceptions = ExceptionSet::new(
            [
                ExceptionKind::DocumentType,
                ExceptionKind::EnglishName,
                ExceptionKind::Classification,
                ExceptionKind::NewAccount,
            ]
            .into_iter()
            .map(|kind| ValidationException {
                client_id: proveedores.client_id,
                account_code: "2101".to_string(),
                kind,
            }),
        );
        let buckets = detect(&[proveedores], &movements, &exceptions, true, upload_id);
        assert!(buckets.is_empty());
    }
}
