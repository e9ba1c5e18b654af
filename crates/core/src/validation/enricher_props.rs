//! Property-based tests for exception suppression.
//!
//! An exception for a check removes that check's failures for the account,
//! whatever the catalog contents.

use proptest::prelude::*;
use rust_decimal::Decimal;

use super::enricher::MovementEnricher;
use super::exceptions::{ExceptionKind, ExceptionSet, ValidationException};
use crate::catalog::{CatalogSnapshot, DocumentTypeCatalog};
use crate::fixtures;

fn exception_kinds() -> impl Strategy<Value = Vec<ExceptionKind>> {
    prop::collection::vec(
        prop_oneof![
            Just(ExceptionKind::DocumentType),
            Just(ExceptionKind::EnglishName),
            Just(ExceptionKind::Classification),
        ],
        0..4,
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_suppressed_checks_never_fail(
        kinds in exception_kinds(),
        doc_codes in prop::collection::vec(prop::option::of("[0-9]{1,3}"), 1..20),
        bilingual in any::<bool>(),
    ) {
        let account = fixtures::account("1101", "Caja");
        let movements: Vec<_> = doc_codes
            .iter()
            .enumerate()
            .map(|(idx, code)| {
                fixtures::movement(&account, code.as_deref(), Decimal::ONE, Decimal::ZERO, u32::try_from(idx).unwrap_or(0) + 2)
            })
            .collect();
        let catalogs = CatalogSnapshot {
            document_types: DocumentTypeCatalog::new([("33".to_string(), "Factura".to_string())]),
            ..CatalogSnapshot::default()
        };
        let exceptions = ExceptionSet::new(kinds.iter().map(|kind| ValidationException {
            client_id: account.client_id,
            account_code: account.code.clone(),
            kind: *kind,
        }));

        let outcome = MovementEnricher::new(&catalogs, &exceptions, bilingual)
            .enrich(std::slice::from_ref(&account), &movements);

        for result in &outcome.movements {
            for failure in &result.failures {
                prop_assert!(!kinds.contains(&failure.exception_kind()));
            }
            prop_assert_eq!(result.incomplete, !result.failures.is_empty());
        }
    }
}
