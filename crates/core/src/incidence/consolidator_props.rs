//! Property-based tests for incidence consolidation.

use proptest::prelude::*;
use rust_decimal::Decimal;

use ledgerline_shared::types::UploadId;

use super::consolidator::IncidenceConsolidator;
use super::detector::IncidenceBuckets;
use super::types::{IncidenceElement, IncidenceKey, IncidenceKind, Severity};

fn element(code: u16, cents: i64) -> IncidenceElement {
    IncidenceElement {
        reference: format!("account {code}"),
        account_code: code.to_string(),
        movement_id: None,
        row_number: None,
        date: None,
        debit: Decimal::new(cents, 2),
        credit: Decimal::ZERO,
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Affected count is the full element count; the sample is its prefix.
    #[test]
    fn prop_count_and_sample(
        sizes in prop::collection::vec(1usize..150, 1..6),
        sample_size in 1usize..20,
    ) {
        let mut buckets = IncidenceBuckets::new();
        for (idx, size) in sizes.iter().enumerate() {
            let elements: Vec<_> = (0..*size)
                .map(|n| element(u16::try_from(n % 7).unwrap_or(0), i64::try_from(n).unwrap_or(0)))
                .collect();
            buckets.insert(
                IncidenceKey::with_sub_code(IncidenceKind::UnrecognizedDocumentType, idx.to_string()),
                elements,
            );
        }
        let expected = buckets.clone();

        let incidences = IncidenceConsolidator::new(sample_size)
            .unwrap()
            .consolidate(UploadId::new(), buckets)
            .unwrap();

        prop_assert_eq!(incidences.len(), expected.len());
        for (incidence, (key, elements)) in incidences.iter().zip(expected.iter()) {
            prop_assert_eq!(&incidence.key(), key);
            prop_assert_eq!(incidence.affected_count, elements.len());
            prop_assert_eq!(incidence.statistics.total_affected, elements.len());
            prop_assert_eq!(incidence.severity, Severity::from_count(elements.len()));
            let take = sample_size.min(elements.len());
            prop_assert_eq!(&incidence.sample[..], &elements[..take]);
        }
    }
}
