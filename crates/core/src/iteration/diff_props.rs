//! Property-based tests for the iteration diff.

use proptest::prelude::*;

use super::diff::diff_incidences;
use super::diff::tests::incidence;
use crate::incidence::{ConsolidatedIncidence, IncidenceKind};

fn run() -> impl Strategy<Value = Vec<ConsolidatedIncidence>> {
    prop::collection::btree_map(0u8..8, 1usize..200, 0..8).prop_map(|counts| {
        counts
            .into_iter()
            .map(|(code, count)| {
                incidence(
                    IncidenceKind::UnrecognizedDocumentType,
                    Some(code.to_string().as_str()),
                    count,
                )
            })
            .collect()
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Diffing a run against itself reports nothing new and nothing resolved.
    #[test]
    fn prop_self_diff_is_unchanged(incidences in run()) {
        let diff = diff_incidences(&incidences, &incidences);
        prop_assert!(diff.is_unchanged());
        prop_assert_eq!(diff.unchanged, incidences.len());
    }

    /// Every key lands in exactly one bucket.
    #[test]
    fn prop_every_key_classified_once(previous in run(), current in run()) {
        let diff = diff_incidences(&previous, &current);
        let classified = diff.resolved.len() + diff.worsened.len() + diff.unchanged + diff.new.len();

        let mut keys: Vec<_> = previous.iter().chain(current.iter()).map(ConsolidatedIncidence::key).collect();
        keys.sort();
        keys.dedup();
        prop_assert_eq!(classified, keys.len());
    }
}
