//! Incidence diff between two iterations.
//!
//! Incidences are matched by (kind, sub-code). An incidence missing from the
//! new run is fully resolved; a smaller count is partially resolved; a key
//! absent before is new; a larger count is worsened.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::incidence::{ConsolidatedIncidence, IncidenceKey};

/// Count change of one incidence key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncidenceChange {
    /// Incidence key.
    pub key: IncidenceKey,
    /// Affected count before.
    pub previous_count: usize,
    /// Affected count now.
    pub current_count: usize,
}

impl IncidenceChange {
    /// Absolute count difference.
    #[must_use]
    pub const fn delta(&self) -> usize {
        self.previous_count.abs_diff(self.current_count)
    }

    /// Returns true if the incidence disappeared.
    #[must_use]
    pub const fn is_fully_resolved(&self) -> bool {
        self.current_count == 0 && self.previous_count > 0
    }
}

/// Result of comparing two iterations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IterationDiff {
    /// Fully or partially resolved incidences.
    pub resolved: Vec<IncidenceChange>,
    /// Incidences absent before.
    pub new: Vec<IncidenceChange>,
    /// Incidences with a larger count.
    pub worsened: Vec<IncidenceChange>,
    /// Keys with the same count.
    pub unchanged: usize,
}

impl IterationDiff {
    /// Number of fully resolved incidences.
    #[must_use]
    pub fn fully_resolved(&self) -> usize {
        self.resolved.iter().filter(|c| c.is_fully_resolved()).count()
    }

    /// Number of partially resolved incidences.
    #[must_use]
    pub fn partially_resolved(&self) -> usize {
        self.resolved.len() - self.fully_resolved()
    }

    /// Returns true if nothing changed.
    #[must_use]
    pub fn is_unchanged(&self) -> bool {
        self.resolved.is_empty() && self.new.is_empty() && self.worsened.is_empty()
    }
}

/// Compares the active incidences of two iterations.
#[must_use]
pub fn diff_incidences(
    previous: &[ConsolidatedIncidence],
    current: &[ConsolidatedIncidence],
) -> IterationDiff {
    let before = counts(previous);
    let after = counts(current);
    let mut diff = IterationDiff::default();

    for (key, &previous_count) in &before {
        let current_count = after.get(key).copied().unwrap_or(0);
        let change = IncidenceChange {
            key: key.clone(),
            previous_count,
            current_count,
        };
        match current_count.cmp(&previous_count) {
            std::cmp::Ordering::Less => diff.resolved.push(change),
            std::cmp::Ordering::Greater => diff.worsened.push(change),
            std::cmp::Ordering::Equal => diff.unchanged += 1,
        }
    }

    for (key, &current_count) in &after {
        if !before.contains_key(key) {
            diff.new.push(IncidenceChange {
                key: key.clone(),
                previous_count: 0,
                current_count,
            });
        }
    }

    diff
}

fn counts(incidences: &[ConsolidatedIncidence]) -> BTreeMap<IncidenceKey, usize> {
    let mut map = BTreeMap::new();
    for incidence in incidences {
        *map.entry(incidence.key()).or_insert(0) += incidence.affected_count;
    }
    map
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::incidence::{IncidenceKind, IncidenceStatistics, Severity};
    use chrono::Utc;
    use ledgerline_shared::types::{IncidenceId, UploadId};

    pub(crate) fn incidence(kind: IncidenceKind, sub_code: Option<&str>, count: usize) -> ConsolidatedIncidence {
        ConsolidatedIncidence {
            id: IncidenceId::new(),
            upload_id: UploadId::new(),
            kind,
            sub_code: sub_code.map(str::to_string),
            affected_count: count,
            severity: Severity::from_count(count),
            sample: Vec::new(),
            statistics: IncidenceStatistics {
                total_affected: count,
                ..IncidenceStatistics::default()
            },
            active: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_full_partial_new_and_worsened() {
        let previous = vec![
            incidence(IncidenceKind::UnrecognizedDocumentType, Some("99"), 4),
            incidence(IncidenceKind::MissingClassification, None, 10),
            incidence(IncidenceKind::NullDocumentType, None, 2),
            incidence(IncidenceKind::MissingEnglishName, None, 3),
        ];
        let current = vec![
            incidence(IncidenceKind::MissingClassification, None, 6),
            incidence(IncidenceKind::NullDocumentType, None, 5),
            incidence(IncidenceKind::MissingEnglishName, None, 3),
            incidence(IncidenceKind::UnrecognizedDocumentType, Some("12"), 1),
        ];

        let diff = diff_incidences(&previous, &current);

        assert_eq!(diff.resolved.len(), 2);
        assert_eq!(diff.fully_resolved(), 1);
        assert_eq!(diff.partially_resolved(), 1);
        let partial = diff
            .resolved
            .iter()
            .find(|c| c.key.kind == IncidenceKind::MissingClassification)
            .unwrap();
        assert_eq!(partial.delta(), 4);

        assert_eq!(diff.new.len(), 1);
        assert_eq!(diff.new[0].key.sub_code.as_deref(), Some("12"));
        assert_eq!(diff.worsened.len(), 1);
        assert_eq!(diff.worsened[0].delta(), 3);
        assert_eq!(diff.unchanged, 1);
    }

    #[test]
    fn test_identical_runs_are_unchanged() {
        let run = vec![
            incidence(IncidenceKind::UnrecognizedDocumentType, Some("99"), 1),
            incidence(IncidenceKind::AccountWithoutClassification, None, 2),
        ];
        let diff = diff_incidences(&run, &run.clone());
        assert!(diff.is_unchanged());
        assert_eq!(diff.unchanged, 2);
    }

    #[test]
    fn test_sub_codes_are_distinct_keys() {
        let previous = vec![incidence(IncidenceKind::UnrecognizedDocumentType, Some("99"), 1)];
        let current = vec![incidence(IncidenceKind::UnrecognizedDocumentType, Some("98"), 1)];
        let diff = diff_incidences(&previous, &current);
        assert_eq!(diff.fully_resolved(), 1);
        assert_eq!(diff.new.len(), 1);
    }
}
