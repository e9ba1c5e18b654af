//! Processing summary stored with each upload.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Wall-clock time spent in one stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageTiming {
    /// Stage name.
    pub stage: String,
    /// Elapsed milliseconds.
    pub millis: u64,
}

/// Counters and timings of one pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingSummary {
    /// Rows inspected below the header.
    pub rows_scanned: usize,
    /// Accounts in the file.
    pub accounts: usize,
    /// Accounts first seen in this upload.
    pub new_accounts: usize,
    /// Opening balances.
    pub opening_balances: usize,
    /// Movements stored.
    pub movements: usize,
    /// Movements left incomplete.
    pub incomplete_movements: usize,
    /// Movements whose incomplete flag was cleared.
    pub corrected_movements: usize,
    /// Rejected rows.
    pub row_errors: usize,
    /// Consolidated incidences.
    pub incidences: usize,
    /// Incidence count per severity name.
    pub incidences_by_severity: BTreeMap<String, usize>,
    /// Earliest movement date.
    pub min_date: Option<NaiveDate>,
    /// Latest movement date.
    pub max_date: Option<NaiveDate>,
    /// True if catalogs could not be loaded and the run used empty ones.
    pub catalogs_degraded: bool,
    /// Per-stage timings in execution order.
    pub stages: Vec<StageTiming>,
    /// Total run time in milliseconds.
    pub duration_ms: u64,
}

/// Joins row warnings into the single text stored on the upload.
#[must_use]
pub fn join_warnings(warnings: &[String]) -> Option<String> {
    (!warnings.is_empty()).then(|| warnings.join("; "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_warnings() {
        assert_eq!(join_warnings(&[]), None);
        assert_eq!(
            join_warnings(&["row 2: a".to_string(), "row 9: b".to_string()]).as_deref(),
            Some("row 2: a; row 9: b")
        );
    }

    #[test]
    fn test_summary_serializes_to_json_object() {
        let mut summary = ProcessingSummary {
            movements: 3,
            ..ProcessingSummary::default()
        };
        summary.incidences_by_severity.insert("low".to_string(), 1);
        summary.stages.push(StageTiming {
            stage: "parse".to_string(),
            millis: 12,
        });

        let value = serde_json::to_value(&summary).unwrap();
        assert_eq!(value["movements"], 3);
        assert_eq!(value["incidences_by_severity"]["low"], 1);
        assert_eq!(value["stages"][0]["stage"], "parse");

        let back: ProcessingSummary = serde_json::from_value(value).unwrap();
        assert_eq!(back, summary);
    }
}
