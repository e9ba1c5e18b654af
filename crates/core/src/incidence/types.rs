//! Incidence domain types.

use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use ledgerline_shared::types::{IncidenceId, MovementId, UploadId};

/// Kind of data-quality problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidenceKind {
    /// Movement document type not in the catalog (sub-code = the code).
    UnrecognizedDocumentType,
    /// Movement without document type.
    NullDocumentType,
    /// Movement on an account without English name (bilingual clients).
    MissingEnglishName,
    /// Movement on an unclassified account.
    MissingClassification,
    /// Account without any classification.
    AccountWithoutClassification,
    /// Account without English name (bilingual clients).
    AccountWithoutEnglishName,
    /// Account first seen in this upload.
    NewAccountDetected,
}

impl IncidenceKind {
    /// Every kind.
    pub const ALL: [Self; 7] = [
        Self::UnrecognizedDocumentType,
        Self::NullDocumentType,
        Self::MissingEnglishName,
        Self::MissingClassification,
        Self::AccountWithoutClassification,
        Self::AccountWithoutEnglishName,
        Self::NewAccountDetected,
    ];

    /// Returns the string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::UnrecognizedDocumentType => "unrecognized_document_type",
            Self::NullDocumentType => "null_document_type",
            Self::MissingEnglishName => "missing_english_name",
            Self::MissingClassification => "missing_classification",
            Self::AccountWithoutClassification => "account_without_classification",
            Self::AccountWithoutEnglishName => "account_without_english_name",
            Self::NewAccountDetected => "new_account_detected",
        }
    }

    /// Parses a kind from a string.
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == s)
    }
}

impl fmt::Display for IncidenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Grouping key of a consolidated incidence.
///
/// Ordered by kind name, then sub-code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IncidenceKey {
    /// Incidence kind.
    pub kind: IncidenceKind,
    /// Sub-code (document-type code for unrecognized types).
    pub sub_code: Option<String>,
}

impl IncidenceKey {
    /// Key without sub-code.
    #[must_use]
    pub const fn new(kind: IncidenceKind) -> Self {
        Self {
            kind,
            sub_code: None,
        }
    }

    /// Key with a sub-code.
    #[must_use]
    pub fn with_sub_code(kind: IncidenceKind, sub_code: impl Into<String>) -> Self {
        Self {
            kind,
            sub_code: Some(sub_code.into()),
        }
    }
}

impl Ord for IncidenceKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.kind
            .as_str()
            .cmp(other.kind.as_str())
            .then_with(|| self.sub_code.cmp(&other.sub_code))
    }
}

impl PartialOrd for IncidenceKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for IncidenceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.sub_code {
            Some(code) => write!(f, "{}:{code}", self.kind),
            None => write!(f, "{}", self.kind),
        }
    }
}

/// Severity derived from the affected count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Up to 10 affected elements.
    Low,
    /// 11 to 50.
    Medium,
    /// 51 to 100.
    High,
    /// More than 100.
    Critical,
}

impl Severity {
    /// Classifies an affected count.
    #[must_use]
    pub const fn from_count(count: usize) -> Self {
        if count > 100 {
            Self::Critical
        } else if count > 50 {
            Self::High
        } else if count > 10 {
            Self::Medium
        } else {
            Self::Low
        }
    }

    /// Returns the string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    /// Parses a severity from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            "critical" => Some(Self::Critical),
            _ => None,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One affected movement or account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncidenceElement {
    /// Short human reference ("row 12 (1101)" or "account 1101 Caja").
    pub reference: String,
    /// Account code.
    pub account_code: String,
    /// Movement, for movement-level kinds.
    pub movement_id: Option<MovementId>,
    /// Source row, for movement-level kinds.
    pub row_number: Option<u32>,
    /// Movement date, for movement-level kinds.
    pub date: Option<NaiveDate>,
    /// Debit amount (account total for account-level kinds).
    pub debit: Decimal,
    /// Credit amount (account total for account-level kinds).
    pub credit: Decimal,
}

impl IncidenceElement {
    /// Gross amount (debit + credit).
    #[must_use]
    pub fn amount(&self) -> Decimal {
        self.debit + self.credit
    }
}

/// Aggregates over every element of an incidence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncidenceStatistics {
    /// Number of affected elements.
    pub total_affected: usize,
    /// Sum of debit + credit over all elements.
    pub total_amount: Decimal,
    /// Number of distinct account codes.
    pub distinct_accounts: usize,
}

/// A consolidated incidence of one upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsolidatedIncidence {
    /// Identifier.
    pub id: IncidenceId,
    /// Upload that produced it.
    pub upload_id: UploadId,
    /// Incidence kind.
    pub kind: IncidenceKind,
    /// Sub-code.
    pub sub_code: Option<String>,
    /// Full element count before sampling.
    pub affected_count: usize,
    /// Severity.
    pub severity: Severity,
    /// First elements in first-seen order.
    pub sample: Vec<IncidenceElement>,
    /// Aggregates over all elements.
    pub statistics: IncidenceStatistics,
    /// False once superseded by a reprocessing run.
    pub active: bool,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl ConsolidatedIncidence {
    /// Grouping key.
    #[must_use]
    pub fn key(&self) -> IncidenceKey {
        IncidenceKey {
            kind: self.kind,
            sub_code: self.sub_code.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0, Severity::Low)]
    #[case(10, Severity::Low)]
    #[case(11, Severity::Medium)]
    #[case(50, Severity::Medium)]
    #[case(51, Severity::High)]
    #[case(100, Severity::High)]
    #[case(101, Severity::Critical)]
    fn test_severity_thresholds(#[case] count: usize, #[case] expected: Severity) {
        assert_eq!(Severity::from_count(count), expected);
    }

    #[test]
    fn test_kind_names_parse_back() {
        for kind in IncidenceKind::ALL {
            assert_eq!(IncidenceKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(IncidenceKind::parse("unknown"), None);
    }

    #[test]
    fn test_key_order_is_kind_name_then_sub_code() {
        let mut keys = vec![
            IncidenceKey::with_sub_code(IncidenceKind::UnrecognizedDocumentType, "99"),
            IncidenceKey::new(IncidenceKind::NullDocumentType),
            IncidenceKey::with_sub_code(IncidenceKind::UnrecognizedDocumentType, "12"),
            IncidenceKey::new(IncidenceKind::AccountWithoutClassification),
        ];
        keys.sort();
        let rendered: Vec<String> = keys.iter().map(ToString::to_string).collect();
        assert_eq!(
            rendered,
            vec![
                "account_without_classification",
                "null_document_type",
                "unrecognized_document_type:12",
                "unrecognized_document_type:99",
            ]
        );
    }
}
