//! Snapshot kinds and key layout.

use std::fmt;

use serde::{Deserialize, Serialize};

use ledgerline_shared::types::{ClientId, Period};

/// Kind of cached financial snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SnapshotKind {
    /// Balance sheet.
    BalanceSheet,
    /// Income statement.
    IncomeStatement,
    /// Statement of changes in equity.
    EquityStatement,
    /// Key performance indicators.
    Kpis,
    /// Data-quality alerts (consolidated incidences).
    Alerts,
    /// Last pipeline run status.
    ProcessingStatus,
}

impl SnapshotKind {
    /// Every kind.
    pub const ALL: [Self; 6] = [
        Self::BalanceSheet,
        Self::IncomeStatement,
        Self::EquityStatement,
        Self::Kpis,
        Self::Alerts,
        Self::ProcessingStatus,
    ];

    /// Key segment of the kind.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::BalanceSheet => "balance-sheet",
            Self::IncomeStatement => "income-statement",
            Self::EquityStatement => "equity-statement",
            Self::Kpis => "kpis",
            Self::Alerts => "alerts",
            Self::ProcessingStatus => "processing-status",
        }
    }

    /// Parses a kind from its key segment.
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == s)
    }
}

impl fmt::Display for SnapshotKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `<namespace>:<client>:<period>:<kind>`
#[must_use]
pub fn snapshot_key(namespace: &str, client: ClientId, period: Period, kind: SnapshotKind) -> String {
    format!("{namespace}:{client}:{period}:{kind}")
}

/// `<namespace>:<client>:periods`
#[must_use]
pub fn index_key(namespace: &str, client: ClientId) -> String {
    format!("{namespace}:{client}:periods")
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_key_layout() {
        let client = ClientId::from_uuid(Uuid::nil());
        let period: Period = "202403".parse().unwrap();
        assert_eq!(
            snapshot_key("ledgerline", client, period, SnapshotKind::BalanceSheet),
            "ledgerline:00000000-0000-0000-0000-000000000000:202403:balance-sheet"
        );
        assert_eq!(
            index_key("ledgerline", client),
            "ledgerline:00000000-0000-0000-0000-000000000000:periods"
        );
    }

    #[test]
    fn test_kind_names() {
        for kind in SnapshotKind::ALL {
            assert_eq!(SnapshotKind::parse(kind.as_str()), Some(kind));
            assert_eq!(
                serde_json::to_value(kind).unwrap(),
                serde_json::Value::String(kind.as_str().to_string())
            );
        }
    }
}
