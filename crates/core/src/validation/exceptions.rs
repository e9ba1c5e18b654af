//! Validation exceptions.
//!
//! An exception whitelists one account code for one check. Exceptions are
//! read fresh on every run, so a revoked exception simply stops appearing.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use ledgerline_shared::types::ClientId;

/// Which check an exception suppresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExceptionKind {
    /// Document-type check (unrecognized and missing types).
    DocumentType,
    /// English-name check.
    EnglishName,
    /// Classification check.
    Classification,
    /// New-account notice.
    NewAccount,
}

impl ExceptionKind {
    /// Returns the string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::DocumentType => "document_type",
            Self::EnglishName => "english_name",
            Self::Classification => "classification",
            Self::NewAccount => "new_account",
        }
    }

    /// Parses a kind from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "document_type" => Some(Self::DocumentType),
            "english_name" => Some(Self::EnglishName),
            "classification" => Some(Self::Classification),
            "new_account" => Some(Self::NewAccount),
            _ => None,
        }
    }
}

impl fmt::Display for ExceptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A configured exception.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationException {
    /// Owning client.
    pub client_id: ClientId,
    /// Account code the exception applies to.
    pub account_code: String,
    /// Suppressed check.
    pub kind: ExceptionKind,
}

/// Exceptions of one client, indexed by (account code, kind).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExceptionSet {
    entries: HashSet<(String, ExceptionKind)>,
}

impl ExceptionSet {
    /// Builds the set from configured exceptions.
    pub fn new(exceptions: impl IntoIterator<Item = ValidationException>) -> Self {
        Self {
            entries: exceptions
                .into_iter()
                .map(|e| (e.account_code.trim().to_string(), e.kind))
                .collect(),
        }
    }

    /// Returns true if `kind` is suppressed for the account.
    #[must_use]
    pub fn suppresses(&self, account_code: &str, kind: ExceptionKind) -> bool {
        self.entries.contains(&(account_code.trim().to_string(), kind))
    }

    /// Number of exceptions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if there are no exceptions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_round_trip_names() {
        for kind in [
            ExceptionKind::DocumentType,
            ExceptionKind::EnglishName,
            ExceptionKind::Classification,
            ExceptionKind::NewAccount,
        ] {
            assert_eq!(ExceptionKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(ExceptionKind::parse("whatever"), None);
    }

    #[test]
    fn test_suppresses_only_matching_pair() {
        let client_id = ClientId::new();
        let set = ExceptionSet::new([ValidationException {
            client_id,
            account_code: " 1101 ".to_string(),
            kind: ExceptionKind::DocumentType,
        }]);
        assert!(set.suppresses("1101", ExceptionKind::DocumentType));
        assert!(!set.suppresses("1101", ExceptionKind::Classification));
        assert!(!set.suppresses("2101", ExceptionKind::DocumentType));
    }
}
