//! Reference lookups consumed by enrichment.
//!
//! Catalogs are maintained by separate uploaders; the pipeline loads one
//! read-only [`CatalogSnapshot`] per run and never writes to them.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

/// Result of a catalog lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup<T> {
    /// Key present.
    Found(T),
    /// Key absent.
    NotFound,
}

impl<T> Lookup<T> {
    /// Returns true for `Found`.
    #[must_use]
    pub const fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }

    /// Converts into an `Option`.
    #[must_use]
    pub fn found(self) -> Option<T> {
        match self {
            Self::Found(value) => Some(value),
            Self::NotFound => None,
        }
    }
}

impl<T> From<Option<T>> for Lookup<T> {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::NotFound, Self::Found)
    }
}

/// Normalizes a document-type code: trimmed, leading zeros removed from
/// purely numeric codes ("033" and "33" are the same type).
#[must_use]
pub fn normalize_document_code(raw: &str) -> String {
    let trimmed = raw.trim();
    if !trimmed.is_empty() && trimmed.bytes().all(|b| b.is_ascii_digit()) {
        let stripped = trimmed.trim_start_matches('0');
        if stripped.is_empty() { "0" } else { stripped }.to_string()
    } else {
        trimmed.to_uppercase()
    }
}

/// Document type code -> description.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentTypeCatalog {
    entries: HashMap<String, String>,
}

impl DocumentTypeCatalog {
    /// Builds the catalog, normalizing codes.
    pub fn new(entries: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            entries: entries
                .into_iter()
                .map(|(code, description)| (normalize_document_code(&code), description))
                .collect(),
        }
    }

    /// Looks up a document type by code.
    #[must_use]
    pub fn lookup(&self, code: &str) -> Lookup<&str> {
        self.entries
            .get(&normalize_document_code(code))
            .map(String::as_str)
            .into()
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Account code -> English name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnglishNameCatalog {
    entries: HashMap<String, String>,
}

impl EnglishNameCatalog {
    /// Builds the catalog, dropping blank names.
    pub fn new(entries: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            entries: entries
                .into_iter()
                .filter(|(_, name)| !name.trim().is_empty())
                .map(|(code, name)| (code.trim().to_string(), name.trim().to_string()))
                .collect(),
        }
    }

    /// Looks up the English name of an account.
    #[must_use]
    pub fn lookup(&self, account_code: &str) -> Lookup<&str> {
        self.entries
            .get(account_code.trim())
            .map(String::as_str)
            .into()
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Account code -> classification set -> option.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationCatalog {
    entries: HashMap<String, BTreeMap<String, String>>,
}

impl ClassificationCatalog {
    /// Builds the catalog from `(account code, set, option)` triples.
    pub fn new(entries: impl IntoIterator<Item = (String, String, String)>) -> Self {
        let mut map: HashMap<String, BTreeMap<String, String>> = HashMap::new();
        for (code, set, option) in entries {
            map.entry(code.trim().to_string())
                .or_default()
                .insert(set, option);
        }
        Self { entries: map }
    }

    /// Looks up every classification assigned to an account.
    #[must_use]
    pub fn lookup(&self, account_code: &str) -> Lookup<&BTreeMap<String, String>> {
        self.entries
            .get(account_code.trim())
            .filter(|sets| !sets.is_empty())
            .into()
    }

    /// Number of classified accounts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// All catalogs for one pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogSnapshot {
    /// Document types.
    pub document_types: DocumentTypeCatalog,
    /// English account names.
    pub english_names: EnglishNameCatalog,
    /// Account classifications.
    pub classifications: ClassificationCatalog,
}

impl CatalogSnapshot {
    /// Snapshot used when catalogs cannot be loaded: every lookup misses.
    #[must_use]
    pub fn unavailable() -> Self {
        Self::default()
    }
}
