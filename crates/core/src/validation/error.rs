//! Enrichment error types.

use thiserror::Error;

/// Errors raised while preparing enrichment inputs.
///
/// None of these abort a run: the pipeline logs them and continues with an
/// empty catalog snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnrichmentError {
    /// A reference catalog could not be loaded.
    #[error("catalog '{catalog}' unavailable: {reason}")]
    CatalogUnavailable {
        /// Catalog name.
        catalog: String,
        /// Underlying failure.
        reason: String,
    },

    /// Validation exceptions could not be loaded.
    #[error("validation exceptions unavailable: {0}")]
    ExceptionsUnavailable(String),
}

impl EnrichmentError {
    /// Returns the error code for logs.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::CatalogUnavailable { .. } => "CATALOG_UNAVAILABLE",
            Self::ExceptionsUnavailable(_) => "EXCEPTIONS_UNAVAILABLE",
        }
    }
}
