//! Durable store error types.

use thiserror::Error;

/// Errors raised by a [`super::LedgerStore`] implementation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Record does not exist.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Entity name (e.g. "upload").
        entity: &'static str,
        /// Identifier that was looked up.
        id: String,
    },

    /// Write conflicts with existing state.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Backend failure (connection, query, serialization).
    #[error("store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Create a not found error.
    #[must_use]
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Returns the error code for this error.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Conflict(_) => "CONFLICT",
            Self::Backend(_) => "STORE_BACKEND",
        }
    }

    /// Returns true if the same call may succeed later.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Conflict(_) | Self::Backend(_))
    }
}
