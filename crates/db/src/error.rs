//! Repository error type.

use ledgerline_core::store::StoreError;
use sea_orm::{DbErr, SqlErr};

/// Errors raised by the repositories.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    /// Row does not exist.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Table-level entity name.
        entity: &'static str,
        /// Identifier that was looked up.
        id: String,
    },

    /// Stored value cannot be mapped to the domain type.
    #[error("Invalid stored {field}: {value}")]
    InvalidData {
        /// Column name.
        field: &'static str,
        /// Offending value.
        value: String,
    },

    /// JSON column (de)serialization failed.
    #[error("JSON column error: {0}")]
    Json(#[from] serde_json::Error),

    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}

impl RepositoryError {
    pub(crate) fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub(crate) fn invalid(field: &'static str, value: impl ToString) -> Self {
        Self::InvalidData {
            field,
            value: value.to_string(),
        }
    }
}

impl From<RepositoryError> for StoreError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { entity, id } => Self::NotFound { entity, id },
            RepositoryError::Database(db) => match db.sql_err() {
                Some(SqlErr::UniqueConstraintViolation(msg)) => Self::Conflict(msg),
                _ => Self::Backend(db.to_string()),
            },
            other => Self::Backend(other.to_string()),
        }
    }
}
