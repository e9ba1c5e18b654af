//! Application-wide error types.

use thiserror::Error;

/// Result type alias using `AppError`.
pub type AppResult<T> = Result<T, AppError>;

/// Application error types.
#[derive(Debug, Error)]
pub enum AppError {
    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Validation error.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Business rule violation.
    #[error("Business rule violation: {0}")]
    BusinessRule(String),

    /// Conflict (e.g., concurrent reprocessing of the same period).
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Database error.
    #[error("Database error: {0}")]
    Database(String),

    /// Object storage error.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Snapshot cache error.
    #[error("Cache error: {0}")]
    Cache(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Returns the error code used in logs and persisted summaries.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NOT_FOUND",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::BusinessRule(_) => "BUSINESS_RULE_VIOLATION",
            Self::Conflict(_) => "CONFLICT",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Storage(_) => "STORAGE_ERROR",
            Self::Cache(_) => "CACHE_ERROR",
            Self::Configuration(_) => "CONFIGURATION_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Returns the process exit code a command-line runner should use.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::NotFound(_) | Self::Validation(_) | Self::BusinessRule(_) => 2,
            Self::Conflict(_) => 3,
            Self::Configuration(_) => 78,
            Self::Database(_) | Self::Storage(_) | Self::Cache(_) | Self::Internal(_) => 1,
        }
    }

    /// Returns true if retrying the same operation later may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Conflict(_) | Self::Database(_) | Self::Storage(_) | Self::Cache(_)
        )
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        Self::Configuration(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(AppError::NotFound(String::new()), "NOT_FOUND", 2)]
    #[case(AppError::Validation(String::new()), "VALIDATION_ERROR", 2)]
    #[case(AppError::BusinessRule(String::new()), "BUSINESS_RULE_VIOLATION", 2)]
    #[case(AppError::Conflict(String::new()), "CONFLICT", 3)]
    #[case(AppError::Database(String::new()), "DATABASE_ERROR", 1)]
    #[case(AppError::Storage(String::new()), "STORAGE_ERROR", 1)]
    #[case(AppError::Cache(String::new()), "CACHE_ERROR", 1)]
    #[case(AppError::Configuration(String::new()), "CONFIGURATION_ERROR", 78)]
    #[case(AppError::Internal(String::new()), "INTERNAL_ERROR", 1)]
    fn test_codes(#[case] err: AppError, #[case] code: &str, #[case] exit: i32) {
        assert_eq!(err.error_code(), code);
        assert_eq!(err.exit_code(), exit);
    }

    #[test]
    fn test_retryable_errors() {
        assert!(AppError::Conflict(String::new()).is_retryable());
        assert!(AppError::Storage(String::new()).is_retryable());
        assert!(!AppError::Validation(String::new()).is_retryable());
        assert!(!AppError::NotFound(String::new()).is_retryable());
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            AppError::NotFound("msg".into()).to_string(),
            "Not found: msg"
        );
        assert_eq!(
            AppError::Conflict("msg".into()).to_string(),
            "Conflict: msg"
        );
        assert_eq!(
            AppError::Cache("msg".into()).to_string(),
            "Cache error: msg"
        );
    }
}
