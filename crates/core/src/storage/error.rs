//! Errors raised by the ledger file store.

use thiserror::Error;

/// Failures storing or fetching uploaded ledger files.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Upload is bigger than `storage.max_file_size`.
    #[error("ledger file is {size} bytes, limit is {max} bytes")]
    FileTooLarge {
        /// Size of the rejected upload.
        size: u64,
        /// Configured limit.
        max: u64,
    },

    /// Filename does not end in a spreadsheet or CSV extension.
    #[error("file '{filename}' does not have an accepted ledger extension")]
    UnsupportedExtension {
        /// Offending filename.
        filename: String,
    },

    /// No object under the key.
    #[error("stored ledger file not found: {key}")]
    NotFound {
        /// Object key.
        key: String,
    },

    /// Provider settings are incomplete or rejected by the backend.
    #[error("storage configuration error: {0}")]
    Configuration(String),

    /// Key is empty, absolute or escapes the storage root.
    #[error("invalid storage key: {0}")]
    InvalidKey(String),

    /// Any other backend failure.
    #[error("storage backend error ({kind}): {message}")]
    Backend {
        /// OpenDAL error kind.
        kind: String,
        /// Backend message.
        message: String,
        /// Whether OpenDAL marked the failure temporary.
        temporary: bool,
    },
}

impl StorageError {
    #[must_use]
    pub(crate) const fn file_too_large(size: u64, max: u64) -> Self {
        Self::FileTooLarge { size, max }
    }

    #[must_use]
    pub(crate) fn unsupported_extension(filename: impl Into<String>) -> Self {
        Self::UnsupportedExtension {
            filename: filename.into(),
        }
    }

    #[must_use]
    pub(crate) fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound { key: key.into() }
    }

    #[must_use]
    pub(crate) fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Returns the error code for this error.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::FileTooLarge { .. } => "FILE_TOO_LARGE",
            Self::UnsupportedExtension { .. } => "UNSUPPORTED_EXTENSION",
            Self::NotFound { .. } => "FILE_NOT_FOUND",
            Self::Configuration(_) => "STORAGE_CONFIGURATION",
            Self::InvalidKey(_) => "INVALID_STORAGE_KEY",
            Self::Backend { .. } => "STORAGE_BACKEND",
        }
    }

    /// True for backend failures that may succeed on retry.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Backend { temporary: true, .. })
    }
}

impl From<opendal::Error> for StorageError {
    fn from(err: opendal::Error) -> Self {
        match err.kind() {
            opendal::ErrorKind::NotFound => Self::NotFound {
                key: err.to_string(),
            },
            opendal::ErrorKind::ConfigInvalid => Self::Configuration(err.to_string()),
            kind => Self::Backend {
                kind: kind.to_string(),
                temporary: err.is_temporary(),
                message: err.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_errors_keep_temporary_flag() {
        let err = opendal::Error::new(opendal::ErrorKind::Unexpected, "connection reset").set_temporary();
        let storage = StorageError::from(err);
        assert!(storage.is_transient());
        assert_eq!(storage.error_code(), "STORAGE_BACKEND");
    }

    #[test]
    fn test_missing_object_maps_to_not_found() {
        let err = opendal::Error::new(opendal::ErrorKind::NotFound, "no such key");
        assert!(matches!(StorageError::from(err), StorageError::NotFound { .. }));
    }

    #[test]
    fn test_limits_are_not_transient() {
        assert!(!StorageError::file_too_large(10, 5).is_transient());
        assert!(!StorageError::unsupported_extension("ledger.pdf").is_transient());
    }
}
