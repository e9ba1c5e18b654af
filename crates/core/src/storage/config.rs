//! Storage configuration types.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use ledgerline_shared::config::{StorageKind, StorageSettings};

use super::error::StorageError;
use crate::intake::SUPPORTED_EXTENSIONS;

/// Storage provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StorageProvider {
    /// S3-compatible storage: Cloudflare R2, MinIO, AWS S3
    S3 {
        /// S3 endpoint URL.
        endpoint: String,
        /// S3 bucket name.
        bucket: String,
        /// Access key ID.
        access_key_id: String,
        /// Secret access key.
        secret_access_key: String,
        /// Region.
        region: String,
    },
    /// Local filesystem
    LocalFs {
        /// Root directory path.
        root: PathBuf,
    },
    /// In-process memory, lost on exit
    Memory,
}

impl StorageProvider {
    /// Create local filesystem provider.
    #[must_use]
    pub fn local_fs(root: impl Into<PathBuf>) -> Self {
        Self::LocalFs { root: root.into() }
    }

    /// Provider name as recorded in logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::S3 { .. } => "s3",
            Self::LocalFs { .. } => "local",
            Self::Memory => "memory",
        }
    }
}

/// Storage service configuration.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Storage provider configuration.
    pub provider: StorageProvider,
    /// Maximum file size in bytes.
    pub max_file_size: u64,
    /// Accepted ledger file extensions (lowercase, no dot).
    pub allowed_extensions: Vec<String>,
}

impl StorageConfig {
    /// Default max file size: 50MB.
    pub const DEFAULT_MAX_FILE_SIZE: u64 = 50 * 1024 * 1024;

    /// Creates a configuration with default limits.
    #[must_use]
    pub fn new(provider: StorageProvider) -> Self {
        Self {
            provider,
            max_file_size: Self::DEFAULT_MAX_FILE_SIZE,
            allowed_extensions: SUPPORTED_EXTENSIONS
                .iter()
                .map(|ext| (*ext).to_string())
                .collect(),
        }
    }

    /// Builds the configuration from application settings.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Configuration` when the S3 provider is selected
    /// without endpoint, bucket or credentials.
    pub fn from_settings(settings: &StorageSettings) -> Result<Self, StorageError> {
        let provider = match settings.provider {
            StorageKind::Fs => StorageProvider::local_fs(settings.root.clone()),
            StorageKind::Memory => StorageProvider::Memory,
            StorageKind::S3 => {
                let required = |value: &Option<String>, name: &str| {
                    value
                        .clone()
                        .filter(|v| !v.trim().is_empty())
                        .ok_or_else(|| StorageError::configuration(format!("s3 {name} is not set")))
                };
                StorageProvider::S3 {
                    endpoint: required(&settings.endpoint, "endpoint")?,
                    bucket: required(&settings.bucket, "bucket")?,
                    access_key_id: required(&settings.access_key_id, "access_key_id")?,
                    secret_access_key: required(&settings.secret_access_key, "secret_access_key")?,
                    region: settings.region.clone(),
                }
            }
        };

        Ok(Self::new(provider).with_max_file_size(settings.max_file_size))
    }

    /// Set maximum file size.
    #[must_use]
    pub const fn with_max_file_size(mut self, size: u64) -> Self {
        self.max_file_size = size;
        self
    }

    /// Check if a filename carries an accepted extension.
    #[must_use]
    pub fn is_extension_allowed(&self, filename: &str) -> bool {
        extension_of(filename).is_some_and(|ext| self.allowed_extensions.iter().any(|a| *a == ext))
    }
}

pub(super) fn extension_of(filename: &str) -> Option<String> {
    let (stem, ext) = filename.rsplit_once('.')?;
    (!stem.is_empty() && !ext.is_empty()).then(|| ext.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = StorageConfig::new(StorageProvider::Memory);
        assert_eq!(config.max_file_size, StorageConfig::DEFAULT_MAX_FILE_SIZE);
        assert!(config.is_extension_allowed("76123456-K_LibroMayor_202403.xlsx"));
        assert!(config.is_extension_allowed("ledger.CSV"));
        assert!(!config.is_extension_allowed("ledger.pdf"));
        assert!(!config.is_extension_allowed("ledger"));
        assert!(!config.is_extension_allowed(".csv"));
    }

    #[test]
    fn test_from_settings_memory_and_fs() {
        let mut settings = StorageSettings {
            provider: StorageKind::Memory,
            max_file_size: 1024,
            ..StorageSettings::default()
        };
        let config = StorageConfig::from_settings(&settings).unwrap();
        assert_eq!(config.provider.name(), "memory");
        assert_eq!(config.max_file_size, 1024);

        settings.provider = StorageKind::Fs;
        let config = StorageConfig::from_settings(&settings).unwrap();
        assert_eq!(config.provider.name(), "local");
    }

    #[test]
    fn test_from_settings_s3_requires_bucket() {
        let settings = StorageSettings {
            provider: StorageKind::S3,
            endpoint: Some("https://s3.example.com".to_string()),
            access_key_id: Some("key".to_string()),
            secret_access_key: Some("secret".to_string()),
            ..StorageSettings::default()
        };
        let err = StorageConfig::from_settings(&settings).unwrap_err();
        assert!(matches!(err, StorageError::Configuration(msg) if msg.contains("bucket")));
    }
}
