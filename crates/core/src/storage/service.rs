//! Storage service implementation using Apache OpenDAL.

use opendal::{ErrorKind, Operator, services};

use ledgerline_shared::types::{ClientId, Period, UploadId};

use super::config::{StorageConfig, StorageProvider};
use super::error::StorageError;

/// Identifies where an uploaded ledger file is stored.
#[derive(Debug, Clone)]
pub struct LedgerObject {
    /// Owning client.
    pub client_id: ClientId,
    /// Period the file covers.
    pub period: Period,
    /// Upload the file belongs to.
    pub upload_id: UploadId,
    /// Original filename.
    pub filename: String,
}

/// Metadata about a stored ledger file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    /// Storage key.
    pub storage_key: String,
    /// File size in bytes.
    pub file_size: u64,
}

/// Object storage for uploaded ledger files.
#[derive(Clone)]
pub struct StorageService {
    operator: Operator,
    config: StorageConfig,
}

impl std::fmt::Debug for StorageService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageService")
            .field("provider", &self.config.provider.name())
            .field("max_file_size", &self.config.max_file_size)
            .finish_non_exhaustive()
    }
}

impl StorageService {
    /// Create a new storage service from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage provider cannot be initialized.
    pub fn from_config(config: StorageConfig) -> Result<Self, StorageError> {
        let operator = Self::create_operator(&config.provider)?;
        Ok(Self { operator, config })
    }

    /// In-memory storage with default limits.
    ///
    /// # Errors
    ///
    /// Returns an error if the memory backend cannot be built.
    pub fn in_memory() -> Result<Self, StorageError> {
        Self::from_config(StorageConfig::new(StorageProvider::Memory))
    }

    fn create_operator(provider: &StorageProvider) -> Result<Operator, StorageError> {
        let operator = match provider {
            StorageProvider::S3 {
                endpoint,
                bucket,
                access_key_id,
                secret_access_key,
                region,
            } => {
                let builder = services::S3::default()
                    .endpoint(endpoint)
                    .bucket(bucket)
                    .access_key_id(access_key_id)
                    .secret_access_key(secret_access_key)
                    .region(region);
                Operator::new(builder)
                    .map_err(|e| StorageError::configuration(e.to_string()))?
                    .finish()
            }
            StorageProvider::LocalFs { root } => {
                let builder = services::Fs::default().root(
                    root.to_str()
                        .ok_or_else(|| StorageError::configuration("invalid path"))?,
                );
                Operator::new(builder)
                    .map_err(|e| StorageError::configuration(e.to_string()))?
                    .finish()
            }
            StorageProvider::Memory => Operator::new(services::Memory::default())
                .map_err(|e| StorageError::configuration(e.to_string()))?
                .finish(),
        };
        Ok(operator)
    }

    /// Validate a ledger file against size and extension limits.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is too large or its extension is not accepted.
    pub fn validate_upload(&self, filename: &str, size: u64) -> Result<(), StorageError> {
        if size > self.config.max_file_size {
            return Err(StorageError::file_too_large(
                size,
                self.config.max_file_size,
            ));
        }

        if !self.config.is_extension_allowed(filename) {
            return Err(StorageError::unsupported_extension(filename));
        }

        Ok(())
    }

    /// Generate the storage key for a ledger file.
    ///
    /// Format: `{client_id}/{period}/{upload_id}/{sanitized_filename}`
    #[must_use]
    pub fn storage_key(object: &LedgerObject) -> String {
        format!(
            "{}/{}/{}/{}",
            object.client_id,
            object.period,
            object.upload_id,
            sanitize_filename(&object.filename)
        )
    }

    /// Validates and writes a ledger file.
    ///
    /// # Errors
    ///
    /// Returns a validation error or the backend failure.
    pub async fn put(&self, object: &LedgerObject, bytes: Vec<u8>) -> Result<StoredFile, StorageError> {
        let file_size = bytes.len() as u64;
        self.validate_upload(&object.filename, file_size)?;

        let key = Self::storage_key(object);
        self.operator.write(&key, bytes).await?;

        tracing::debug!(
            storage_key = %key,
            file_size,
            provider = self.config.provider.name(),
            "stored ledger file"
        );
        Ok(StoredFile {
            storage_key: key,
            file_size,
        })
    }

    /// Reads a stored file in full.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the key does not exist.
    pub async fn read(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        validate_key(key)?;
        match self.operator.read(key).await {
            Ok(buffer) => Ok(buffer.to_vec()),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StorageError::not_found(key)),
            Err(e) => Err(e.into()),
        }
    }

    /// Returns metadata for a stored file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file does not exist or cannot be accessed.
    pub async fn stat(&self, key: &str) -> Result<StoredFile, StorageError> {
        validate_key(key)?;
        let meta = match self.operator.stat(key).await {
            Ok(meta) => meta,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(StorageError::not_found(key)),
            Err(e) => return Err(e.into()),
        };

        Ok(StoredFile {
            storage_key: key.to_string(),
            file_size: meta.content_length(),
        })
    }

    /// Delete a file from storage.
    ///
    /// # Errors
    ///
    /// Returns an error if deletion fails.
    pub async fn delete(&self, key: &str) -> Result<(), StorageError> {
        validate_key(key)?;
        self.operator.delete(key).await.map_err(StorageError::from)
    }

    /// Check if a file exists in storage.
    pub async fn exists(&self, key: &str) -> bool {
        self.operator.stat(key).await.is_ok()
    }

    /// Get the configuration.
    #[must_use]
    pub const fn config(&self) -> &StorageConfig {
        &self.config
    }
}

fn validate_key(key: &str) -> Result<(), StorageError> {
    if key.is_empty() || key.ends_with('/') || key.split('/').any(|part| part == "..") {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    Ok(())
}

/// Sanitize filename for storage key.
///
/// Only ASCII alphanumerics, dots, hyphens and underscores survive.
fn sanitize_filename(filename: &str) -> String {
    filename
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn object(filename: &str) -> LedgerObject {
        LedgerObject {
            client_id: ClientId::new(),
            period: "202403".parse().unwrap(),
            upload_id: UploadId::new(),
            filename: filename.to_string(),
        }
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(
            sanitize_filename("76123456-K_LibroMayor_202403.xlsx"),
            "76123456-K_LibroMayor_202403.xlsx"
        );
        assert_eq!(sanitize_filename("libro mayor (1).csv"), "libro_mayor__1_.csv");
        assert_eq!(sanitize_filename("año.csv"), "a_o.csv");
    }

    #[test]
    fn test_storage_key_layout() {
        let obj = object("76123456-K_LibroMayor_202403.csv");
        let key = StorageService::storage_key(&obj);
        let parts: Vec<&str> = key.split('/').collect();
        assert_eq!(parts.len(), 4);
        assert_eq!(parts[0], obj.client_id.to_string());
        assert_eq!(parts[1], "202403");
        assert_eq!(parts[2], obj.upload_id.to_string());
        assert_eq!(parts[3], "76123456-K_LibroMayor_202403.csv");
    }

    #[test]
    fn test_validate_upload() {
        let config = StorageConfig::new(StorageProvider::Memory).with_max_file_size(100);
        let service = StorageService::from_config(config).unwrap();

        assert!(service.validate_upload("a_LibroMayor_202403.csv", 100).is_ok());
        assert!(matches!(
            service.validate_upload("a_LibroMayor_202403.csv", 101),
            Err(StorageError::FileTooLarge { size: 101, max: 100 })
        ));
        assert!(matches!(
            service.validate_upload("a_LibroMayor_202403.pdf", 10),
            Err(StorageError::UnsupportedExtension { .. })
        ));
    }

    #[tokio::test]
    async fn test_put_read_delete_in_memory() {
        let service = StorageService::in_memory().unwrap();
        let obj = object("ledger.csv");

        let stored = service.put(&obj, b"a;b;c\n".to_vec()).await.unwrap();
        assert_eq!(stored.file_size, 6);
        assert!(service.exists(&stored.storage_key).await);
        assert_eq!(service.stat(&stored.storage_key).await.unwrap(), stored);
        assert_eq!(service.read(&stored.storage_key).await.unwrap(), b"a;b;c\n");

        service.delete(&stored.storage_key).await.unwrap();
        assert!(!service.exists(&stored.storage_key).await);
        assert!(matches!(
            service.read(&stored.storage_key).await,
            Err(StorageError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_rejects_traversal_keys() {
        let service = StorageService::in_memory().unwrap();
        assert!(matches!(
            service.read("../etc/passwd").await,
            Err(StorageError::InvalidKey(_))
        ));
        assert!(matches!(service.read("").await, Err(StorageError::InvalidKey(_))));
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        // A file is accepted exactly when it is within the size limit and
        // carries an accepted extension.
        proptest! {
            #[test]
            fn prop_validate_upload(
                max_size in 1024u64..10_000_000,
                file_size in 0u64..20_000_000,
                ext in prop::sample::select(vec!["csv", "xlsx", "XLS", "pdf", "txt", "ods"]),
            ) {
                let config = StorageConfig::new(StorageProvider::Memory)
                    .with_max_file_size(max_size);
                let service = StorageService::from_config(config.clone())
                    .expect("should create service");
                let filename = format!("x_LibroMayor_202401.{ext}");

                let result = service.validate_upload(&filename, file_size);
                let should_pass = file_size <= max_size && config.is_extension_allowed(&filename);
                prop_assert_eq!(result.is_ok(), should_pass);
            }
        }

        proptest! {
            #[test]
            fn prop_sanitized_filename_safe_chars(filename in ".*") {
                let sanitized = sanitize_filename(&filename);

                for c in sanitized.chars() {
                    let is_safe = c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_';
                    prop_assert!(is_safe, "Unexpected character in sanitized filename: {}", c);
                }
                prop_assert_eq!(sanitized.chars().count(), filename.chars().count());
            }
        }

        proptest! {
            #[test]
            fn prop_storage_key_never_escapes_prefix(filename in "[^/]{0,40}") {
                let obj = object(&filename);
                let key = StorageService::storage_key(&obj);
                prop_assert_eq!(key.split('/').count(), 4);
                let prefix = format!("{}/{}/{}/", obj.client_id, obj.period, obj.upload_id);
                prop_assert!(key.starts_with(&prefix));
            }
        }
    }
}
