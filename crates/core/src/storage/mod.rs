//! Object storage for uploaded ledger files using Apache OpenDAL.
//!
//! Supported backends:
//! - S3-compatible: Cloudflare R2, MinIO, AWS S3
//! - Local filesystem
//! - In-process memory
//!
//! Files are keyed `{client_id}/{period}/{upload_id}/{filename}` so every
//! iteration of a period keeps its own copy.

mod config;
mod error;
mod service;

pub use config::{StorageConfig, StorageProvider};
pub use error::StorageError;
pub use service::{LedgerObject, StorageService, StoredFile};
