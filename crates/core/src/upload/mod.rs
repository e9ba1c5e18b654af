//! Upload records and their lifecycle.
//!
//! # Modules
//!
//! - `types` - Upload state, transitions and the upload record
//! - `lifecycle` - Stateless transition validation
//! - `summary` - Structured processing summary
//! - `error` - Upload error types

pub mod error;
pub mod lifecycle;
pub mod summary;
pub mod types;

pub use error::UploadError;
pub use lifecycle::UploadLifecycle;
pub use summary::{ProcessingSummary, StageTiming, join_warnings};
pub use types::{NewUpload, UploadRecord, UploadState, UploadTransition};
