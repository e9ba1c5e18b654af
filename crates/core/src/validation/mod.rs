//! Movement enrichment and validation.
//!
//! # Modules
//!
//! - `exceptions` - Per-account whitelist of suppressed checks
//! - `enricher` - Catalog enrichment and the three movement checks
//! - `error` - Enrichment error types

pub mod enricher;
pub mod error;
pub mod exceptions;

#[cfg(test)]
mod enricher_props;

pub use enricher::{AccountUpdate, CheckFailure, EnrichmentOutcome, MovementEnricher, MovementEnrichment};
pub use error::EnrichmentError;
pub use exceptions::{ExceptionKind, ExceptionSet, ValidationException};
