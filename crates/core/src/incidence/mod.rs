//! Incidence detection and consolidation.
//!
//! # Modules
//!
//! - `types` - Incidence kinds, severity and consolidated records
//! - `detector` - Buckets failed checks and account gaps by kind
//! - `consolidator` - Turns buckets into consolidated incidences
//! - `error` - Consolidation error types

pub mod consolidator;
pub mod detector;
pub mod error;
pub mod types;

#[cfg(test)]
mod consolidator_props;

pub use consolidator::IncidenceConsolidator;
pub use detector::{DetectionInput, IncidenceBuckets, IncidenceDetector};
pub use error::ConsolidationError;
pub use types::{
    ConsolidatedIncidence, IncidenceElement, IncidenceKey, IncidenceKind, IncidenceStatistics,
    Severity,
};
