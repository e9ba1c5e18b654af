//! Incidence consolidation.
//!
//! Each bucket becomes one [`ConsolidatedIncidence`] carrying the full
//! count, a severity, a bounded sample and aggregate statistics. Buckets are
//! independent and consolidated on the rayon pool.

use std::collections::HashSet;

use chrono::Utc;
use rayon::prelude::*;
use rust_decimal::Decimal;

use ledgerline_shared::types::{IncidenceId, UploadId};

use super::detector::IncidenceBuckets;
use super::error::ConsolidationError;
use super::types::{
    ConsolidatedIncidence, IncidenceElement, IncidenceKey, IncidenceStatistics, Severity,
};

/// Builds consolidated incidences for one upload.
#[derive(Debug, Clone, Copy)]
pub struct IncidenceConsolidator {
    sample_size: usize,
}

impl IncidenceConsolidator {
    /// Default number of sample elements per incidence.
    pub const DEFAULT_SAMPLE_SIZE: usize = 10;

    /// Creates a consolidator keeping `sample_size` elements per incidence.
    ///
    /// # Errors
    ///
    /// Returns `ConsolidationError::InvalidSampleSize` for zero.
    pub fn new(sample_size: usize) -> Result<Self, ConsolidationError> {
        if sample_size == 0 {
            return Err(ConsolidationError::InvalidSampleSize);
        }
        Ok(Self { sample_size })
    }

    /// Consolidates every bucket, ordered by (kind name, sub-code).
    ///
    /// # Errors
    ///
    /// Returns `ConsolidationError::EmptyBucket` if a bucket has no elements.
    pub fn consolidate(
        &self,
        upload_id: UploadId,
        buckets: IncidenceBuckets,
    ) -> Result<Vec<ConsolidatedIncidence>, ConsolidationError> {
        let buckets: Vec<(IncidenceKey, Vec<IncidenceElement>)> = buckets.into_iter().collect();

        let mut incidences = buckets
            .into_par_iter()
            .map(|(key, elements)| self.consolidate_one(upload_id, key, elements))
            .collect::<Result<Vec<_>, _>>()?;

        incidences.sort_by(|a, b| a.key().cmp(&b.key()));
        Ok(incidences)
    }

    fn consolidate_one(
        &self,
        upload_id: UploadId,
        key: IncidenceKey,
        elements: Vec<IncidenceElement>,
    ) -> Result<ConsolidatedIncidence, ConsolidationError> {
        if elements.is_empty() {
            return Err(ConsolidationError::EmptyBucket(key.to_string()));
        }

        let statistics = statistics(&elements);
        let affected_count = elements.len();
        let mut sample = elements;
        sample.truncate(self.sample_size);

        Ok(ConsolidatedIncidence {
            id: IncidenceId::new(),
            upload_id,
            kind: key.kind,
            sub_code: key.sub_code,
            affected_count,
            severity: Severity::from_count(affected_count),
            sample,
            statistics,
            active: true,
            created_at: Utc::now(),
        })
    }
}

impl Default for IncidenceConsolidator {
    fn default() -> Self {
        Self {
            sample_size: Self::DEFAULT_SAMPLE_SIZE,
        }
    }
}

fn statistics(elements: &[IncidenceElement]) -> IncidenceStatistics {
    let distinct: HashSet<&str> = elements.iter().map(|e| e.account_code.as_str()).collect();
    IncidenceStatistics {
        total_affected: elements.len(),
        total_amount: elements.iter().map(IncidenceElement::amount).sum::<Decimal>(),
        distinct_accounts: distinct.len(),
    }
}
