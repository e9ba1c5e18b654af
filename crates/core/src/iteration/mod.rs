//! Iteration and reprocessing support.
//!
//! Reprocessing re-evaluates an upload's stored movements against fresh
//! catalogs and exceptions, as a new iteration of the (client, closure)
//! series. This module holds the pure parts: the incidence diff and the
//! history record. Orchestration lives in `crate::pipeline`.

pub mod diff;
pub mod types;

#[cfg(test)]
mod diff_props;

pub use diff::{IncidenceChange, IterationDiff, diff_incidences};
pub use types::{IterationOutcome, ReprocessRequest, ReprocessingHistoryEntry};

use ledgerline_shared::types::{ClientId, ClosureId};

use crate::locks::KeyedLocks;

/// Per-(client, closure) leases serializing reprocessing in this process.
pub type IterationLocks = KeyedLocks<(ClientId, ClosureId)>;
