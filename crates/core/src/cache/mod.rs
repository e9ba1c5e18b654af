//! Financial snapshot cache.
//!
//! Snapshots are JSON values keyed `<namespace>:<client>:<period>:<kind>`.
//! A per-client index (`<namespace>:<client>:periods`) records when each
//! period was written; after every write the client's periods beyond the
//! newest N are evicted under the same per-client lock. Only cached copies
//! are ever deleted.

pub mod backend;
pub mod error;
pub mod snapshot;
pub mod types;

pub use backend::{CacheBackend, MokaBackend};
pub use error::CacheError;
pub use snapshot::SnapshotCache;
pub use types::{SnapshotKind, index_key, snapshot_key};
