//! Snapshot cache with per-client period retention.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use ledgerline_shared::config::CacheSettings;
use ledgerline_shared::types::{ClientId, Period};

use super::backend::CacheBackend;
use super::error::CacheError;
use super::types::{SnapshotKind, index_key, snapshot_key};
use crate::locks::KeyedLocks;

/// Period -> time of its latest write.
type PeriodIndex = BTreeMap<Period, DateTime<Utc>>;

/// Snapshot read/write API over a [`CacheBackend`].
#[derive(Clone)]
pub struct SnapshotCache {
    backend: Arc<dyn CacheBackend>,
    namespace: String,
    default_ttl: Duration,
    max_entries_per_client: usize,
    locks: Arc<KeyedLocks<ClientId>>,
}

impl SnapshotCache {
    /// Creates a cache over `backend` using the configured namespace,
    /// default TTL and retention.
    #[must_use]
    pub fn new(backend: Arc<dyn CacheBackend>, settings: &CacheSettings) -> Self {
        Self {
            backend,
            namespace: settings.namespace.clone(),
            default_ttl: Duration::from_secs(settings.ttl_secs),
            max_entries_per_client: settings.max_entries_per_client.max(1),
            locks: Arc::new(KeyedLocks::new()),
        }
    }

    /// Periods kept per client after each write.
    #[must_use]
    pub const fn max_entries_per_client(&self) -> usize {
        self.max_entries_per_client
    }

    /// Writes a snapshot and evicts the client's oldest periods beyond the
    /// retention limit. `ttl` defaults to the configured TTL.
    pub async fn put<T: Serialize + Sync>(
        &self,
        client: ClientId,
        period: Period,
        kind: SnapshotKind,
        payload: &T,
        ttl: Option<Duration>,
    ) -> Result<(), CacheError> {
        let value = serde_json::to_string(payload)?;
        let ttl = ttl.unwrap_or(self.default_ttl);

        let _guard = self.locks.acquire(&client).await;

        self.backend
            .set(&snapshot_key(&self.namespace, client, period, kind), value, ttl)
            .await?;

        let mut index = self.read_index(client).await?;
        index.insert(period, Utc::now());
        self.write_index(client, &index, ttl).await?;

        self.evict_locked(client, self.max_entries_per_client).await?;
        Ok(())
    }

    /// Reads one snapshot.
    pub async fn get<T: DeserializeOwned>(
        &self,
        client: ClientId,
        period: Period,
        kind: SnapshotKind,
    ) -> Result<Option<T>, CacheError> {
        let raw = self
            .backend
            .get(&snapshot_key(&self.namespace, client, period, kind))
            .await?;
        raw.map(|s| serde_json::from_str(&s).map_err(CacheError::from))
            .transpose()
    }

    /// Reads several kinds of one period in a single backend round trip.
    /// Missing kinds are absent from the result.
    pub async fn get_batch(
        &self,
        client: ClientId,
        period: Period,
        kinds: &[SnapshotKind],
    ) -> Result<HashMap<SnapshotKind, serde_json::Value>, CacheError> {
        let keys: Vec<String> = kinds
            .iter()
            .map(|kind| snapshot_key(&self.namespace, client, period, *kind))
            .collect();
        let values = self.backend.get_many(&keys).await?;

        let mut out = HashMap::with_capacity(kinds.len());
        for (kind, value) in kinds.iter().zip(values) {
            if let Some(raw) = value {
                out.insert(*kind, serde_json::from_str(&raw)?);
            }
        }
        Ok(out)
    }

    /// Periods currently cached for a client, newest first.
    pub async fn cached_periods(&self, client: ClientId) -> Result<Vec<Period>, CacheError> {
        Ok(newest_first(&self.read_index(client).await?))
    }

    /// Keeps the newest `max_entries` periods of a client and deletes every
    /// snapshot kind of the rest. Returns the evicted periods.
    pub async fn enforce_retention(
        &self,
        client: ClientId,
        max_entries: usize,
    ) -> Result<Vec<Period>, CacheError> {
        let _guard = self.locks.acquire(&client).await;
        self.evict_locked(client, max_entries).await
    }

    async fn evict_locked(
        &self,
        client: ClientId,
        max_entries: usize,
    ) -> Result<Vec<Period>, CacheError> {
        let mut index = self.read_index(client).await?;
        let ordered = newest_first(&index);
        if ordered.len() <= max_entries {
            return Ok(Vec::new());
        }

        let evicted: Vec<Period> = ordered[max_entries..].to_vec();
        let keys: Vec<String> = evicted
            .iter()
            .flat_map(|period| {
                SnapshotKind::ALL
                    .iter()
                    .map(move |kind| snapshot_key(&self.namespace, client, *period, *kind))
            })
            .collect();
        let removed = self.backend.delete_many(&keys).await?;

        for period in &evicted {
            index.remove(period);
        }
        self.write_index(client, &index, self.default_ttl).await?;

        debug!(
            client_id = %client,
            evicted = evicted.len(),
            keys_removed = removed,
            "cache retention applied"
        );
        Ok(evicted)
    }

    async fn read_index(&self, client: ClientId) -> Result<PeriodIndex, CacheError> {
        match self.backend.get(&index_key(&self.namespace, client)).await? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(PeriodIndex::new()),
        }
    }

    async fn write_index(
        &self,
        client: ClientId,
        index: &PeriodIndex,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        self.backend
            .set(
                &index_key(&self.namespace, client),
                serde_json::to_string(index)?,
                ttl.max(self.default_ttl),
            )
            .await
    }
}

/// Newest write first; ties broken by the later period.
fn newest_first(index: &PeriodIndex) -> Vec<Period> {
    let mut entries: Vec<(&Period, &DateTime<Utc>)> = index.iter().collect();
    entries.sort_by(|a, b| b.1.cmp(a.1).then_with(|| b.0.cmp(a.0)));
    entries.into_iter().map(|(period, _)| *period).collect()
}
