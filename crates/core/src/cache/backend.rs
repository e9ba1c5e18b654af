//! Cache backends.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use moka::Expiry;
use moka::future::Cache;

use super::error::CacheError;

/// Key-value store holding serialized snapshots.
///
/// `get_many` must be answered in one backend round trip (a pipeline or
/// `MGET` on networked stores).
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Reads one value.
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Writes one value with a time-to-live.
    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError>;

    /// Reads several values, in key order.
    async fn get_many(&self, keys: &[String]) -> Result<Vec<Option<String>>, CacheError>;

    /// Deletes several keys, returning how many existed.
    async fn delete_many(&self, keys: &[String]) -> Result<usize, CacheError>;
}

#[derive(Debug, Clone)]
struct CachedValue {
    payload: Arc<str>,
    ttl: Duration,
}

/// Expires each entry after its own TTL.
struct PerEntryTtl;

impl Expiry<String, CachedValue> for PerEntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &CachedValue,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &CachedValue,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// In-process backend on `moka`.
#[derive(Clone)]
pub struct MokaBackend {
    cache: Cache<String, CachedValue>,
}

impl MokaBackend {
    /// Creates a backend bounded to `max_capacity` keys.
    #[must_use]
    pub fn new(max_capacity: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_capacity)
            .expire_after(PerEntryTtl)
            .build();
        Self { cache }
    }

    /// Runs pending maintenance (expiry, eviction) now.
    pub async fn run_pending_tasks(&self) {
        self.cache.run_pending_tasks().await;
    }
}

#[async_trait]
impl CacheBackend for MokaBackend {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        Ok(self
            .cache
            .get(key)
            .await
            .map(|value| value.payload.to_string()))
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        self.cache
            .insert(
                key.to_string(),
                CachedValue {
                    payload: Arc::from(value),
                    ttl,
                },
            )
            .await;
        Ok(())
    }

    async fn get_many(&self, keys: &[String]) -> Result<Vec<Option<String>>, CacheError> {
        let mut values = Vec::with_capacity(keys.len());
        for key in keys {
            values.push(self.cache.get(key).await.map(|v| v.payload.to_string()));
        }
        Ok(values)
    }

    async fn delete_many(&self, keys: &[String]) -> Result<usize, CacheError> {
        let mut removed = 0;
        for key in keys {
            if self.cache.remove(key).await.is_some() {
                removed += 1;
            }
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_delete() {
        let backend = MokaBackend::new(100);
        backend
            .set("k1", "v1".to_string(), Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(backend.get("k1").await.unwrap().as_deref(), Some("v1"));

        let values = backend
            .get_many(&["k1".to_string(), "missing".to_string()])
            .await
            .unwrap();
        assert_eq!(values, vec![Some("v1".to_string()), None]);

        let removed = backend
            .delete_many(&["k1".to_string(), "missing".to_string()])
            .await
            .unwrap();
        assert_eq!(removed, 1);
        assert_eq!(backend.get("k1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_entries_expire_after_their_ttl() {
        let backend = MokaBackend::new(100);
        backend
            .set("short", "v".to_string(), Duration::from_millis(30))
            .await
            .unwrap();
        backend
            .set("long", "v".to_string(), Duration::from_secs(60))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(80)).await;
        backend.run_pending_tasks().await;

        assert_eq!(backend.get("short").await.unwrap(), None);
        assert!(backend.get("long").await.unwrap().is_some());
    }
}
