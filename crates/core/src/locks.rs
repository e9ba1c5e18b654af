//! Keyed async mutexes.
//!
//! One `tokio::sync::Mutex` per key, created on first use and dropped again
//! once nobody holds or waits for it. Used to serialize reprocessing per
//! (client, closure) and cache writes per client.

use std::hash::Hash;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

type LockMap<K> = DashMap<K, Arc<Mutex<()>>>;

/// A lazily populated map of per-key mutexes.
#[derive(Debug)]
pub struct KeyedLocks<K: Eq + Hash> {
    locks: Arc<LockMap<K>>,
}

/// Holds the lock of one key. Releasing the last interest in a key removes
/// its entry from the map.
#[derive(Debug)]
pub struct KeyedGuard<K: Eq + Hash> {
    guard: Option<OwnedMutexGuard<()>>,
    key: Option<K>,
    locks: Arc<LockMap<K>>,
}

impl<K: Eq + Hash> Drop for KeyedGuard<K> {
    fn drop(&mut self) {
        drop(self.guard.take());
        if let Some(key) = self.key.take() {
            // Waiters hold their own clone of the Arc.
            self.locks
                .remove_if(&key, |_, mutex| Arc::strong_count(mutex) == 1);
        }
    }
}

impl<K: Eq + Hash + Clone> KeyedLocks<K> {
    /// Creates an empty lock map.
    #[must_use]
    pub fn new() -> Self {
        Self {
            locks: Arc::new(DashMap::new()),
        }
    }

    /// Waits for the lock of `key`. The lock is held until the guard drops.
    pub async fn acquire(&self, key: &K) -> KeyedGuard<K> {
        let guard = self.mutex(key).lock_owned().await;
        KeyedGuard {
            guard: Some(guard),
            key: Some(key.clone()),
            locks: Arc::clone(&self.locks),
        }
    }

    /// Number of keys currently held or awaited.
    #[must_use]
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    /// Returns true if no key is held or awaited.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }

    fn mutex(&self, key: &K) -> Arc<Mutex<()>> {
        // Clone the Arc out so the shard guard drops before awaiting.
        self.locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

impl<K: Eq + Hash + Clone> Default for KeyedLocks<K> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_key_is_exclusive() {
        let locks: KeyedLocks<&str> = KeyedLocks::new();
        let guard = locks.acquire(&"a").await;

        let blocked = tokio::time::timeout(Duration::from_millis(20), locks.acquire(&"a")).await;
        assert!(blocked.is_err());
        let other = tokio::time::timeout(Duration::from_millis(20), locks.acquire(&"b")).await;
        assert!(other.is_ok());

        drop(guard);
        let again = tokio::time::timeout(Duration::from_millis(20), locks.acquire(&"a")).await;
        assert!(again.is_ok());
    }

    #[tokio::test]
    async fn test_waiter_proceeds_after_release() {
        let locks: Arc<KeyedLocks<u32>> = Arc::new(KeyedLocks::new());
        let guard = locks.acquire(&1).await;

        let waiter = {
            let locks = Arc::clone(&locks);
            tokio::spawn(async move {
                let _guard = locks.acquire(&1).await;
                true
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());
        drop(guard);
        assert!(waiter.await.unwrap());
    }

    #[tokio::test]
    async fn test_released_keys_are_pruned() {
        let locks: KeyedLocks<u32> = KeyedLocks::new();
        for key in 0..100 {
            let _guard = locks.acquire(&key).await;
            assert_eq!(locks.len(), 1);
        }
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_key_with_waiter_survives_release() {
        let locks: Arc<KeyedLocks<u32>> = Arc::new(KeyedLocks::new());
        let guard = locks.acquire(&7).await;

        let waiter = {
            let locks = Arc::clone(&locks);
            tokio::spawn(async move {
                let _guard = locks.acquire(&7).await;
                tokio::time::sleep(Duration::from_millis(20)).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        drop(guard);
        assert_eq!(locks.len(), 1);

        waiter.await.unwrap();
        assert!(locks.is_empty());
    }
}
