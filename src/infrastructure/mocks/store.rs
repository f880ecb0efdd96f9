//! In-memory shared store for testing.

use crate::application::ports::{Clock, SharedStore, StoreError};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// In-memory `SharedStore` with TTL bookkeeping driven by a `Clock`.
///
/// Stands in for the Redis tier in tests: read-through population, TTL
/// expiry, and degraded-mode behavior can all be exercised without a
/// running backend. `fail_next` makes the next operation return an error so
/// tests can assert the cache degrades to a miss instead of failing the
/// caller.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    entries: Arc<DashMap<String, StoredEntry>>,
    clock: Arc<dyn Clock>,
    fail_next: Arc<AtomicBool>,
    gets: Arc<AtomicU64>,
    sets: Arc<AtomicU64>,
}

#[derive(Debug, Clone)]
struct StoredEntry {
    bytes: Vec<u8>,
    expires_at: Duration,
}

impl MemoryStore {
    /// Create an empty store reading time from `clock`.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            clock,
            fail_next: Arc::new(AtomicBool::new(false)),
            gets: Arc::new(AtomicU64::new(0)),
            sets: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Make the next store operation fail with a `StoreError`.
    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    /// Number of `get` calls observed (read-through assertions).
    pub fn get_count(&self) -> u64 {
        self.gets.load(Ordering::SeqCst)
    }

    /// Number of `set` calls observed (write-mirroring assertions).
    pub fn set_count(&self) -> u64 {
        self.sets.load(Ordering::SeqCst)
    }

    /// Number of unexpired entries currently stored.
    pub fn len(&self) -> usize {
        let now = self.clock.now();
        self.entries.iter().filter(|e| e.expires_at > now).count()
    }

    /// Check if the store holds no unexpired entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry without touching counters.
    pub fn wipe(&self) {
        self.entries.clear();
    }

    fn check_failure(&self) -> Result<(), StoreError> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            Err(StoreError::new("injected failure"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl SharedStore for MemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        self.check_failure()
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        self.check_failure()?;
        self.gets.fetch_add(1, Ordering::SeqCst);

        let now = self.clock.now();
        let (bytes, expired) = match self.entries.get(key) {
            Some(entry) if entry.expires_at > now => (Some(entry.bytes.clone()), false),
            Some(_) => (None, true),
            None => (None, false),
        };

        // The read guard is released above; removing here cannot deadlock
        // on the same shard.
        if expired {
            self.entries.remove(key);
        }
        Ok(bytes)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), StoreError> {
        self.check_failure()?;
        self.sets.fetch_add(1, Ordering::SeqCst);

        self.entries.insert(
            key.to_string(),
            StoredEntry {
                bytes: value,
                expires_at: self.clock.now() + ttl,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        self.check_failure()?;
        Ok(self.entries.remove(key).is_some())
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<u64, StoreError> {
        self.check_failure()?;
        let before = self.entries.len();
        self.entries.retain(|k, _| !k.starts_with(prefix));
        Ok((before - self.entries.len()) as u64)
    }

    async fn ttl_remaining(&self, key: &str) -> Result<Option<Duration>, StoreError> {
        self.check_failure()?;
        let now = self.clock.now();
        Ok(self
            .entries
            .get(key)
            .filter(|entry| entry.expires_at > now)
            .map(|entry| entry.expires_at - now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::mocks::MockClock;

    fn store() -> (MemoryStore, MockClock) {
        let clock = MockClock::at_epoch_secs(1_000);
        let store = MemoryStore::new(Arc::new(clock.clone()));
        (store, clock)
    }

    #[tokio::test]
    async fn test_round_trip() {
        let (store, _clock) = store();
        store
            .set("k", b"v".to_vec(), Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(store.get("k").await.unwrap(), Some(b"v".to_vec()));
        assert_eq!(store.get_count(), 1);
        assert_eq!(store.set_count(), 1);
    }

    #[tokio::test]
    async fn test_ttl_expiry() {
        let (store, clock) = store();
        store
            .set("k", b"v".to_vec(), Duration::from_secs(10))
            .await
            .unwrap();

        clock.advance(Duration::from_secs(11));
        assert_eq!(store.get("k").await.unwrap(), None);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_injected_failure_is_one_shot() {
        let (store, _clock) = store();
        store.fail_next();

        assert!(store.get("k").await.is_err());
        assert!(store.get("k").await.is_ok());
    }

    #[tokio::test]
    async fn test_delete_prefix() {
        let (store, _clock) = store();
        for key in ["a:1", "a:2", "b:1"] {
            store
                .set(key, b"v".to_vec(), Duration::from_secs(60))
                .await
                .unwrap();
        }

        assert_eq!(store.delete_prefix("a:").await.unwrap(), 2);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_ttl_remaining() {
        let (store, clock) = store();
        store
            .set("k", b"v".to_vec(), Duration::from_secs(30))
            .await
            .unwrap();

        clock.advance(Duration::from_secs(12));
        assert_eq!(
            store.ttl_remaining("k").await.unwrap(),
            Some(Duration::from_secs(18))
        );
        assert_eq!(store.ttl_remaining("missing").await.unwrap(), None);
    }
}
