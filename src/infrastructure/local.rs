//! Bounded in-process cache tier with exact LRU eviction.
//!
//! The local tier is the fast path in front of the optional shared store.
//! It is a single mutex-guarded structure; critical sections never await,
//! so every operation is atomic from a task's point of view.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

/// One stored value with its TTL bookkeeping.
#[derive(Debug, Clone)]
struct LocalEntry {
    bytes: Vec<u8>,
    /// Offset from `UNIX_EPOCH` at write (or refresh) time.
    stored_at: Duration,
    ttl: Duration,
}

impl LocalEntry {
    fn is_expired(&self, now: Duration) -> bool {
        now >= self.stored_at + self.ttl
    }

    fn remaining(&self, now: Duration) -> Duration {
        (self.stored_at + self.ttl).saturating_sub(now)
    }
}

#[derive(Debug, Default)]
struct LruInner {
    entries: HashMap<String, LocalEntry>,
    /// Access order, least recently used at the front.
    order: VecDeque<String>,
}

impl LruInner {
    fn touch(&mut self, key: &str) {
        self.order.retain(|k| k != key);
        self.order.push_back(key.to_string());
    }

    fn forget(&mut self, key: &str) {
        self.order.retain(|k| k != key);
    }
}

/// Bounded local tier: exact least-recently-used eviction on insertion
/// pressure, lazy TTL expiry on access.
///
/// Time is always passed in by the caller so that the owning cache's clock
/// is the single source of time.
#[derive(Debug)]
pub struct LruTier {
    inner: Mutex<LruInner>,
    capacity: usize,
}

impl LruTier {
    /// Create a tier bounded to `capacity` entries (minimum 1).
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(LruInner::default()),
            capacity: capacity.max(1),
        }
    }

    /// Fetch the bytes under `key` if present and unexpired, marking the
    /// entry most recently used. `refresh_ttl` resets the entry's age.
    pub fn get(&self, key: &str, now: Duration, refresh_ttl: bool) -> Option<Vec<u8>> {
        let mut inner = self.inner.lock().unwrap();

        let expired = match inner.entries.get(key) {
            Some(entry) => entry.is_expired(now),
            None => return None,
        };

        if expired {
            inner.entries.remove(key);
            inner.forget(key);
            return None;
        }

        if refresh_ttl {
            if let Some(entry) = inner.entries.get_mut(key) {
                entry.stored_at = now;
            }
        }
        inner.touch(key);
        inner.entries.get(key).map(|entry| entry.bytes.clone())
    }

    /// Whether `key` holds an unexpired entry. Does not disturb recency.
    pub fn contains(&self, key: &str, now: Duration) -> bool {
        let inner = self.inner.lock().unwrap();
        inner
            .entries
            .get(key)
            .is_some_and(|entry| !entry.is_expired(now))
    }

    /// Store bytes under `key`, evicting the least recently used entry when
    /// at capacity. Returns the number of entries evicted (0 or 1).
    pub fn insert(&self, key: &str, bytes: Vec<u8>, ttl: Duration, now: Duration) -> u64 {
        let mut inner = self.inner.lock().unwrap();
        let mut evicted = 0;

        if !inner.entries.contains_key(key) && inner.entries.len() >= self.capacity {
            if let Some(lru_key) = inner.order.pop_front() {
                inner.entries.remove(&lru_key);
                evicted = 1;
            }
        }

        inner.entries.insert(
            key.to_string(),
            LocalEntry {
                bytes,
                stored_at: now,
                ttl,
            },
        );
        inner.touch(key);
        evicted
    }

    /// Remove `key`. Returns whether an entry existed.
    pub fn remove(&self, key: &str) -> bool {
        let mut inner = self.inner.lock().unwrap();
        let existed = inner.entries.remove(key).is_some();
        if existed {
            inner.forget(key);
        }
        existed
    }

    /// Remove every entry whose key starts with `prefix`. Returns the count
    /// removed.
    pub fn remove_prefix(&self, prefix: &str) -> u64 {
        let mut inner = self.inner.lock().unwrap();
        let before = inner.entries.len();
        inner.entries.retain(|k, _| !k.starts_with(prefix));
        inner.order.retain(|k| !k.starts_with(prefix));
        (before - inner.entries.len()) as u64
    }

    /// Remaining TTL and payload size for `key`, if present and unexpired.
    pub fn metadata(&self, key: &str, now: Duration) -> Option<(Duration, usize)> {
        let inner = self.inner.lock().unwrap();
        inner
            .entries
            .get(key)
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| (entry.remaining(now), entry.bytes.len()))
    }

    /// Number of entries currently held (including not-yet-collected
    /// expired ones).
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().entries.len()
    }

    /// Check if the tier is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(60);

    fn at(secs: u64) -> Duration {
        Duration::from_secs(secs)
    }

    #[test]
    fn test_insert_then_get() {
        let tier = LruTier::new(10);
        tier.insert("a", b"1".to_vec(), TTL, at(0));

        assert_eq!(tier.get("a", at(1), false), Some(b"1".to_vec()));
        assert_eq!(tier.get("missing", at(1), false), None);
    }

    #[test]
    fn test_expiry_is_lazy() {
        let tier = LruTier::new(10);
        tier.insert("a", b"1".to_vec(), Duration::from_secs(5), at(0));

        assert!(tier.contains("a", at(4)));
        assert_eq!(tier.len(), 1);

        // Past the TTL the entry reads as absent and is collected.
        assert_eq!(tier.get("a", at(5), false), None);
        assert_eq!(tier.len(), 0);
    }

    #[test]
    fn test_lru_eviction_is_exact() {
        let tier = LruTier::new(2);
        tier.insert("a", b"1".to_vec(), TTL, at(0));
        tier.insert("b", b"2".to_vec(), TTL, at(1));

        // Touch "a" so "b" becomes the LRU victim.
        tier.get("a", at(2), false);

        let evicted = tier.insert("c", b"3".to_vec(), TTL, at(3));
        assert_eq!(evicted, 1);
        assert!(tier.contains("a", at(3)));
        assert!(!tier.contains("b", at(3)));
        assert!(tier.contains("c", at(3)));
    }

    #[test]
    fn test_overwrite_does_not_evict() {
        let tier = LruTier::new(2);
        tier.insert("a", b"1".to_vec(), TTL, at(0));
        tier.insert("b", b"2".to_vec(), TTL, at(0));

        assert_eq!(tier.insert("a", b"3".to_vec(), TTL, at(1)), 0);
        assert_eq!(tier.get("a", at(1), false), Some(b"3".to_vec()));
        assert_eq!(tier.len(), 2);
    }

    #[test]
    fn test_ttl_refresh_on_get() {
        let tier = LruTier::new(10);
        tier.insert("a", b"1".to_vec(), Duration::from_secs(10), at(0));

        // Refreshing at t=8 pushes expiry to t=18.
        assert!(tier.get("a", at(8), true).is_some());
        assert!(tier.contains("a", at(15)));
        assert!(!tier.contains("a", at(18)));
    }

    #[test]
    fn test_remove_prefix() {
        let tier = LruTier::new(10);
        tier.insert("price:btc", b"1".to_vec(), TTL, at(0));
        tier.insert("price:eth", b"2".to_vec(), TTL, at(0));
        tier.insert("volume:btc", b"3".to_vec(), TTL, at(0));

        assert_eq!(tier.remove_prefix("price:"), 2);
        assert_eq!(tier.len(), 1);
        assert!(tier.contains("volume:btc", at(0)));
    }

    #[test]
    fn test_metadata() {
        let tier = LruTier::new(10);
        tier.insert("a", b"12345".to_vec(), Duration::from_secs(30), at(10));

        let (remaining, size) = tier.metadata("a", at(20)).unwrap();
        assert_eq!(remaining, Duration::from_secs(20));
        assert_eq!(size, 5);

        assert!(tier.metadata("a", at(40)).is_none());
        assert!(tier.metadata("missing", at(0)).is_none());
    }

    #[test]
    fn test_remove() {
        let tier = LruTier::new(10);
        tier.insert("a", b"1".to_vec(), TTL, at(0));

        assert!(tier.remove("a"));
        assert!(!tier.remove("a"));
        assert!(tier.is_empty());
    }
}
