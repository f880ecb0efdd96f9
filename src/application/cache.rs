//! Two-tier key/value cache.
//!
//! The cache is the one piece of truly shared mutable state in the core: a
//! bounded, LRU-evicting local tier backed by an optional shared store
//! (Redis in production). Every key is namespaced with a configured prefix
//! before touching either tier, so multiple logical caches can share one
//! backing store without colliding.
//!
//! ## Degradation
//!
//! Shared-tier failures never reach the caller: a failed read is a miss, a
//! failed write is a warning. The system stays available on local state
//! while the store is down.

use crate::application::metrics::{CacheStats, CacheStatsSnapshot};
use crate::application::ports::{Clock, Component, ComponentError, SharedStore};
use crate::domain::health::HealthReport;
use crate::infrastructure::local::LruTier;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Which tier answered a metadata probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheTier {
    /// The in-process LRU tier.
    Local,
    /// The shared backing store.
    Shared,
}

/// Diagnostic view of one cached entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheMetadata {
    /// Time until the entry expires.
    pub ttl_remaining: Duration,
    /// Serialized payload size in bytes.
    pub size_bytes: usize,
    /// Tier that answered the probe.
    pub tier: CacheTier,
}

/// Two-tier cache: bounded local LRU in front of an optional shared store.
///
/// Values are serialized to JSON bytes once, at this boundary; both tiers
/// store opaque bytes. All read/write paths are async; only shared-tier
/// access actually suspends.
pub struct TieredCache {
    prefix: String,
    default_ttl: Duration,
    refresh_on_get: bool,
    local: LruTier,
    shared: Option<Arc<dyn SharedStore>>,
    clock: Arc<dyn Clock>,
    stats: CacheStats,
}

impl fmt::Debug for TieredCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TieredCache")
            .field("prefix", &self.prefix)
            .field("default_ttl", &self.default_ttl)
            .field("refresh_on_get", &self.refresh_on_get)
            .field("shared", &self.shared.is_some())
            .finish_non_exhaustive()
    }
}

impl TieredCache {
    /// Create a cache with a bounded local tier and no shared store.
    ///
    /// `prefix` namespaces every key; `capacity` bounds the local tier;
    /// `default_ttl` applies to writes that do not specify one.
    pub fn new(
        prefix: impl Into<String>,
        capacity: usize,
        default_ttl: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            prefix: prefix.into(),
            default_ttl,
            refresh_on_get: false,
            local: LruTier::new(capacity),
            shared: None,
            clock,
            stats: CacheStats::new(),
        }
    }

    /// Attach a shared backing store.
    pub fn with_shared_store(mut self, store: Arc<dyn SharedStore>) -> Self {
        self.shared = Some(store);
        self
    }

    /// Reset an entry's age on every local hit, keeping hot keys alive.
    pub fn with_refresh_on_get(mut self, refresh: bool) -> Self {
        self.refresh_on_get = refresh;
        self
    }

    fn namespaced(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    /// Look up `key`, checking the local tier first and reading through to
    /// the shared store on a local miss. A successful read-through
    /// populates the local tier. Expired entries and store errors read as
    /// absent.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let full = self.namespaced(key);
        let now = self.clock.now();

        if let Some(bytes) = self.local.get(&full, now, self.refresh_on_get) {
            match serde_json::from_slice(&bytes) {
                Ok(value) => {
                    self.stats.record_hit();
                    return Some(value);
                }
                Err(e) => {
                    // Undecodable local bytes: drop the entry and fall
                    // through to the shared tier.
                    tracing::warn!(key = %full, error = %e, "dropping undecodable cache entry");
                    self.local.remove(&full);
                }
            }
        }

        let Some(store) = &self.shared else {
            self.stats.record_miss();
            return None;
        };

        match store.get(&full).await {
            Ok(Some(bytes)) => match serde_json::from_slice(&bytes) {
                Ok(value) => {
                    let evicted = self.local.insert(&full, bytes, self.default_ttl, now);
                    self.stats.record_evictions(evicted);
                    self.stats.record_hit();
                    Some(value)
                }
                Err(e) => {
                    tracing::warn!(key = %full, error = %e, "undecodable shared-tier entry");
                    self.stats.record_miss();
                    None
                }
            },
            Ok(None) => {
                self.stats.record_miss();
                None
            }
            Err(e) => {
                tracing::warn!(key = %full, error = %e, "shared tier read failed, treating as miss");
                self.stats.record_miss();
                None
            }
        }
    }

    /// Store `value` under `key` with `ttl` (or the default TTL). The local
    /// write is visible to subsequent `get`s immediately; the shared write
    /// is awaited and its failure logged, never surfaced.
    pub async fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Option<Duration>) {
        let full = self.namespaced(key);
        let ttl = ttl.unwrap_or(self.default_ttl);

        let bytes = match serde_json::to_vec(value) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(key = %full, error = %e, "value failed to serialize, not cached");
                return;
            }
        };

        let evicted = self
            .local
            .insert(&full, bytes.clone(), ttl, self.clock.now());
        self.stats.record_evictions(evicted);
        self.stats.record_set();

        if let Some(store) = &self.shared {
            if let Err(e) = store.set(&full, bytes, ttl).await {
                tracing::warn!(key = %full, error = %e, "shared tier write failed");
            }
        }
    }

    /// Remove `key` from both tiers. Idempotent; always returns `true`.
    pub async fn delete(&self, key: &str) -> bool {
        let full = self.namespaced(key);
        self.local.remove(&full);

        if let Some(store) = &self.shared {
            if let Err(e) = store.delete(&full).await {
                tracing::warn!(key = %full, error = %e, "shared tier delete failed");
            }
        }

        self.stats.record_delete();
        true
    }

    /// Remove every entry whose logical key starts with `prefix` from both
    /// tiers (everything, when `None`). Returns entries removed across both
    /// tiers.
    pub async fn clear(&self, prefix: Option<&str>) -> u64 {
        let full_prefix = self.namespaced(prefix.unwrap_or(""));
        let mut removed = self.local.remove_prefix(&full_prefix);

        if let Some(store) = &self.shared {
            match store.delete_prefix(&full_prefix).await {
                Ok(count) => removed += count,
                Err(e) => {
                    tracing::warn!(prefix = %full_prefix, error = %e, "shared tier clear failed");
                }
            }
        }

        removed
    }

    /// Remaining TTL and size for `key`, if present in either tier.
    pub async fn metadata(&self, key: &str) -> Option<CacheMetadata> {
        let full = self.namespaced(key);
        let now = self.clock.now();

        if let Some((ttl_remaining, size_bytes)) = self.local.metadata(&full, now) {
            return Some(CacheMetadata {
                ttl_remaining,
                size_bytes,
                tier: CacheTier::Local,
            });
        }

        let store = self.shared.as_ref()?;
        let ttl_remaining = store.ttl_remaining(&full).await.ok().flatten()?;
        let bytes = store.get(&full).await.ok().flatten()?;
        Some(CacheMetadata {
            ttl_remaining,
            size_bytes: bytes.len(),
            tier: CacheTier::Shared,
        })
    }

    /// Pre-populate `keys` that are currently absent by awaiting
    /// `loader(key)` for each and storing non-`None` results with the
    /// default TTL. Returns how many keys were loaded.
    pub async fn warm<T, F, Fut>(&self, keys: &[&str], loader: F) -> u64
    where
        T: Serialize,
        F: Fn(&str) -> Fut,
        Fut: Future<Output = Option<T>>,
    {
        let mut loaded = 0;
        for key in keys {
            if self.exists(key).await {
                continue;
            }
            if let Some(value) = loader(key).await {
                self.set(key, &value, None).await;
                loaded += 1;
            }
        }
        loaded
    }

    /// Get-or-compute: return the cached value under `key`, or await
    /// `load`, store its success result with `ttl`, and return it. Load
    /// errors are returned to the caller and nothing is cached.
    pub async fn memoize<T, E, F, Fut>(
        &self,
        key: &str,
        ttl: Option<Duration>,
        load: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(cached) = self.get(key).await {
            return Ok(cached);
        }

        let value = load().await?;
        self.set(key, &value, ttl).await;
        Ok(value)
    }

    async fn exists(&self, key: &str) -> bool {
        let full = self.namespaced(key);
        if self.local.contains(&full, self.clock.now()) {
            return true;
        }
        match &self.shared {
            Some(store) => matches!(store.ttl_remaining(&full).await, Ok(Some(_))),
            None => false,
        }
    }

    /// Point-in-time statistics snapshot.
    pub fn stats(&self) -> CacheStatsSnapshot {
        self.stats.snapshot(self.local.len())
    }

    /// Whether a shared store is attached.
    pub fn has_shared_store(&self) -> bool {
        self.shared.is_some()
    }

    /// The clock this cache (and anything layered on it) reads time from.
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }
}

#[async_trait]
impl Component for TieredCache {
    fn name(&self) -> &str {
        "cache"
    }

    async fn initialize(&self) -> Result<(), ComponentError> {
        match &self.shared {
            Some(store) => match store.ping().await {
                Ok(()) => {
                    tracing::info!(prefix = %self.prefix, "cache initialized with shared store");
                }
                Err(e) => {
                    // Degraded, not fatal: the local tier keeps serving.
                    tracing::warn!(error = %e, "shared store unreachable, cache starts degraded");
                }
            },
            None => {
                tracing::info!(prefix = %self.prefix, "cache initialized, local tier only");
            }
        }
        Ok(())
    }

    async fn health(&self) -> Result<HealthReport, ComponentError> {
        let stats = serde_json::to_value(self.stats())?;
        match &self.shared {
            Some(store) => match store.ping().await {
                Ok(()) => Ok(HealthReport::healthy().with_details(stats)),
                Err(e) => {
                    let reason = format!("shared store unreachable: {}", e);
                    Ok(HealthReport::degraded(reason.clone()).with_details(serde_json::json!({
                        "reason": reason,
                        "stats": stats,
                    })))
                }
            },
            None => Ok(HealthReport::healthy().with_details(stats)),
        }
    }
}
