//! Counters for cache and limiter observability.
//!
//! All counters use atomic operations for thread-safe updates and reads.
//! They are collected continuously and surfaced through the components'
//! health probes.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Statistics tracked by the tiered cache.
///
/// Cloning is cheap and clones share the same underlying counters.
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    inner: Arc<CacheStatsInner>,
}

#[derive(Debug, Default)]
struct CacheStatsInner {
    hits: AtomicU64,
    misses: AtomicU64,
    sets: AtomicU64,
    deletes: AtomicU64,
    evictions: AtomicU64,
}

impl CacheStats {
    /// Create a fresh counter set.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_hit(&self) {
        self.inner.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_miss(&self) {
        self.inner.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_set(&self) {
        self.inner.sets.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_delete(&self) {
        self.inner.deletes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_evictions(&self, count: u64) {
        self.inner.evictions.fetch_add(count, Ordering::Relaxed);
    }

    /// Point-in-time snapshot of all counters.
    pub fn snapshot(&self, local_size: usize) -> CacheStatsSnapshot {
        CacheStatsSnapshot {
            hits: self.inner.hits.load(Ordering::Relaxed),
            misses: self.inner.misses.load(Ordering::Relaxed),
            sets: self.inner.sets.load(Ordering::Relaxed),
            deletes: self.inner.deletes.load(Ordering::Relaxed),
            evictions: self.inner.evictions.load(Ordering::Relaxed),
            local_size,
        }
    }
}

/// A point-in-time view of cache statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct CacheStatsSnapshot {
    /// Local-tier hits plus successful shared-tier read-throughs.
    pub hits: u64,
    /// Lookups that found nothing in either tier.
    pub misses: u64,
    /// Values written.
    pub sets: u64,
    /// Explicit deletions.
    pub deletes: u64,
    /// Local-tier entries evicted by capacity pressure.
    pub evictions: u64,
    /// Approximate number of entries in the local tier.
    pub local_size: usize,
}

impl CacheStatsSnapshot {
    /// Hit rate in `[0.0, 1.0]`; 0.0 before any lookups.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits.saturating_add(self.misses);
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Statistics tracked by the rate limiter.
#[derive(Debug, Clone, Default)]
pub struct ThrottleStats {
    inner: Arc<ThrottleStatsInner>,
}

#[derive(Debug, Default)]
struct ThrottleStatsInner {
    allowed: AtomicU64,
    rejected: AtomicU64,
    skipped: AtomicU64,
}

impl ThrottleStats {
    /// Create a fresh counter set.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_allowed(&self) {
        self.inner.allowed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rejected(&self) {
        self.inner.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_skipped(&self) {
        self.inner.skipped.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time snapshot of all counters.
    pub fn snapshot(&self) -> ThrottleStatsSnapshot {
        ThrottleStatsSnapshot {
            allowed: self.inner.allowed.load(Ordering::Relaxed),
            rejected: self.inner.rejected.load(Ordering::Relaxed),
            skipped: self.inner.skipped.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time view of limiter statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct ThrottleStatsSnapshot {
    /// Checks that allowed the request.
    pub allowed: u64,
    /// Checks that rejected the request.
    pub rejected: u64,
    /// Checks bypassed by a strategy's skip predicate.
    pub skipped: u64,
}

impl ThrottleStatsSnapshot {
    /// Rejection rate over checked (non-skipped) requests.
    pub fn rejection_rate(&self) -> f64 {
        let total = self.allowed.saturating_add(self.rejected);
        if total == 0 {
            0.0
        } else {
            self.rejected as f64 / total as f64
        }
    }
}
