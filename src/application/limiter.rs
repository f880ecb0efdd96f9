//! Multi-algorithm rate limiter.
//!
//! Decides, per request key and per named strategy, whether an operation may
//! proceed, returning enough information for HTTP middleware to build a
//! standard throttling response. Enforcement state for the fixed-window,
//! sliding-window, and leaky-bucket algorithms persists through the cache so
//! it outlives a single request and can be shared across processes; token
//! buckets are process-local (see [`Algorithm::TokenBucket`]).
//!
//! Cache-backed counters are read-modify-write without a compare-and-swap:
//! two concurrent checks against one key can interleave and briefly
//! overcount allowed requests. Accepted approximation.
//!
//! [`Algorithm::TokenBucket`]: crate::domain::strategy::Algorithm::TokenBucket

use crate::application::cache::TieredCache;
use crate::application::metrics::{ThrottleStats, ThrottleStatsSnapshot};
use crate::application::ports::{Clock, Component, ComponentError};
use crate::domain::decision::RateLimitDecision;
use crate::domain::health::HealthReport;
use crate::domain::strategy::{Algorithm, RateLimitStrategy, RequestContext};
use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Default bound on the in-process token bucket table.
const DEFAULT_MAX_BUCKETS: usize = 10_000;

/// Error from a rate limit check.
///
/// "Limit exceeded" is not an error; it is an `allowed: false` decision.
/// Checks only fail for configuration mistakes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LimiterError {
    /// No strategy registered under the given name.
    UnknownStrategy(String),
}

impl fmt::Display for LimiterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LimiterError::UnknownStrategy(name) => {
                write!(f, "unknown rate limit strategy: {}", name)
            }
        }
    }
}

impl std::error::Error for LimiterError {}

/// One timestamped charge in a sliding-window log.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct WindowEntry {
    at_ms: u64,
    weight: f64,
}

/// Cache-backed leaky bucket record.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct LeakyRecord {
    volume: f64,
    last_leak_ms: u64,
}

/// In-process token bucket state.
#[derive(Debug, Clone, Copy)]
struct TokenBucket {
    tokens: f64,
    last_refill_ms: u64,
}

impl TokenBucket {
    fn full(burst: u32, now_ms: u64) -> Self {
        Self {
            tokens: f64::from(burst),
            last_refill_ms: now_ms,
        }
    }

    /// Lazily refill from elapsed wall-clock time, capped at `burst`.
    fn refill(&mut self, burst: u32, rate_per_sec: f64, now_ms: u64) {
        if now_ms > self.last_refill_ms {
            let elapsed_secs = (now_ms - self.last_refill_ms) as f64 / 1000.0;
            self.tokens = (self.tokens + elapsed_secs * rate_per_sec).min(f64::from(burst));
            self.last_refill_ms = now_ms;
        }
    }
}

/// Rate limiter over named strategies, persisting state through the cache.
pub struct RateLimiter {
    cache: Arc<TieredCache>,
    clock: Arc<dyn Clock>,
    strategies: HashMap<String, RateLimitStrategy>,
    buckets: DashMap<String, TokenBucket>,
    max_buckets: usize,
    stats: ThrottleStats,
}

impl fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimiter")
            .field("strategies", &self.strategies.keys().collect::<Vec<_>>())
            .field("buckets", &self.buckets.len())
            .finish_non_exhaustive()
    }
}

impl RateLimiter {
    /// Create a limiter persisting through `cache` and reading time from the
    /// cache's clock.
    pub fn new(cache: Arc<TieredCache>) -> Self {
        let clock = Arc::clone(cache.clock());
        Self {
            cache,
            clock,
            strategies: HashMap::new(),
            buckets: DashMap::new(),
            max_buckets: DEFAULT_MAX_BUCKETS,
            stats: ThrottleStats::new(),
        }
    }

    /// Register a named strategy, replacing any previous one of that name.
    pub fn add_strategy(mut self, name: impl Into<String>, strategy: RateLimitStrategy) -> Self {
        self.strategies.insert(name.into(), strategy);
        self
    }

    /// Register a whole strategy map (e.g. built from configuration).
    pub fn with_strategies(mut self, strategies: HashMap<String, RateLimitStrategy>) -> Self {
        self.strategies.extend(strategies);
        self
    }

    /// Bound the in-process token bucket table (default 10,000 keys).
    pub fn with_max_buckets(mut self, max: usize) -> Self {
        self.max_buckets = max.max(1);
        self
    }

    /// Names of the registered strategies.
    pub fn strategy_names(&self) -> Vec<&str> {
        self.strategies.keys().map(String::as_str).collect()
    }

    /// Point-in-time statistics snapshot.
    pub fn stats(&self) -> ThrottleStatsSnapshot {
        self.stats.snapshot()
    }

    /// Check whether `key` may spend `weight` against the named strategy,
    /// charging it on allow.
    ///
    /// # Errors
    /// `LimiterError::UnknownStrategy` if no strategy has that name.
    pub async fn check(
        &self,
        key: &str,
        strategy_name: &str,
        weight: f64,
    ) -> Result<RateLimitDecision, LimiterError> {
        let decision = self.run(key, strategy_name, weight, true).await?;
        if decision.allowed {
            self.stats.record_allowed();
        } else {
            self.stats.record_rejected();
        }
        Ok(decision)
    }

    /// Check a request using the strategy's hooks: the skip predicate may
    /// bypass the check entirely; the key and weight functions derive the
    /// charge from the request context.
    pub async fn check_request(
        &self,
        ctx: &RequestContext,
        strategy_name: &str,
    ) -> Result<RateLimitDecision, LimiterError> {
        let strategy = self
            .strategies
            .get(strategy_name)
            .ok_or_else(|| LimiterError::UnknownStrategy(strategy_name.to_string()))?;

        if strategy.skips(ctx) {
            self.stats.record_skipped();
            let now = self.clock.now();
            return Ok(RateLimitDecision::allow(
                strategy.max_requests(),
                strategy.max_requests(),
                now + strategy.window(),
            ));
        }

        let key = strategy.key_for(ctx);
        let weight = strategy.weight_for(ctx);
        self.check(&key, strategy_name, weight).await
    }

    /// Non-mutating check for diagnostics: what would a weight-1 request
    /// see right now?
    pub async fn info(
        &self,
        key: &str,
        strategy_name: &str,
    ) -> Result<RateLimitDecision, LimiterError> {
        self.run(key, strategy_name, 1.0, false).await
    }

    /// Clear all algorithm state for `key` across every backing structure
    /// (administrative override).
    pub async fn reset(&self, key: &str) {
        for (name, strategy) in &self.strategies {
            match strategy.algorithm() {
                Algorithm::FixedWindow => {
                    self.cache
                        .clear(Some(&format!("ratelimit:fw:{}:{}:", name, key)))
                        .await;
                }
                Algorithm::SlidingWindow => {
                    self.cache.delete(&sliding_key(name, key)).await;
                }
                Algorithm::TokenBucket => {
                    self.buckets.remove(&bucket_key(name, key));
                }
                Algorithm::LeakyBucket => {
                    self.cache.delete(&leaky_key(name, key)).await;
                }
            }
        }
    }

    async fn run(
        &self,
        key: &str,
        strategy_name: &str,
        weight: f64,
        commit: bool,
    ) -> Result<RateLimitDecision, LimiterError> {
        let strategy = self
            .strategies
            .get(strategy_name)
            .ok_or_else(|| LimiterError::UnknownStrategy(strategy_name.to_string()))?;

        let decision = match strategy.algorithm() {
            Algorithm::FixedWindow => {
                self.fixed_window(key, strategy_name, strategy, weight, commit)
                    .await
            }
            Algorithm::SlidingWindow => {
                self.sliding_window(key, strategy_name, strategy, weight, commit)
                    .await
            }
            Algorithm::TokenBucket => self.token_bucket(key, strategy_name, strategy, weight, commit),
            Algorithm::LeakyBucket => {
                self.leaky_bucket(key, strategy_name, strategy, weight, commit)
                    .await
            }
        };
        Ok(decision)
    }

    /// Scalar counter per (key, window bucket), TTL'd to the window size.
    async fn fixed_window(
        &self,
        key: &str,
        name: &str,
        strategy: &RateLimitStrategy,
        weight: f64,
        commit: bool,
    ) -> RateLimitDecision {
        let now_ms = self.clock.now_millis();
        let window_ms = strategy.window_ms();
        let bucket = now_ms / window_ms;
        let cache_key = format!("ratelimit:fw:{}:{}:{}", name, key, bucket);

        let count: f64 = self.cache.get(&cache_key).await.unwrap_or(0.0);
        let limit = strategy.max_requests();
        let max = f64::from(limit);
        let reset_at = Duration::from_millis((bucket + 1) * window_ms);

        if count + weight <= max {
            let new_count = count + weight;
            if commit {
                self.cache
                    .set(&cache_key, &new_count, Some(strategy.window()))
                    .await;
            }
            RateLimitDecision::allow(limit, (max - new_count).max(0.0) as u32, reset_at)
        } else {
            let retry_after = reset_at - Duration::from_millis(now_ms);
            RateLimitDecision::reject(limit, (max - count).max(0.0) as u32, reset_at, retry_after)
        }
    }

    /// Timestamped log of charges in the trailing window.
    async fn sliding_window(
        &self,
        key: &str,
        name: &str,
        strategy: &RateLimitStrategy,
        weight: f64,
        commit: bool,
    ) -> RateLimitDecision {
        let now_ms = self.clock.now_millis();
        let window_ms = strategy.window_ms();
        let cache_key = sliding_key(name, key);

        let mut entries: Vec<WindowEntry> = self.cache.get(&cache_key).await.unwrap_or_default();
        let cutoff = now_ms.saturating_sub(window_ms);
        entries.retain(|e| e.at_ms > cutoff);

        let sum: f64 = entries.iter().map(|e| e.weight).sum();
        let limit = strategy.max_requests();
        let max = f64::from(limit);

        let oldest_expiry = entries
            .first()
            .map(|e| Duration::from_millis(e.at_ms + window_ms));

        if sum + weight <= max {
            if commit {
                entries.push(WindowEntry {
                    at_ms: now_ms,
                    weight,
                });
                self.cache
                    .set(&cache_key, &entries, Some(strategy.window()))
                    .await;
            }
            let reset_at =
                oldest_expiry.unwrap_or(Duration::from_millis(now_ms + window_ms));
            RateLimitDecision::allow(limit, (max - sum - weight).max(0.0) as u32, reset_at)
        } else {
            let reset_at =
                oldest_expiry.unwrap_or(Duration::from_millis(now_ms + window_ms));
            let retry_after = reset_at.saturating_sub(Duration::from_millis(now_ms));
            RateLimitDecision::reject(
                limit,
                (max - sum).max(0.0) as u32,
                reset_at,
                retry_after.max(Duration::from_millis(1)),
            )
        }
    }

    /// Process-local bucket with lazy continuous refill.
    fn token_bucket(
        &self,
        key: &str,
        name: &str,
        strategy: &RateLimitStrategy,
        weight: f64,
        commit: bool,
    ) -> RateLimitDecision {
        let now_ms = self.clock.now_millis();
        let burst = strategy.burst();
        let rate = strategy.refill_rate();
        let limit = strategy.max_requests();
        let table_key = bucket_key(name, key);

        let decision = if commit {
            let mut entry = self
                .buckets
                .entry(table_key)
                .or_insert_with(|| TokenBucket::full(burst, now_ms));
            entry.refill(burst, rate, now_ms);

            if entry.tokens >= weight {
                entry.tokens -= weight;
                let reset_at = refill_eta(burst, entry.tokens, rate, now_ms);
                RateLimitDecision::allow(limit, entry.tokens.floor() as u32, reset_at)
            } else {
                let reset_at = refill_eta(burst, entry.tokens, rate, now_ms);
                let retry_after = Duration::from_secs_f64(weight / rate);
                RateLimitDecision::reject(limit, entry.tokens.floor() as u32, reset_at, retry_after)
            }
        } else {
            let mut bucket = self
                .buckets
                .get(&table_key)
                .map(|entry| *entry)
                .unwrap_or_else(|| TokenBucket::full(burst, now_ms));
            bucket.refill(burst, rate, now_ms);

            if bucket.tokens >= weight {
                let reset_at = refill_eta(burst, bucket.tokens - weight, rate, now_ms);
                RateLimitDecision::allow(limit, (bucket.tokens - weight).floor() as u32, reset_at)
            } else {
                let reset_at = refill_eta(burst, bucket.tokens, rate, now_ms);
                let retry_after = Duration::from_secs_f64(weight / rate);
                RateLimitDecision::reject(limit, bucket.tokens.floor() as u32, reset_at, retry_after)
            }
        };

        if commit && self.buckets.len() > self.max_buckets {
            self.collect_idle_buckets(now_ms);
        }

        decision
    }

    /// Drop buckets that have fully refilled: a full bucket means the key
    /// has been idle at least long enough to recover all capacity.
    fn collect_idle_buckets(&self, now_ms: u64) {
        let strategies = &self.strategies;
        self.buckets.retain(|table_key, bucket| {
            let Some((name, _)) = table_key.split_once(':') else {
                return false;
            };
            let Some(strategy) = strategies.get(name) else {
                // Strategy no longer configured; drop its buckets.
                return false;
            };
            let mut copy = *bucket;
            copy.refill(strategy.burst(), strategy.refill_rate(), now_ms);
            copy.tokens < f64::from(strategy.burst())
        });
    }

    /// Cache-backed volume drained at a constant rate.
    async fn leaky_bucket(
        &self,
        key: &str,
        name: &str,
        strategy: &RateLimitStrategy,
        weight: f64,
        commit: bool,
    ) -> RateLimitDecision {
        let now_ms = self.clock.now_millis();
        let leak_rate = strategy.leak_rate();
        let cache_key = leaky_key(name, key);
        let limit = strategy.max_requests();
        let max = f64::from(limit);

        let record: LeakyRecord = self.cache.get(&cache_key).await.unwrap_or(LeakyRecord {
            volume: 0.0,
            last_leak_ms: now_ms,
        });

        let elapsed_secs = now_ms.saturating_sub(record.last_leak_ms) as f64 / 1000.0;
        let volume = (record.volume - elapsed_secs * leak_rate).max(0.0);

        // Offset until the bucket is fully drained.
        let reset_at = Duration::from_millis(now_ms)
            + Duration::from_secs_f64(volume / leak_rate);

        if volume + weight <= max {
            if commit {
                let updated = LeakyRecord {
                    volume: volume + weight,
                    last_leak_ms: now_ms,
                };
                self.cache
                    .set(&cache_key, &updated, Some(strategy.window()))
                    .await;
            }
            RateLimitDecision::allow(limit, (max - volume - weight).max(0.0) as u32, reset_at)
        } else {
            let excess = volume + weight - max;
            let retry_after = Duration::from_secs_f64(excess / leak_rate);
            RateLimitDecision::reject(limit, (max - volume).max(0.0) as u32, reset_at, retry_after)
        }
    }
}

fn sliding_key(name: &str, key: &str) -> String {
    format!("ratelimit:sw:{}:{}", name, key)
}

fn leaky_key(name: &str, key: &str) -> String {
    format!("ratelimit:lb:{}:{}", name, key)
}

fn bucket_key(name: &str, key: &str) -> String {
    format!("{}:{}", name, key)
}

/// Offset at which a bucket with `tokens` remaining reaches `burst`.
fn refill_eta(burst: u32, tokens: f64, rate_per_sec: f64, now_ms: u64) -> Duration {
    let missing = (f64::from(burst) - tokens).max(0.0);
    Duration::from_millis(now_ms) + Duration::from_secs_f64(missing / rate_per_sec)
}

#[async_trait]
impl Component for RateLimiter {
    fn name(&self) -> &str {
        "rate-limiter"
    }

    fn dependencies(&self) -> Vec<String> {
        vec!["cache".to_string()]
    }

    async fn initialize(&self) -> Result<(), ComponentError> {
        tracing::info!(
            strategies = self.strategies.len(),
            "rate limiter initialized"
        );
        Ok(())
    }

    async fn health(&self) -> Result<HealthReport, ComponentError> {
        let details = serde_json::json!({
            "strategies": self.strategies.len(),
            "token_buckets": self.buckets.len(),
            "stats": self.stats(),
        });
        Ok(HealthReport::healthy().with_details(details))
    }
}
