//! Configuration surface.
//!
//! Deserialized from whatever source the embedding application uses
//! (environment, file, config service) and turned into constructed
//! components at bootstrap. The registry itself has no configuration; it is
//! driven entirely by `register()` calls.

use crate::domain::strategy::{Algorithm, RateLimitStrategy, StrategyError};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

/// Settings for the tiered cache.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Maximum entries in the local tier.
    pub capacity: usize,
    /// Default TTL, in seconds, for writes that do not specify one.
    pub default_ttl_secs: u64,
    /// Namespace prepended to every key.
    pub key_prefix: String,
    /// Reset an entry's age on every local hit.
    pub refresh_on_get: bool,
    /// Shared tier connection URL; no shared tier when absent.
    pub redis_url: Option<String>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            capacity: 10_000,
            default_ttl_secs: 300,
            key_prefix: "mp:".to_string(),
            refresh_on_get: false,
            redis_url: None,
        }
    }
}

impl CacheSettings {
    /// The default TTL as a `Duration`.
    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_secs)
    }
}

/// Settings for one named rate-limit strategy.
#[derive(Debug, Clone, Deserialize)]
pub struct StrategySettings {
    /// Which algorithm enforces this strategy.
    pub algorithm: Algorithm,
    /// Enforcement window in milliseconds.
    pub window_ms: u64,
    /// Maximum requests (or total weight) per window.
    pub max_requests: u32,
    /// Token-bucket burst capacity override.
    #[serde(default)]
    pub burst: Option<u32>,
    /// Token-bucket refill rate override, tokens per second.
    #[serde(default)]
    pub refill_rate: Option<f64>,
}

impl StrategySettings {
    /// Validate into a strategy.
    ///
    /// # Errors
    /// `StrategyError` if any parameter is out of range.
    pub fn build(&self) -> Result<RateLimitStrategy, StrategyError> {
        let mut strategy = RateLimitStrategy::new(
            self.algorithm,
            Duration::from_millis(self.window_ms),
            self.max_requests,
        )?;
        if let Some(burst) = self.burst {
            strategy = strategy.with_burst(burst)?;
        }
        if let Some(rate) = self.refill_rate {
            strategy = strategy.with_refill_rate(rate)?;
        }
        Ok(strategy)
    }
}

/// Top-level configuration for the infrastructure core.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Cache settings.
    pub cache: CacheSettings,
    /// Named rate-limit strategies.
    pub strategies: HashMap<String, StrategySettings>,
}

impl CoreConfig {
    /// Build the whole named-strategy map, validating every entry.
    ///
    /// # Errors
    /// The first `StrategyError` encountered.
    pub fn build_strategies(&self) -> Result<HashMap<String, RateLimitStrategy>, StrategyError> {
        self.strategies
            .iter()
            .map(|(name, settings)| Ok((name.clone(), settings.build()?)))
            .collect()
    }
}
