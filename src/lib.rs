//! # marketpulse-core
//!
//! Shared infrastructure core for the MarketPulse dashboard backend: a
//! service-lifecycle registry, a two-tier cache, and a multi-algorithm rate
//! limiter. The three pieces are built bottom-up: the limiter persists its
//! state through the cache, and the registry sequences both. Everything
//! else in the backend (route handlers, WebSocket broadcast, data-provider
//! adapters) consumes them through the contracts in `application::ports`.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use marketpulse_core::application::cache::TieredCache;
//! use marketpulse_core::application::limiter::RateLimiter;
//! use marketpulse_core::application::registry::ServiceRegistry;
//! use marketpulse_core::domain::strategy::{Algorithm, RateLimitStrategy};
//! use marketpulse_core::infrastructure::clock::SystemClock;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn bootstrap() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//! let clock = Arc::new(SystemClock::new());
//! let cache = Arc::new(TieredCache::new(
//!     "mp:",
//!     10_000,
//!     Duration::from_secs(300),
//!     clock,
//! ));
//!
//! let strategy =
//!     RateLimitStrategy::new(Algorithm::SlidingWindow, Duration::from_secs(60), 120)?;
//! let limiter = Arc::new(RateLimiter::new(Arc::clone(&cache)).add_strategy("api", strategy));
//!
//! let mut registry = ServiceRegistry::new();
//! registry.register(cache)?;
//! registry.register(limiter.clone())?;
//! registry.initialize_all().await?;
//! registry.start_all().await?;
//!
//! // Per request, typically from HTTP middleware:
//! let decision = limiter.check("203.0.113.9", "api", 1.0).await?;
//! if !decision.allowed {
//!     // respond 429 with decision.retry_after_secs()
//! }
//!
//! registry.stop_all().await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - **Cache** ([`application::cache::TieredCache`]): a bounded local LRU
//!   tier in front of an optional shared store (`redis-store` feature).
//!   Values serialize once at the cache boundary; shared-tier failures
//!   degrade to misses instead of failing the caller.
//! - **Rate Limiter** ([`application::limiter::RateLimiter`]): four
//!   interchangeable algorithms per named strategy (fixed window, sliding
//!   window, token bucket, leaky bucket). All but the token bucket persist
//!   per-key state through the cache, so enforcement survives restarts and
//!   can be shared across instances; token buckets are deliberately
//!   process-local.
//! - **Service Registry** ([`application::registry::ServiceRegistry`]):
//!   computes a topological startup order from declared dependencies,
//!   drives initialize/start strictly in that order (stop in reverse,
//!   best-effort), and aggregates health.
//!
//! ## Testing
//!
//! Enable the `test-helpers` feature for a controllable `MockClock` and an
//! in-memory `MemoryStore` shared tier:
//!
//! ```toml
//! [dev-dependencies]
//! marketpulse-core = { version = "*", features = ["test-helpers"] }
//! ```

// Domain layer - pure business logic
pub mod domain;

// Application layer - orchestration
pub mod application;

// Infrastructure layer - external adapters
pub mod infrastructure;

// Configuration surface
pub mod config;

// Re-export commonly used types for convenience
pub use domain::{
    decision::RateLimitDecision,
    health::{HealthReport, HealthStatus},
    lifecycle::ServiceState,
    strategy::{Algorithm, RateLimitStrategy, RequestContext, StrategyError},
};

pub use application::{
    cache::{CacheMetadata, CacheTier, TieredCache},
    limiter::{LimiterError, RateLimiter},
    metrics::{CacheStatsSnapshot, ThrottleStatsSnapshot},
    ports::{Clock, Component, ComponentError, SharedStore, StoreError},
    registry::{RegistryError, ServiceRegistry},
};

pub use config::{CacheSettings, CoreConfig, StrategySettings};

pub use infrastructure::clock::SystemClock;

#[cfg(feature = "redis-store")]
pub use infrastructure::redis_store::{RedisStore, RedisStoreConfig};
