//! Rate limiting strategy configuration.
//!
//! A strategy is an immutable, named policy: an algorithm selection plus its
//! window/limit parameters and optional per-request hooks. Strategies are
//! validated at construction; the limiter never re-checks them on the hot
//! path.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Rate limiting algorithm selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    /// Fixed window counter: time is partitioned into window-sized buckets
    /// and a scalar counter is kept per (key, bucket) in the cache.
    ///
    /// Bursts of up to twice the nominal rate can occur across a bucket
    /// boundary; that weakness is inherent to the algorithm.
    FixedWindow,
    /// Sliding window log: a list of timestamped weights in the trailing
    /// window, kept in the cache. No boundary burst, at the cost of storing
    /// a list rather than a scalar.
    SlidingWindow,
    /// Token bucket with lazy continuous refill.
    ///
    /// Bucket state lives in process memory, not in the cache: limits are
    /// per-instance. Behind a load balancer with N instances the effective
    /// limit is N times the configured one. Use one of the cache-backed
    /// algorithms when enforcement must be shared.
    TokenBucket,
    /// Leaky bucket: a cache-backed volume drained at a constant rate.
    LeakyBucket,
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Algorithm::FixedWindow => write!(f, "fixed_window"),
            Algorithm::SlidingWindow => write!(f, "sliding_window"),
            Algorithm::TokenBucket => write!(f, "token_bucket"),
            Algorithm::LeakyBucket => write!(f, "leaky_bucket"),
        }
    }
}

/// Per-request context handed to strategy hooks.
///
/// Built by the HTTP middleware from the incoming request. The `client`
/// field is the service-wide default rate-limit key (typically the caller's
/// network identity or API key).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    /// Caller identity used as the default rate-limit key.
    pub client: String,
    /// Route or operation being invoked, if the middleware knows it.
    pub route: Option<String>,
}

impl RequestContext {
    /// Context for a client with no route information.
    pub fn new(client: impl Into<String>) -> Self {
        Self {
            client: client.into(),
            route: None,
        }
    }

    /// Context for a client invoking a specific route.
    pub fn for_route(client: impl Into<String>, route: impl Into<String>) -> Self {
        Self {
            client: client.into(),
            route: Some(route.into()),
        }
    }
}

/// Custom key derivation for a strategy.
pub type KeyFn = Arc<dyn Fn(&RequestContext) -> String + Send + Sync>;

/// Custom request cost for a strategy (default cost is 1.0).
pub type WeightFn = Arc<dyn Fn(&RequestContext) -> f64 + Send + Sync>;

/// Predicate that bypasses rate limiting entirely for a request.
pub type SkipFn = Arc<dyn Fn(&RequestContext) -> bool + Send + Sync>;

/// Error returned when a strategy's parameters are invalid.
#[derive(Debug, Clone, PartialEq)]
pub enum StrategyError {
    /// `max_requests` must be greater than zero.
    ZeroMaxRequests,
    /// The window duration must be greater than zero.
    ZeroWindow,
    /// A configured burst must be greater than zero.
    InvalidBurst(u32),
    /// A configured refill rate must be a positive, finite number.
    InvalidRefillRate(f64),
}

impl fmt::Display for StrategyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StrategyError::ZeroMaxRequests => {
                write!(f, "max_requests must be greater than 0")
            }
            StrategyError::ZeroWindow => {
                write!(f, "window must be greater than 0")
            }
            StrategyError::InvalidBurst(b) => {
                write!(f, "burst must be greater than 0, got {}", b)
            }
            StrategyError::InvalidRefillRate(r) => {
                write!(f, "refill_rate must be positive and finite, got {}", r)
            }
        }
    }
}

impl std::error::Error for StrategyError {}

/// Immutable configuration for one named rate-limit policy.
///
/// # Example
/// ```
/// use marketpulse_core::domain::strategy::{Algorithm, RateLimitStrategy};
/// use std::time::Duration;
///
/// let strategy =
///     RateLimitStrategy::new(Algorithm::TokenBucket, Duration::from_secs(60), 120)
///         .unwrap()
///         .with_burst(30)
///         .unwrap();
///
/// assert_eq!(strategy.burst(), 30);
/// assert_eq!(strategy.refill_rate(), 2.0); // 120 per 60s
/// ```
#[derive(Clone)]
pub struct RateLimitStrategy {
    algorithm: Algorithm,
    window: Duration,
    max_requests: u32,
    burst: Option<u32>,
    refill_rate: Option<f64>,
    key_fn: Option<KeyFn>,
    weight_fn: Option<WeightFn>,
    skip_fn: Option<SkipFn>,
}

impl RateLimitStrategy {
    /// Create a strategy, validating its parameters.
    ///
    /// # Errors
    /// Returns `StrategyError` if `max_requests` is zero or `window` is zero.
    pub fn new(
        algorithm: Algorithm,
        window: Duration,
        max_requests: u32,
    ) -> Result<Self, StrategyError> {
        if max_requests == 0 {
            return Err(StrategyError::ZeroMaxRequests);
        }
        if window.is_zero() {
            return Err(StrategyError::ZeroWindow);
        }
        Ok(Self {
            algorithm,
            window,
            max_requests,
            burst: None,
            refill_rate: None,
            key_fn: None,
            weight_fn: None,
            skip_fn: None,
        })
    }

    /// Override the token-bucket burst capacity (defaults to `max_requests`).
    pub fn with_burst(mut self, burst: u32) -> Result<Self, StrategyError> {
        if burst == 0 {
            return Err(StrategyError::InvalidBurst(burst));
        }
        self.burst = Some(burst);
        Ok(self)
    }

    /// Override the token-bucket refill rate in tokens per second
    /// (defaults to `max_requests / window_secs`).
    pub fn with_refill_rate(mut self, rate: f64) -> Result<Self, StrategyError> {
        if !rate.is_finite() || rate <= 0.0 {
            return Err(StrategyError::InvalidRefillRate(rate));
        }
        self.refill_rate = Some(rate);
        Ok(self)
    }

    /// Derive the rate-limit key from the request context instead of using
    /// the caller identity.
    pub fn with_key_fn(mut self, f: KeyFn) -> Self {
        self.key_fn = Some(f);
        self
    }

    /// Charge a custom cost per request (e.g. bulk exports cost more than a
    /// single lookup).
    pub fn with_weight_fn(mut self, f: WeightFn) -> Self {
        self.weight_fn = Some(f);
        self
    }

    /// Bypass the check entirely when the predicate returns true.
    pub fn with_skip_fn(mut self, f: SkipFn) -> Self {
        self.skip_fn = Some(f);
        self
    }

    /// The configured algorithm.
    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// The enforcement window.
    pub fn window(&self) -> Duration {
        self.window
    }

    /// The window in whole milliseconds.
    pub fn window_ms(&self) -> u64 {
        self.window.as_millis() as u64
    }

    /// Maximum requests (or total weight) allowed per window.
    pub fn max_requests(&self) -> u32 {
        self.max_requests
    }

    /// Token-bucket capacity: configured burst, or `max_requests`.
    pub fn burst(&self) -> u32 {
        self.burst.unwrap_or(self.max_requests)
    }

    /// Token-bucket refill rate in tokens per second: configured rate, or
    /// `max_requests / window_secs`.
    pub fn refill_rate(&self) -> f64 {
        self.refill_rate
            .unwrap_or(f64::from(self.max_requests) / self.window.as_secs_f64())
    }

    /// Leak rate for the leaky bucket, in units of weight per second.
    pub fn leak_rate(&self) -> f64 {
        f64::from(self.max_requests) / self.window.as_secs_f64()
    }

    /// Resolve the rate-limit key for a request.
    pub fn key_for(&self, ctx: &RequestContext) -> String {
        match &self.key_fn {
            Some(f) => f(ctx),
            None => ctx.client.clone(),
        }
    }

    /// Resolve the cost charged for a request.
    pub fn weight_for(&self, ctx: &RequestContext) -> f64 {
        match &self.weight_fn {
            Some(f) => f(ctx),
            None => 1.0,
        }
    }

    /// Check whether the request bypasses rate limiting.
    pub fn skips(&self, ctx: &RequestContext) -> bool {
        match &self.skip_fn {
            Some(f) => f(ctx),
            None => false,
        }
    }
}

// Manual Debug since the hook closures don't implement it.
impl fmt::Debug for RateLimitStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimitStrategy")
            .field("algorithm", &self.algorithm)
            .field("window", &self.window)
            .field("max_requests", &self.max_requests)
            .field("burst", &self.burst)
            .field("refill_rate", &self.refill_rate)
            .field("key_fn", &self.key_fn.as_ref().map(|_| "<fn>"))
            .field("weight_fn", &self.weight_fn.as_ref().map(|_| "<fn>"))
            .field("skip_fn", &self.skip_fn.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base(algorithm: Algorithm) -> RateLimitStrategy {
        RateLimitStrategy::new(algorithm, Duration::from_secs(10), 100).unwrap()
    }

    #[test]
    fn test_validation() {
        assert_eq!(
            RateLimitStrategy::new(Algorithm::FixedWindow, Duration::from_secs(1), 0)
                .unwrap_err(),
            StrategyError::ZeroMaxRequests
        );
        assert_eq!(
            RateLimitStrategy::new(Algorithm::FixedWindow, Duration::ZERO, 10).unwrap_err(),
            StrategyError::ZeroWindow
        );
        assert!(base(Algorithm::TokenBucket).with_burst(0).is_err());
        assert!(base(Algorithm::TokenBucket)
            .with_refill_rate(-1.0)
            .is_err());
        assert!(base(Algorithm::TokenBucket)
            .with_refill_rate(f64::NAN)
            .is_err());
    }

    #[test]
    fn test_token_bucket_defaults() {
        let s = base(Algorithm::TokenBucket);
        assert_eq!(s.burst(), 100);
        assert!((s.refill_rate() - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_token_bucket_overrides() {
        let s = base(Algorithm::TokenBucket)
            .with_burst(25)
            .unwrap()
            .with_refill_rate(3.5)
            .unwrap();
        assert_eq!(s.burst(), 25);
        assert!((s.refill_rate() - 3.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_default_key_is_client() {
        let s = base(Algorithm::FixedWindow);
        let ctx = RequestContext::new("10.0.0.7");
        assert_eq!(s.key_for(&ctx), "10.0.0.7");
        assert!((s.weight_for(&ctx) - 1.0).abs() < f64::EPSILON);
        assert!(!s.skips(&ctx));
    }

    #[test]
    fn test_hooks() {
        let s = base(Algorithm::SlidingWindow)
            .with_key_fn(Arc::new(|ctx| {
                format!("{}:{}", ctx.client, ctx.route.as_deref().unwrap_or("-"))
            }))
            .with_weight_fn(Arc::new(|ctx| {
                if ctx.route.as_deref() == Some("export") {
                    10.0
                } else {
                    1.0
                }
            }))
            .with_skip_fn(Arc::new(|ctx| ctx.client == "internal"));

        let export = RequestContext::for_route("alice", "export");
        assert_eq!(s.key_for(&export), "alice:export");
        assert!((s.weight_for(&export) - 10.0).abs() < f64::EPSILON);

        assert!(s.skips(&RequestContext::new("internal")));
        assert!(!s.skips(&export));
    }

    #[test]
    fn test_algorithm_serde_names() {
        let json = serde_json::to_string(&Algorithm::SlidingWindow).unwrap();
        assert_eq!(json, "\"sliding_window\"");
        let parsed: Algorithm = serde_json::from_str("\"leaky_bucket\"").unwrap();
        assert_eq!(parsed, Algorithm::LeakyBucket);
    }
}
