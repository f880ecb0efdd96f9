//! Integration tests for the rate limiter: the four algorithms, weighted
//! requests, and shared-state behavior through the cache.

use marketpulse_core::infrastructure::mocks::{MemoryStore, MockClock};
use marketpulse_core::{
    Algorithm, LimiterError, RateLimiter, RateLimitStrategy, RequestContext, TieredCache,
};
use std::sync::Arc;
use std::time::Duration;

fn limiter_with(
    name: &str,
    algorithm: Algorithm,
    window: Duration,
    max: u32,
) -> (RateLimiter, MockClock) {
    let clock = MockClock::at_epoch_secs(1_700_000_000);
    let cache = Arc::new(TieredCache::new(
        "mp:",
        1024,
        Duration::from_secs(300),
        Arc::new(clock.clone()),
    ));
    let strategy = RateLimitStrategy::new(algorithm, window, max).unwrap();
    (RateLimiter::new(cache).add_strategy(name, strategy), clock)
}

#[tokio::test]
async fn fixed_window_allows_then_rejects_with_retry_hint() {
    let (limiter, _clock) =
        limiter_with("api", Algorithm::FixedWindow, Duration::from_millis(1000), 3);

    for expected_remaining in [2u32, 1, 0] {
        let d = limiter.check("client", "api", 1.0).await.unwrap();
        assert!(d.allowed);
        assert_eq!(d.limit, 3);
        assert_eq!(d.remaining, expected_remaining);
    }

    let d = limiter.check("client", "api", 1.0).await.unwrap();
    assert!(!d.allowed);
    assert_eq!(d.remaining, 0);
    assert!(d.retry_after.unwrap() > Duration::ZERO);
    assert!(d.retry_after.unwrap() <= Duration::from_millis(1000));
    assert_eq!(d.retry_after_secs(), Some(1));
}

#[tokio::test]
async fn fixed_window_quota_returns_at_the_boundary() {
    let (limiter, clock) =
        limiter_with("api", Algorithm::FixedWindow, Duration::from_millis(1000), 1);

    assert!(limiter.check("client", "api", 1.0).await.unwrap().allowed);
    assert!(!limiter.check("client", "api", 1.0).await.unwrap().allowed);

    clock.advance(Duration::from_millis(1000));
    assert!(limiter.check("client", "api", 1.0).await.unwrap().allowed);
}

#[tokio::test]
async fn sliding_window_restores_capacity_after_the_window() {
    let (limiter, clock) =
        limiter_with("api", Algorithm::SlidingWindow, Duration::from_millis(1000), 2);

    assert!(limiter.check("client", "api", 1.0).await.unwrap().allowed);
    assert!(limiter.check("client", "api", 1.0).await.unwrap().allowed);
    assert!(!limiter.check("client", "api", 1.0).await.unwrap().allowed);

    // Once the trailing window has fully passed, full capacity is back.
    clock.advance(Duration::from_millis(1001));
    let d = limiter.check("client", "api", 1.0).await.unwrap();
    assert!(d.allowed);
    assert_eq!(d.remaining, 1);
}

#[tokio::test]
async fn sliding_window_has_no_boundary_burst() {
    let (limiter, clock) =
        limiter_with("api", Algorithm::SlidingWindow, Duration::from_millis(1000), 2);

    // Spend the quota late in the window.
    clock.advance(Duration::from_millis(900));
    limiter.check("client", "api", 2.0).await.unwrap();

    // Just across the fixed-window boundary the log still counts them.
    clock.advance(Duration::from_millis(200));
    assert!(!limiter.check("client", "api", 1.0).await.unwrap().allowed);
}

#[tokio::test]
async fn token_bucket_refills_continuously() {
    let clock = MockClock::at_epoch_secs(1_700_000_000);
    let cache = Arc::new(TieredCache::new(
        "mp:",
        64,
        Duration::from_secs(300),
        Arc::new(clock.clone()),
    ));
    let strategy =
        RateLimitStrategy::new(Algorithm::TokenBucket, Duration::from_secs(2), 10)
            .unwrap()
            .with_refill_rate(5.0)
            .unwrap();
    let limiter = RateLimiter::new(cache).add_strategy("ws", strategy);

    // Drain the full burst of 10.
    assert!(limiter.check("conn", "ws", 10.0).await.unwrap().allowed);
    assert!(!limiter.check("conn", "ws", 5.0).await.unwrap().allowed);

    // After one second at 5 tokens/sec, a weight-5 request fits again.
    clock.advance(Duration::from_secs(1));
    assert!(limiter.check("conn", "ws", 5.0).await.unwrap().allowed);
}

#[tokio::test]
async fn leaky_bucket_rejection_names_the_leak_time() {
    let (limiter, _clock) =
        limiter_with("ingest", Algorithm::LeakyBucket, Duration::from_secs(1), 4);

    assert!(limiter.check("feed", "ingest", 4.0).await.unwrap().allowed);

    let d = limiter.check("feed", "ingest", 2.0).await.unwrap();
    assert!(!d.allowed);
    // 2 units of excess leak away at 4 units/sec.
    assert_eq!(d.retry_after, Some(Duration::from_millis(500)));
}

#[tokio::test]
async fn unknown_strategy_is_an_error_not_a_decision() {
    let (limiter, _clock) =
        limiter_with("api", Algorithm::FixedWindow, Duration::from_secs(1), 5);

    assert_eq!(
        limiter.check("client", "missing", 1.0).await.unwrap_err(),
        LimiterError::UnknownStrategy("missing".to_string())
    );
}

#[tokio::test]
async fn reset_clears_every_backing_structure() {
    let clock = MockClock::at_epoch_secs(1_700_000_000);
    let cache = Arc::new(TieredCache::new(
        "mp:",
        1024,
        Duration::from_secs(300),
        Arc::new(clock.clone()),
    ));
    let limiter = RateLimiter::new(cache)
        .add_strategy(
            "sw",
            RateLimitStrategy::new(Algorithm::SlidingWindow, Duration::from_secs(60), 1).unwrap(),
        )
        .add_strategy(
            "tb",
            RateLimitStrategy::new(Algorithm::TokenBucket, Duration::from_secs(60), 1).unwrap(),
        );

    assert!(limiter.check("client", "sw", 1.0).await.unwrap().allowed);
    assert!(limiter.check("client", "tb", 1.0).await.unwrap().allowed);
    assert!(!limiter.check("client", "sw", 1.0).await.unwrap().allowed);
    assert!(!limiter.check("client", "tb", 1.0).await.unwrap().allowed);

    limiter.reset("client").await;

    assert!(limiter.check("client", "sw", 1.0).await.unwrap().allowed);
    assert!(limiter.check("client", "tb", 1.0).await.unwrap().allowed);
}

#[tokio::test]
async fn info_is_diagnostic_only() {
    let (limiter, _clock) =
        limiter_with("api", Algorithm::SlidingWindow, Duration::from_secs(10), 3);

    limiter.check("client", "api", 1.0).await.unwrap();

    for _ in 0..4 {
        let d = limiter.info("client", "api").await.unwrap();
        assert!(d.allowed);
        assert_eq!(d.remaining, 1); // 3 - 1 used - 1 hypothetical
    }

    // The window still only holds the one real charge.
    let d = limiter.check("client", "api", 1.0).await.unwrap();
    assert_eq!(d.remaining, 1);
}

#[tokio::test]
async fn strategy_hooks_drive_key_weight_and_skip() {
    let clock = MockClock::at_epoch_secs(1_700_000_000);
    let cache = Arc::new(TieredCache::new(
        "mp:",
        1024,
        Duration::from_secs(300),
        Arc::new(clock.clone()),
    ));
    let strategy = RateLimitStrategy::new(Algorithm::FixedWindow, Duration::from_secs(1), 6)
        .unwrap()
        .with_key_fn(Arc::new(|ctx: &RequestContext| {
            format!("{}:{}", ctx.client, ctx.route.as_deref().unwrap_or("-"))
        }))
        .with_weight_fn(Arc::new(|ctx: &RequestContext| {
            if ctx.route.as_deref() == Some("export") {
                6.0
            } else {
                1.0
            }
        }))
        .with_skip_fn(Arc::new(|ctx: &RequestContext| ctx.client == "monitor"));
    let limiter = RateLimiter::new(cache).add_strategy("api", strategy);

    // One export uses the whole per-route quota...
    let export = RequestContext::for_route("alice", "export");
    assert!(limiter.check_request(&export, "api").await.unwrap().allowed);
    assert!(!limiter.check_request(&export, "api").await.unwrap().allowed);

    // ...while the same client on another route is untouched.
    let lookup = RequestContext::for_route("alice", "lookup");
    assert!(limiter.check_request(&lookup, "api").await.unwrap().allowed);

    // The monitor bypasses enforcement entirely.
    let monitor = RequestContext::new("monitor");
    for _ in 0..50 {
        assert!(limiter.check_request(&monitor, "api").await.unwrap().allowed);
    }
    assert_eq!(limiter.stats().skipped, 50);
}

#[tokio::test]
async fn cache_backed_state_survives_into_a_fresh_instance() {
    // Two limiters over one shared store model a restart (or a second
    // replica with a cold local tier) picking up persisted charges.
    let clock = MockClock::at_epoch_secs(1_700_000_000);
    let store = MemoryStore::new(Arc::new(clock.clone()));

    let make = || {
        let cache = Arc::new(
            TieredCache::new("mp:", 64, Duration::from_secs(300), Arc::new(clock.clone()))
                .with_shared_store(Arc::new(store.clone())),
        );
        RateLimiter::new(cache).add_strategy(
            "api",
            RateLimitStrategy::new(Algorithm::FixedWindow, Duration::from_secs(60), 2).unwrap(),
        )
    };

    let a = make();
    assert!(a.check("client", "api", 1.0).await.unwrap().allowed);
    assert!(a.check("client", "api", 1.0).await.unwrap().allowed);
    assert!(!a.check("client", "api", 1.0).await.unwrap().allowed);

    // A fresh instance reads the charge through the shared tier.
    let b = make();
    assert!(!b.check("client", "api", 1.0).await.unwrap().allowed);
}

#[tokio::test]
async fn token_bucket_state_is_per_instance() {
    let clock = MockClock::at_epoch_secs(1_700_000_000);
    let store = MemoryStore::new(Arc::new(clock.clone()));

    let make = || {
        let cache = Arc::new(
            TieredCache::new("mp:", 64, Duration::from_secs(300), Arc::new(clock.clone()))
                .with_shared_store(Arc::new(store.clone())),
        );
        RateLimiter::new(cache).add_strategy(
            "api",
            RateLimitStrategy::new(Algorithm::TokenBucket, Duration::from_secs(60), 1).unwrap(),
        )
    };

    let a = make();
    let b = make();

    // Each instance has its own bucket: both allow the "only" request.
    assert!(a.check("client", "api", 1.0).await.unwrap().allowed);
    assert!(b.check("client", "api", 1.0).await.unwrap().allowed);
    assert!(!a.check("client", "api", 1.0).await.unwrap().allowed);
}
