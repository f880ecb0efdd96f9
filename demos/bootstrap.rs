//! Demo: configure, boot, and exercise the infrastructure core the way the
//! dashboard backend does at startup.
//!
//! Run with `cargo run --example bootstrap`.

use marketpulse_core::{
    CoreConfig, RateLimiter, RequestContext, ServiceRegistry, SystemClock, TieredCache,
};
use std::sync::Arc;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    // In production this comes from the deployment environment.
    let config: CoreConfig = serde_json::from_str(
        r#"{
            "cache": { "capacity": 4096, "default_ttl_secs": 60, "key_prefix": "demo:" },
            "strategies": {
                "public-api": {
                    "algorithm": "sliding_window",
                    "window_ms": 1000,
                    "max_requests": 5
                },
                "bulk-export": {
                    "algorithm": "token_bucket",
                    "window_ms": 60000,
                    "max_requests": 10,
                    "burst": 3
                }
            }
        }"#,
    )?;

    let clock = Arc::new(SystemClock::new());
    let cache = Arc::new(TieredCache::new(
        config.cache.key_prefix.clone(),
        config.cache.capacity,
        config.cache.default_ttl(),
        clock,
    ));
    let limiter = Arc::new(
        RateLimiter::new(Arc::clone(&cache)).with_strategies(config.build_strategies()?),
    );

    let mut registry = ServiceRegistry::new();
    registry.register(Arc::clone(&cache) as Arc<dyn marketpulse_core::Component>)?;
    registry.register(Arc::clone(&limiter) as Arc<dyn marketpulse_core::Component>)?;

    let order = registry.initialize_all().await?;
    println!("boot order: {:?}", order);
    registry.start_all().await?;

    // Simulate a burst of dashboard requests from one client.
    let client = RequestContext::new("203.0.113.9");
    for i in 1..=8 {
        let decision = limiter.check_request(&client, "public-api").await?;
        if decision.allowed {
            println!("request {} allowed ({} remaining)", i, decision.remaining);
        } else {
            println!(
                "request {} throttled, retry after {}s",
                i,
                decision.retry_after_secs().unwrap_or(0)
            );
        }
    }

    // The cache serves the rest of the backend directly too.
    cache.set("ticker:btc", &64_250.5f64, None).await;
    let price: Option<f64> = cache.get("ticker:btc").await;
    println!("cached BTC price: {:?}", price);
    println!("cache stats: {:?}", cache.stats());

    for (name, report) in registry.health_check_all().await {
        println!("health {}: {:?}", name, report.status);
    }

    let failures = registry.stop_all().await;
    println!("shutdown complete ({} stop failures)", failures.len());
    Ok(())
}
