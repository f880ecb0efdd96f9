use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use marketpulse_core::{Algorithm, RateLimiter, RateLimitStrategy, TieredCache};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;

fn limiter(algorithm: Algorithm) -> RateLimiter {
    let clock = Arc::new(marketpulse_core::SystemClock::new());
    let cache = Arc::new(TieredCache::new(
        "bench:",
        100_000,
        Duration::from_secs(300),
        clock,
    ));
    let strategy =
        RateLimitStrategy::new(algorithm, Duration::from_secs(60), 1_000_000).unwrap();
    RateLimiter::new(cache).add_strategy("bench", strategy)
}

/// Throughput of a single hot key per algorithm.
fn bench_check_throughput(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("check_throughput");
    group.throughput(Throughput::Elements(1));

    for algorithm in [
        Algorithm::FixedWindow,
        Algorithm::SlidingWindow,
        Algorithm::TokenBucket,
        Algorithm::LeakyBucket,
    ] {
        let limiter = limiter(algorithm);
        group.bench_with_input(
            BenchmarkId::from_parameter(algorithm),
            &limiter,
            |b, limiter| {
                b.iter(|| {
                    rt.block_on(async {
                        limiter
                            .check(black_box("hot-key"), "bench", 1.0)
                            .await
                            .unwrap()
                    })
                })
            },
        );
    }

    group.finish();
}

/// Cost of cache get/set pairs under the limiter's record sizes.
fn bench_cache_round_trip(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let clock = Arc::new(marketpulse_core::SystemClock::new());
    let cache = TieredCache::new("bench:", 100_000, Duration::from_secs(300), clock);

    c.bench_function("cache_set_get", |b| {
        b.iter(|| {
            rt.block_on(async {
                cache.set(black_box("key"), &black_box(42u64), None).await;
                cache.get::<u64>(black_box("key")).await
            })
        })
    });
}

criterion_group!(benches, bench_check_throughput, bench_cache_round_trip);
criterion_main!(benches);
