//! Infrastructure layer - external adapters and integrations.
//!
//! This layer provides adapters for:
//! - Clock abstraction (system time vs mock)
//! - The bounded LRU local cache tier
//! - The Redis shared cache tier (feature `redis-store`)

pub mod clock;
pub mod local;

#[cfg(feature = "redis-store")]
pub mod redis_store;

/// Mock implementations for testing.
///
/// This module is only available when the `test-helpers` feature is
/// enabled, or during test builds. It provides controllable test doubles
/// for time and the shared cache tier.
///
/// To use these mocks in integration tests, add to your `Cargo.toml`:
/// ```toml
/// [dev-dependencies]
/// marketpulse-core = { version = "*", features = ["test-helpers"] }
/// ```
#[cfg(any(test, feature = "test-helpers"))]
pub mod mocks;
