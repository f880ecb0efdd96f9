//! Ports (interfaces) for the application layer.
//!
//! In hexagonal architecture, ports define the interfaces that the
//! application layer needs. Infrastructure adapters implement these ports:
//! `SystemClock`/`MockClock` for `Clock`, `RedisStore`/`MemoryStore` for
//! `SharedStore`. `Component` is implemented by every unit the registry
//! manages, inside this crate and out.

use crate::domain::health::HealthReport;
use async_trait::async_trait;
use std::fmt;
use std::time::Duration;

/// Port for obtaining current time.
///
/// Time is expressed as the offset from `UNIX_EPOCH` rather than an
/// `Instant`: window bucket indices and shared-tier records derived from it
/// must mean the same thing to every process sharing the store.
pub trait Clock: Send + Sync + fmt::Debug {
    /// Current offset from `UNIX_EPOCH`.
    fn now(&self) -> Duration;

    /// Current time in whole milliseconds since `UNIX_EPOCH`.
    fn now_millis(&self) -> u64 {
        self.now().as_millis() as u64
    }
}

/// Error from a shared-tier operation.
///
/// Callers inside the cache catch this, log it, and degrade to a miss; it
/// never crosses the cache boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreError {
    message: String,
}

impl StoreError {
    /// Wrap a backend error message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "shared store error: {}", self.message)
    }
}

impl std::error::Error for StoreError {}

/// Port for the shared/durable cache tier.
///
/// Values are opaque bytes; serialization happens at the cache boundary so
/// every backend moves the same payload. All operations are awaited
/// suspension points.
#[async_trait]
pub trait SharedStore: Send + Sync + fmt::Debug {
    /// Check connectivity to the backing store.
    async fn ping(&self) -> Result<(), StoreError>;

    /// Fetch the bytes stored under `key`, if present and unexpired.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Store `value` under `key` with the given time-to-live.
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), StoreError>;

    /// Remove `key`. Returns whether an entry existed.
    async fn delete(&self, key: &str) -> Result<bool, StoreError>;

    /// Remove every key starting with `prefix`. Returns the count removed.
    async fn delete_prefix(&self, prefix: &str) -> Result<u64, StoreError>;

    /// Remaining time-to-live for `key`, if the key exists and has one.
    async fn ttl_remaining(&self, key: &str) -> Result<Option<Duration>, StoreError>;
}

/// Error from a component lifecycle call.
pub type ComponentError = Box<dyn std::error::Error + Send + Sync>;

/// Contract for every unit managed by the service registry.
///
/// Components declare a unique name and the names of the components they
/// depend on; the registry derives the lifecycle order from those
/// declarations. `initialize` and `start` failures are fatal to boot;
/// `stop` failures are logged by the registry and must not prevent other
/// components from stopping.
///
/// `start()` may assume every declared dependency is already ready.
#[async_trait]
pub trait Component: Send + Sync {
    /// Unique name this component registers under.
    fn name(&self) -> &str;

    /// Names of components that must be ready before this one.
    fn dependencies(&self) -> Vec<String> {
        Vec::new()
    }

    /// Acquire resources. Called once, in dependency order.
    async fn initialize(&self) -> Result<(), ComponentError> {
        Ok(())
    }

    /// Begin serving. Called once after every component initialized.
    async fn start(&self) -> Result<(), ComponentError> {
        Ok(())
    }

    /// Release resources. Called in reverse dependency order.
    async fn stop(&self) -> Result<(), ComponentError> {
        Ok(())
    }

    /// Probe current health. Errors are converted to unhealthy reports by
    /// the registry, never propagated.
    async fn health(&self) -> Result<HealthReport, ComponentError> {
        Ok(HealthReport::healthy())
    }
}
