//! Application layer - orchestration of domain logic.
//!
//! This layer coordinates the core's runtime behavior:
//! - Service registry (lifecycle ordering and aggregate health)
//! - Tiered cache (the one piece of truly shared mutable state)
//! - Rate limiter (admission decisions, persisted through the cache)
//! - Stats counters surfaced through health probes
//!
//! ## Ports
//!
//! The application layer defines ports (traits) that infrastructure
//! adapters must implement. This keeps the application layer independent
//! from infrastructure details.

pub mod cache;
pub mod limiter;
pub mod metrics;
pub mod ports;
pub mod registry;
