//! Mock implementations for testing.
//!
//! Available when the `test-helpers` feature is enabled, or during test
//! builds. Provides controllable test doubles for time and the shared cache
//! tier:
//!
//! ```toml
//! [dev-dependencies]
//! marketpulse-core = { version = "*", features = ["test-helpers"] }
//! ```

mod clock;
mod store;

pub use clock::MockClock;
pub use store::MemoryStore;
