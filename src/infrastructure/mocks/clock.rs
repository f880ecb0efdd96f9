//! Mock clock for testing.

use crate::application::ports::Clock;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Mock clock for testing.
///
/// Allows tests to control time progression explicitly, enabling
/// deterministic testing of TTL expiry and time-based rate limiting.
/// Time is an offset from `UNIX_EPOCH`, matching the `Clock` port.
///
/// # Examples
///
/// ```
/// use marketpulse_core::infrastructure::mocks::MockClock;
/// use marketpulse_core::application::ports::Clock;
/// use std::time::Duration;
///
/// let clock = MockClock::new(Duration::from_secs(1_700_000_000));
/// assert_eq!(clock.now().as_secs(), 1_700_000_000);
///
/// clock.advance(Duration::from_secs(10));
/// assert_eq!(clock.now().as_secs(), 1_700_000_010);
/// ```
///
/// # Thread Safety
///
/// `MockClock` is thread-safe and can be cloned to share across tasks. All
/// clones share the same underlying time value.
#[derive(Debug, Clone)]
pub struct MockClock {
    current: Arc<Mutex<Duration>>,
}

impl MockClock {
    /// Create a mock clock starting at the given offset from `UNIX_EPOCH`.
    pub fn new(start: Duration) -> Self {
        Self {
            current: Arc::new(Mutex::new(start)),
        }
    }

    /// A clock starting at a round, readable epoch second.
    pub fn at_epoch_secs(secs: u64) -> Self {
        Self::new(Duration::from_secs(secs))
    }

    /// Advance the clock by a duration.
    pub fn advance(&self, duration: Duration) {
        let mut time = self
            .current
            .lock()
            .expect("MockClock mutex poisoned - a test thread panicked while holding the lock");
        *time += duration;
    }

    /// Set the clock to a specific offset.
    pub fn set(&self, offset: Duration) {
        let mut time = self
            .current
            .lock()
            .expect("MockClock mutex poisoned - a test thread panicked while holding the lock");
        *time = offset;
    }
}

impl Clock for MockClock {
    fn now(&self) -> Duration {
        *self
            .current
            .lock()
            .expect("MockClock mutex poisoned - a test thread panicked while holding the lock")
    }
}
