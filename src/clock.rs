//! # Injectable Time Source
//!
//! Every time-dependent component (queue backoff scheduling, circuit breaker
//! cooldowns, idempotency expiry) reads time through the [`Clock`] trait rather
//! than calling `Utc::now()` directly. Production code injects [`SystemClock`];
//! tests inject a [`MockClock`] and advance it explicitly, so scheduling
//! behavior can be verified without sleeping.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use parking_lot::Mutex;
use std::time::Duration;

/// Read-only time source. Implementations must be side-effect free so that
/// substituting a fake clock never perturbs other components.
pub trait Clock: Send + Sync {
    /// Current instant as a UTC timestamp.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time source used in production.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Controllable clock for deterministic tests.
///
/// Starts at a fixed instant and only moves when told to. Shared freely via
/// `Arc<MockClock>` so a test can hold the handle it advances while components
/// read through `Arc<dyn Clock>`.
#[derive(Debug)]
pub struct MockClock {
    current: Mutex<DateTime<Utc>>,
}

impl MockClock {
    /// Create a mock clock starting at the given instant.
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            current: Mutex::new(start),
        }
    }

    /// Create a mock clock starting at the Unix epoch.
    pub fn epoch() -> Self {
        Self::new(DateTime::<Utc>::from_timestamp(0, 0).unwrap_or_default())
    }

    /// Move the clock forward by `delta`.
    pub fn advance(&self, delta: Duration) {
        let mut current = self.current.lock();
        *current += ChronoDuration::from_std(delta).unwrap_or(ChronoDuration::zero());
    }

    /// Set the clock to an absolute instant.
    pub fn set(&self, instant: DateTime<Utc>) {
        *self.current.lock() = instant;
    }
}

impl Clock for MockClock {
    fn now(&self) -> DateTime<Utc> {
        *self.current.lock()
    }
}
