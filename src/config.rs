//! # Dispatch Core Configuration
//!
//! Explicit, validated configuration for every component. Invalid parameters
//! fail at construction with a [`ConfigError`], never at call time, so a
//! misconfigured breaker or bulkhead can not silently admit every call.
//!
//! All durations are `std::time::Duration`; serde derives let integrators load
//! these sections from their own configuration files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Invalid constructor parameters.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

impl ConfigError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            field,
            reason: reason.into(),
        }
    }
}

/// Exponential backoff parameters for retry scheduling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackoffConfig {
    /// Base delay multiplied by `2^attempts`. A zero base still yields the
    /// one-second retry floor rather than a busy-retry loop.
    pub base: Duration,

    /// Upper bound on any computed delay, applied after jitter.
    pub max_delay: Duration,

    /// Jitter factor in `0.0..=1.0`; the computed delay is stretched by up to
    /// this fraction to decorrelate retries from concurrent producers.
    pub jitter_factor: f64,

    /// Attempts after which a job is treated as permanently failed.
    pub max_attempts: u32,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(1),
            max_delay: Duration::from_secs(300),
            jitter_factor: 0.1,
            max_attempts: 5,
        }
    }
}

impl BackoffConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::invalid("max_attempts", "must be at least 1"));
        }
        if self.max_delay.is_zero() {
            return Err(ConfigError::invalid("max_delay", "must be positive"));
        }
        if !(0.0..=1.0).contains(&self.jitter_factor) {
            return Err(ConfigError::invalid(
                "jitter_factor",
                format!("must be within 0.0..=1.0, got {}", self.jitter_factor),
            ));
        }
        Ok(())
    }
}

/// Configuration for [`crate::queue::TransactionQueue`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Retry scheduling parameters.
    pub backoff: BackoffConfig,

    /// Batch size used by `collect_ready_jobs` when the caller passes no
    /// explicit maximum.
    pub default_batch_size: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            backoff: BackoffConfig::default(),
            default_batch_size: 25,
        }
    }
}

impl QueueConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_batch_size == 0 {
            return Err(ConfigError::invalid(
                "default_batch_size",
                "must be at least 1",
            ));
        }
        self.backoff.validate()
    }
}

/// Configuration for [`crate::resilience::CircuitBreaker`].
///
/// The failure-count window and the open-state cooldown are independent knobs:
/// a wide window with a high threshold tolerates short failure bursts, while
/// the cooldown controls how long a genuinely failing endpoint stays isolated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Failures within `window` required to open the circuit.
    pub failure_threshold: u32,

    /// Sliding window over which failures are counted.
    pub window: Duration,

    /// How long an open circuit rejects calls before probing recovery.
    pub cooldown: Duration,

    /// Consecutive half-open successes required to close the circuit.
    pub success_threshold: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            window: Duration::from_secs(60),
            cooldown: Duration::from_secs(30),
            success_threshold: 2,
        }
    }
}

impl CircuitBreakerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.failure_threshold == 0 {
            return Err(ConfigError::invalid(
                "failure_threshold",
                "must be at least 1",
            ));
        }
        if self.window.is_zero() {
            return Err(ConfigError::invalid("window", "must be positive"));
        }
        if self.cooldown.is_zero() {
            return Err(ConfigError::invalid("cooldown", "must be positive"));
        }
        if self.success_threshold == 0 {
            return Err(ConfigError::invalid(
                "success_threshold",
                "must be at least 1",
            ));
        }
        Ok(())
    }
}

/// Configuration for [`crate::resilience::Bulkhead`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkheadConfig {
    /// Maximum operations in flight at once.
    pub max_concurrent: u32,

    /// Callers allowed to wait for capacity when the bulkhead is full.
    /// Zero disables queueing: admission failures reject immediately.
    pub max_queue_size: usize,

    /// How long a queued caller waits for capacity before rejection.
    pub queue_timeout: Duration,
}

impl Default for BulkheadConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 10,
            max_queue_size: 0,
            queue_timeout: Duration::from_secs(5),
        }
    }
}

impl BulkheadConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrent == 0 {
            return Err(ConfigError::invalid(
                "max_concurrent",
                "must be at least 1",
            ));
        }
        if self.max_queue_size > 0 && self.queue_timeout.is_zero() {
            return Err(ConfigError::invalid(
                "queue_timeout",
                "must be positive when queueing is enabled",
            ));
        }
        Ok(())
    }
}
