//! # Dispatch Error Taxonomy
//!
//! Distinguishes "we tried and the endpoint failed" from "we never tried":
//! circuit-open and bulkhead-full rejections carry their own variants so
//! callers can branch between skipping and deferring, while driver failures
//! feed the normal backoff/retry path. Duplicate enqueue suppression is not an
//! error at all; see [`crate::queue::EnqueueOutcome`].

use crate::config::ConfigError;

/// Errors surfaced by the dispatch core.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// Circuit breaker rejected the call without invoking the driver.
    #[error("circuit breaker is open for {endpoint}")]
    CircuitOpen { endpoint: String },

    /// Bulkhead admission was denied without invoking the driver.
    #[error("bulkhead at capacity ({active}/{max} in flight)")]
    BulkheadFull { active: u32, max: u32 },

    /// Job failed `max_attempts` times and was dropped from the queue.
    #[error("job {job_id} exhausted retries after {attempts} attempts")]
    AttemptsExhausted { job_id: String, attempts: u32 },

    /// The driver reported a submission failure (message already sanitized).
    #[error("driver submission failed: {message}")]
    Driver { message: String },

    /// Invalid constructor parameters, surfaced at construction time.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type Result<T> = std::result::Result<T, DispatchError>;
