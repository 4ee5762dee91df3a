//! # Circuit Breaker Implementation
//!
//! Failure-aware call gate protecting a remote endpoint. Classic three-state
//! machine: Closed (normal operation), Open (failing fast), and HalfOpen
//! (probing recovery). Failures are counted over a sliding time window, so a
//! short burst inside a wide window can be tolerated while a genuinely failing
//! endpoint still trips the breaker; the open-state cooldown is an independent
//! knob.

use crate::clock::Clock;
use crate::config::{CircuitBreakerConfig, ConfigError};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Circuit breaker states representing the current operational mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Normal operation, all calls are allowed through.
    Closed,
    /// Failure mode, all calls fail fast without executing.
    Open,
    /// Testing recovery, calls execute and successes are counted.
    HalfOpen,
}

/// Errors produced by a protected call.
#[derive(Debug, thiserror::Error)]
pub enum CircuitBreakerError<E> {
    /// Circuit is open; the operation was never invoked.
    #[error("circuit breaker is open for {endpoint}")]
    CircuitOpen { endpoint: String },

    /// The operation ran and failed; the failure was recorded.
    #[error("operation failed: {0}")]
    OperationFailed(E),
}

struct BreakerInner {
    state: CircuitState,
    /// Failure timestamps inside the sliding window, oldest first.
    failures: VecDeque<DateTime<Utc>>,
    /// Consecutive successes, meaningful only in HalfOpen.
    half_open_successes: u32,
    opened_at: Option<DateTime<Utc>>,
    /// Manual maintenance override; only `close()` clears it.
    forced_open: bool,
}

/// Failure-aware call gate with a sliding failure window and manual overrides.
///
/// All state transitions happen under one mutex, which is never held across
/// an await: concurrent callers can never both claim the same
/// threshold-crossing transition.
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    clock: Arc<dyn Clock>,
    window: ChronoDuration,
    cooldown: ChronoDuration,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    /// Create a circuit breaker for the named endpoint. Fails on invalid
    /// configuration.
    pub fn new(
        name: impl Into<String>,
        config: CircuitBreakerConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::from_validated(name, config, clock))
    }

    /// Construct from a configuration validated by the caller (registry path).
    pub(crate) fn from_validated(
        name: impl Into<String>,
        config: CircuitBreakerConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let name = name.into();
        info!(
            endpoint = %name,
            failure_threshold = config.failure_threshold,
            window_seconds = config.window.as_secs(),
            cooldown_seconds = config.cooldown.as_secs(),
            success_threshold = config.success_threshold,
            "circuit breaker initialized"
        );

        let window = ChronoDuration::from_std(config.window)
            .unwrap_or_else(|_| ChronoDuration::seconds(60));
        let cooldown = ChronoDuration::from_std(config.cooldown)
            .unwrap_or_else(|_| ChronoDuration::seconds(30));

        Self {
            name,
            config,
            clock,
            window,
            cooldown,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                failures: VecDeque::new(),
                half_open_successes: 0,
                opened_at: None,
                forced_open: false,
            }),
        }
    }

    /// Execute an operation under circuit breaker protection.
    ///
    /// In Open state the operation is never invoked and
    /// [`CircuitBreakerError::CircuitOpen`] is returned, unless the cooldown
    /// has elapsed, which moves the breaker to HalfOpen and lets the call
    /// proceed as a probe.
    pub async fn call<F, Fut, T, E>(&self, operation: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.admit()?;

        let result = operation().await;
        match &result {
            Ok(_) => self.on_success(),
            Err(_) => self.on_failure(),
        }
        result.map_err(CircuitBreakerError::OperationFailed)
    }

    /// Decide whether a call may proceed, transitioning Open to HalfOpen when
    /// the cooldown has elapsed.
    fn admit<E>(&self) -> Result<(), CircuitBreakerError<E>> {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed | CircuitState::HalfOpen => Ok(()),
            CircuitState::Open => {
                if inner.forced_open {
                    return Err(CircuitBreakerError::CircuitOpen {
                        endpoint: self.name.clone(),
                    });
                }
                let now = self.clock.now();
                let cooled_down = inner
                    .opened_at
                    .map(|opened| now - opened >= self.cooldown)
                    .unwrap_or(true);
                if cooled_down {
                    inner.state = CircuitState::HalfOpen;
                    inner.half_open_successes = 0;
                    info!(
                        endpoint = %self.name,
                        success_threshold = self.config.success_threshold,
                        "circuit breaker half-open (probing recovery)"
                    );
                    Ok(())
                } else {
                    Err(CircuitBreakerError::CircuitOpen {
                        endpoint: self.name.clone(),
                    })
                }
            }
        }
    }

    fn on_success(&self) {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed => {
                // A success in normal operation resets the failure window.
                inner.failures.clear();
            }
            CircuitState::HalfOpen => {
                inner.half_open_successes += 1;
                debug!(
                    endpoint = %self.name,
                    successes = inner.half_open_successes,
                    "half-open probe succeeded"
                );
                if inner.half_open_successes >= self.config.success_threshold {
                    inner.state = CircuitState::Closed;
                    inner.failures.clear();
                    inner.half_open_successes = 0;
                    inner.opened_at = None;
                    info!(endpoint = %self.name, "circuit breaker closed (recovered)");
                }
            }
            CircuitState::Open => {
                warn!(endpoint = %self.name, "success recorded while circuit is open");
            }
        }
    }

    fn on_failure(&self) {
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed => {
                inner.failures.push_back(now);
                Self::prune(&mut inner.failures, now, self.window);
                if inner.failures.len() as u32 >= self.config.failure_threshold {
                    inner.state = CircuitState::Open;
                    inner.opened_at = Some(now);
                    inner.half_open_successes = 0;
                    error!(
                        endpoint = %self.name,
                        failures_in_window = inner.failures.len(),
                        failure_threshold = self.config.failure_threshold,
                        "circuit breaker opened (failing fast)"
                    );
                }
            }
            CircuitState::HalfOpen => {
                // Any failure while probing immediately re-opens the circuit
                // and restarts the cooldown.
                inner.state = CircuitState::Open;
                inner.opened_at = Some(now);
                inner.half_open_successes = 0;
                inner.failures.push_back(now);
                error!(endpoint = %self.name, "half-open probe failed, circuit re-opened");
            }
            CircuitState::Open => {
                // Already open, nothing to transition.
            }
        }
    }

    /// Retain only failure timestamps inside the sliding window.
    fn prune(failures: &mut VecDeque<DateTime<Utc>>, now: DateTime<Utc>, window: ChronoDuration) {
        while let Some(oldest) = failures.front() {
            if now - *oldest > window {
                failures.pop_front();
            } else {
                break;
            }
        }
    }

    /// Manual maintenance override: fail fast until `close()` is called.
    pub fn force_open(&self) {
        let mut inner = self.inner.lock();
        inner.state = CircuitState::Open;
        inner.forced_open = true;
        inner.opened_at = Some(self.clock.now());
        warn!(endpoint = %self.name, "circuit breaker forced open");
    }

    /// Reset to Closed and clear all counters, including a forced-open
    /// condition.
    pub fn close(&self) {
        let mut inner = self.inner.lock();
        inner.state = CircuitState::Closed;
        inner.forced_open = false;
        inner.failures.clear();
        inner.half_open_successes = 0;
        inner.opened_at = None;
        info!(endpoint = %self.name, "circuit breaker manually closed");
    }

    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    pub fn is_closed(&self) -> bool {
        self.state() == CircuitState::Closed
    }

    pub fn is_open(&self) -> bool {
        self.state() == CircuitState::Open
    }

    pub fn is_half_open(&self) -> bool {
        self.state() == CircuitState::HalfOpen
    }

    /// Failures currently inside the sliding window, pruned at read time.
    pub fn failure_count(&self) -> usize {
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        Self::prune(&mut inner.failures, now, self.window);
        inner.failures.len()
    }

    /// Endpoint name this breaker guards.
    pub fn name(&self) -> &str {
        &self.name
    }
}
