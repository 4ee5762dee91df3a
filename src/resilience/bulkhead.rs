//! # Bulkhead Concurrency Limiter
//!
//! Caps in-flight operations against a downstream endpoint independently of
//! circuit breaker state. Admission is a compare-and-swap loop on an atomic
//! counter, so a race can never push the active count past `max_concurrent`.
//! An optional bounded wait queue lets callers block briefly for capacity
//! instead of rejecting outright.

use crate::config::{BulkheadConfig, ConfigError};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use tokio::sync::Notify;
use tracing::{debug, info, warn};

/// Errors produced by bulkhead admission.
#[derive(Debug, thiserror::Error)]
pub enum BulkheadError<E> {
    /// No capacity and no wait queue (or the queue itself is full); the
    /// operation was never invoked.
    #[error("bulkhead {name} at capacity ({active}/{max} in flight)")]
    Full { name: String, active: u32, max: u32 },

    /// The caller waited `queue_timeout` for capacity and none appeared; the
    /// operation was never invoked.
    #[error("bulkhead {name} admission timed out after {waited_ms}ms")]
    QueueTimeout { name: String, waited_ms: u64 },

    /// The operation ran and failed.
    #[error("operation failed: {0}")]
    OperationFailed(E),
}

/// Utilization snapshot for observability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkheadStats {
    pub active: u32,
    pub available: u32,
    pub max_concurrent: u32,
    pub utilization_pct: f64,
    pub queued: usize,
}

/// Bounded concurrency admission control around the driver call.
pub struct Bulkhead {
    name: String,
    config: BulkheadConfig,
    active: AtomicU32,
    queued: AtomicUsize,
    capacity_freed: Notify,
}

impl Bulkhead {
    /// Create a bulkhead for the named endpoint. Fails on invalid
    /// configuration.
    pub fn new(name: impl Into<String>, config: BulkheadConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let name = name.into();
        info!(
            endpoint = %name,
            max_concurrent = config.max_concurrent,
            max_queue_size = config.max_queue_size,
            "bulkhead initialized"
        );
        Ok(Self {
            name,
            config,
            active: AtomicU32::new(0),
            queued: AtomicUsize::new(0),
            capacity_freed: Notify::new(),
        })
    }

    /// Try to take a slot. Returns `true` and increments the active count when
    /// capacity is available; `false` otherwise. Callers that acquire manually
    /// own the matching `release()`.
    pub fn try_acquire(&self) -> bool {
        self.active
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |active| {
                (active < self.config.max_concurrent).then_some(active + 1)
            })
            .is_ok()
    }

    /// Return a slot. Floored at zero and safe to call more times than
    /// acquired; the active count never goes negative.
    pub fn release(&self) {
        let released = self
            .active
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |active| {
                active.checked_sub(1)
            })
            .is_ok();
        if released {
            self.capacity_freed.notify_one();
        } else {
            debug!(endpoint = %self.name, "release called with no active acquisition");
        }
    }

    /// Run an operation under a scoped acquisition. The slot is returned on
    /// every exit path, success or failure. Without capacity, the caller
    /// either waits in the bounded queue (when configured) or is rejected
    /// immediately with [`BulkheadError::Full`]; either way the operation is
    /// never invoked unless a slot was taken.
    pub async fn execute<F, Fut, T, E>(&self, operation: F) -> Result<T, BulkheadError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let _permit = self.acquire_permit().await?;
        operation()
            .await
            .map_err(BulkheadError::OperationFailed)
    }

    async fn acquire_permit<E>(&self) -> Result<Permit<'_>, BulkheadError<E>> {
        if self.try_acquire() {
            return Ok(Permit { bulkhead: self });
        }

        if self.config.max_queue_size == 0 {
            return Err(self.full_error());
        }

        // Bounded wait queue: reserve a waiter slot, then poll for capacity
        // until the queue timeout expires.
        let enqueued = self
            .queued
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |queued| {
                (queued < self.config.max_queue_size).then_some(queued + 1)
            })
            .is_ok();
        if !enqueued {
            warn!(endpoint = %self.name, "bulkhead wait queue full, rejecting");
            return Err(self.full_error());
        }

        let started = std::time::Instant::now();
        let wait = async {
            loop {
                let notified = self.capacity_freed.notified();
                if self.try_acquire() {
                    return;
                }
                notified.await;
            }
        };

        let outcome = tokio::time::timeout(self.config.queue_timeout, wait).await;
        self.queued.fetch_sub(1, Ordering::AcqRel);

        match outcome {
            Ok(()) => Ok(Permit { bulkhead: self }),
            Err(_) => Err(BulkheadError::QueueTimeout {
                name: self.name.clone(),
                waited_ms: started.elapsed().as_millis() as u64,
            }),
        }
    }

    fn full_error<E>(&self) -> BulkheadError<E> {
        BulkheadError::Full {
            name: self.name.clone(),
            active: self.active_count(),
            max: self.config.max_concurrent,
        }
    }

    /// Operations currently in flight.
    pub fn active_count(&self) -> u32 {
        self.active.load(Ordering::Acquire)
    }

    /// Whether an acquisition would currently succeed.
    pub fn has_capacity(&self) -> bool {
        self.active_count() < self.config.max_concurrent
    }

    /// Utilization snapshot.
    pub fn stats(&self) -> BulkheadStats {
        let active = self.active_count();
        let max = self.config.max_concurrent;
        BulkheadStats {
            active,
            available: max.saturating_sub(active),
            max_concurrent: max,
            utilization_pct: f64::from(active) / f64::from(max) * 100.0,
            queued: self.queued.load(Ordering::Acquire),
        }
    }

    /// Endpoint name this bulkhead guards.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// RAII slot holder; dropping it returns the slot.
struct Permit<'a> {
    bulkhead: &'a Bulkhead,
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        self.bulkhead.release();
    }
}
