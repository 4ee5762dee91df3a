//! # Transaction Queue
//!
//! Time-gated, dedup-aware store of jobs awaiting dispatch. Jobs enter through
//! `enqueue` (where idempotency suppression happens), leave through
//! `dequeue`/`collect_ready_jobs` once their `next_available_at` has passed,
//! and re-enter through `record_failure` with an exponentially backed-off
//! schedule until attempts run out.
//!
//! A job exists in exactly one place at a time: either inside this queue or
//! owned by the caller that dequeued it. `record_failure` takes the job back
//! by value and either re-inserts it or returns it as exhausted.

use crate::clock::Clock;
use crate::config::{ConfigError, QueueConfig};
use crate::idempotency::{IdempotencyContext, IdempotencyStore};
use crate::job::Job;
use crate::tracer::{NoopTracer, Tracer};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Floor applied to computed retry delays so a zero backoff base never turns
/// into a busy-retry loop.
const MIN_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Outcome of an `enqueue` call. Duplicate suppression is a normal outcome,
/// not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnqueueOutcome {
    /// Job accepted and queued.
    Accepted,
    /// Job carried an idempotency token already on record; nothing was queued.
    Duplicate,
}

/// Outcome of `record_failure`.
#[derive(Debug)]
pub enum RetryDecision {
    /// Job re-queued; it becomes eligible again at `next_available_at`.
    /// `job` is a snapshot of the re-queued state for reporting; the queue
    /// keeps the live copy.
    Retry {
        job: Job,
        next_available_at: DateTime<Utc>,
    },
    /// Attempts exhausted. The job is handed back and must not be re-enqueued;
    /// the caller owns terminal reporting.
    Exhausted { job: Job },
}

/// Time-gated, dedup-aware job queue with exponential backoff scheduling.
pub struct TransactionQueue {
    config: QueueConfig,
    clock: Arc<dyn Clock>,
    store: Option<Arc<dyn IdempotencyStore>>,
    tracer: Arc<dyn Tracer>,
    jobs: Mutex<Vec<Job>>,
}

impl TransactionQueue {
    /// Create a queue with the given configuration and clock. Fails on
    /// invalid configuration.
    pub fn new(config: QueueConfig, clock: Arc<dyn Clock>) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            clock,
            store: None,
            tracer: Arc::new(NoopTracer),
            jobs: Mutex::new(Vec::new()),
        })
    }

    /// Attach an idempotency store; without one, tokens are ignored.
    pub fn with_store(mut self, store: Arc<dyn IdempotencyStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Attach a tracer for queue-level hooks.
    pub fn with_tracer(mut self, tracer: Arc<dyn Tracer>) -> Self {
        self.tracer = tracer;
        self
    }

    /// Accept a job for dispatch. If the job carries an idempotency token the
    /// store already knows, this is a suppressed no-op. Never blocks on
    /// anything but the store lookup.
    pub async fn enqueue(&self, mut job: Job) -> EnqueueOutcome {
        if let (Some(store), Some(token)) = (&self.store, &job.idempotency_token) {
            if store.has(token).await {
                debug!(job_id = %job.id, "duplicate enqueue suppressed by idempotency token");
                return EnqueueOutcome::Duplicate;
            }
        }

        let now = self.clock.now();
        job.created_at = now;
        job.next_available_at = now;

        if let (Some(store), Some(token)) = (&self.store, &job.idempotency_token) {
            let context = IdempotencyContext {
                job_id: job.id.clone(),
                enqueued_at: now,
                attempts: job.attempts,
            };
            store.record(token, context).await;
        }

        let job_id = job.id.clone();
        self.jobs.lock().push(job);
        self.tracer.on_enqueued(&job_id);
        EnqueueOutcome::Accepted
    }

    /// Remove and return the earliest-inserted job whose `next_available_at`
    /// has passed. Returns `None` when no job is ready; a not-yet-ready job is
    /// never returned.
    pub fn dequeue(&self) -> Option<Job> {
        let now = self.clock.now();
        let job = {
            let mut jobs = self.jobs.lock();
            let index = jobs.iter().position(|job| job.next_available_at <= now)?;
            Some(jobs.remove(index))
        }?;
        self.tracer.on_dequeued(&job.id);
        Some(job)
    }

    /// Repeated `dequeue` up to `max` jobs (default
    /// [`QueueConfig::default_batch_size`]), preserving insertion order.
    /// Unready jobs stay queued.
    pub fn collect_ready_jobs(&self, max: Option<usize>) -> Vec<Job> {
        let limit = max.unwrap_or(self.config.default_batch_size);
        let mut ready = Vec::new();
        while ready.len() < limit {
            match self.dequeue() {
                Some(job) => ready.push(job),
                None => break,
            }
        }
        ready
    }

    /// Record a dispatch failure for a job this queue handed out. Attempts
    /// are incremented; if they reach `max_attempts` the job is handed back
    /// as [`RetryDecision::Exhausted`] and must not be re-enqueued. Otherwise
    /// the job is re-inserted with `next_available_at` pushed out by an
    /// exponential, jittered, capped delay.
    pub fn record_failure(&self, mut job: Job, error: &str) -> RetryDecision {
        job.attempts += 1;

        if job.attempts >= self.config.backoff.max_attempts {
            warn!(
                job_id = %job.id,
                attempts = job.attempts,
                error = %error,
                "job exhausted retry attempts"
            );
            return RetryDecision::Exhausted { job };
        }

        let delay = self.backoff_delay(job.attempts);
        let next_available_at = self.clock.now()
            + ChronoDuration::from_std(delay).unwrap_or_else(|_| ChronoDuration::seconds(1));
        job.next_available_at = next_available_at;

        debug!(
            job_id = %job.id,
            attempts = job.attempts,
            delay_ms = delay.as_millis() as u64,
            error = %error,
            "job re-queued with backoff"
        );

        let snapshot = job.clone();
        self.jobs.lock().push(job);
        RetryDecision::Retry {
            job: snapshot,
            next_available_at,
        }
    }

    /// Finalize bookkeeping after a successful dispatch. The idempotency
    /// token stays recorded so duplicate resubmission remains blocked; only
    /// the store's own expiry releases it.
    pub fn acknowledge(&self, job: &Job) {
        debug!(job_id = %job.id, attempts = job.attempts, "job acknowledged");
    }

    /// Number of jobs currently queued (ready or not).
    pub fn size(&self) -> usize {
        self.jobs.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.lock().is_empty()
    }

    /// Exponential backoff: `base * 2^attempts`, stretched by up to
    /// `jitter_factor`, capped at `max_delay`, floored so a zero base can
    /// never busy-retry.
    fn backoff_delay(&self, attempts: u32) -> Duration {
        let backoff = &self.config.backoff;
        let exponent = attempts.min(32) as i32;
        let raw = backoff.base.as_secs_f64() * 2f64.powi(exponent);
        let jittered = raw * (1.0 + fastrand::f64() * backoff.jitter_factor);
        let capped = jittered.min(backoff.max_delay.as_secs_f64());
        let floor = MIN_RETRY_DELAY.min(backoff.max_delay);
        Duration::from_secs_f64(capped.max(floor.as_secs_f64()))
    }
}
