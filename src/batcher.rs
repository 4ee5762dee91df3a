//! # Batcher
//!
//! Pulls ready jobs from the queue, dispatches them per driver capability,
//! and reconciles partial failure. Batch-capable drivers get one `send_batch`
//! call per group with per-index outcomes; everything else falls back to
//! sequential `send_transaction` calls with per-job error capture.
//!
//! Resilience gates wrap the driver call when configured: bulkhead admission
//! outside, circuit breaker inside. A rejection from either gate fails the
//! affected jobs without ever invoking the driver, and those jobs travel the
//! same failure path as a driver error: sanitize, record, re-queue or drop.
//!
//! Guarantee: every job that enters `dispatch()` ends in exactly one of
//! success, re-queued-for-retry, or dropped-with-terminal-trace. Nothing is
//! silently lost.

use crate::error::DispatchError;
use crate::job::Job;
use crate::queue::{RetryDecision, TransactionQueue};
use crate::resilience::{Bulkhead, BulkheadError, CircuitBreaker, CircuitBreakerError};
use crate::sanitize::sanitize_error;
use crate::tracer::{NoopTracer, Tracer};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info};

/// Failure reported by a driver for a single submission.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct DriverError {
    pub message: String,
}

impl DriverError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Submission interface to a chain-specific protocol adapter.
///
/// The payload is opaque to the core. `send_batch` has a sequential default
/// so drivers only override it when their protocol has a native batch call;
/// `supports_batching` is the explicit capability query the batcher consults.
#[async_trait]
pub trait Driver: Send + Sync {
    /// Submit one payload, returning a driver-assigned submission id.
    async fn send_transaction(&self, payload: &[u8]) -> Result<String, DriverError>;

    /// Submit an ordered list of payloads, returning one outcome per index.
    /// The outer error means the batch call itself never reached the
    /// endpoint; per-index errors are individual job failures.
    async fn send_batch(
        &self,
        payloads: &[Vec<u8>],
    ) -> Result<Vec<Result<String, DriverError>>, DriverError> {
        let mut outcomes = Vec::with_capacity(payloads.len());
        for payload in payloads {
            outcomes.push(self.send_transaction(payload).await);
        }
        Ok(outcomes)
    }

    /// Whether `send_batch` is a native protocol operation.
    fn supports_batching(&self) -> bool {
        false
    }
}

/// Pluggable strategy assigning each job to a dispatch group.
pub trait GroupingStrategy: Send + Sync {
    fn group_key(&self, job: &Job) -> String;
}

/// Default strategy: one group per driver instance.
#[derive(Debug, Default, Clone, Copy)]
pub struct SingleGroup;

impl GroupingStrategy for SingleGroup {
    fn group_key(&self, _job: &Job) -> String {
        "default".to_string()
    }
}

/// Groups jobs by a metadata field (for example a network name), falling back
/// to a single shared group when the field is absent.
#[derive(Debug, Clone)]
pub struct MetadataGrouping {
    field: String,
}

impl MetadataGrouping {
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
        }
    }
}

impl GroupingStrategy for MetadataGrouping {
    fn group_key(&self, job: &Job) -> String {
        job.metadata
            .get(&self.field)
            .cloned()
            .unwrap_or_else(|| "default".to_string())
    }
}

/// A job that failed dispatch, with its sanitized error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobFailure {
    pub job: Job,
    pub error: String,
}

/// Reconciled outcome of one dispatch round.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchResult {
    /// Jobs accepted by the driver, in dispatch order.
    pub successes: Vec<Job>,
    /// Jobs that failed, with sanitized errors. Re-queued jobs appear here
    /// with their incremented attempt count; exhausted jobs appear with a
    /// terminal error.
    pub failures: Vec<JobFailure>,
}

impl BatchResult {
    pub fn success_count(&self) -> usize {
        self.successes.len()
    }

    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    /// No failures in this round (vacuously true for an empty round).
    pub fn is_full_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// At least one job was touched and none succeeded.
    pub fn is_full_failure(&self) -> bool {
        self.successes.is_empty() && !self.failures.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.successes.is_empty() && self.failures.is_empty()
    }
}

/// Orchestrates queue-to-driver dispatch with resilience gates.
pub struct Batcher {
    queue: Arc<TransactionQueue>,
    driver: Arc<dyn Driver>,
    circuit_breaker: Option<Arc<CircuitBreaker>>,
    bulkhead: Option<Arc<Bulkhead>>,
    tracer: Arc<dyn Tracer>,
    grouping: Arc<dyn GroupingStrategy>,
    max_batch_size: Option<usize>,
}

/// Builder for [`Batcher`]; queue and driver are mandatory, everything else
/// defaults off.
pub struct BatcherBuilder {
    queue: Arc<TransactionQueue>,
    driver: Arc<dyn Driver>,
    circuit_breaker: Option<Arc<CircuitBreaker>>,
    bulkhead: Option<Arc<Bulkhead>>,
    tracer: Arc<dyn Tracer>,
    grouping: Arc<dyn GroupingStrategy>,
    max_batch_size: Option<usize>,
}

impl BatcherBuilder {
    pub fn circuit_breaker(mut self, breaker: Arc<CircuitBreaker>) -> Self {
        self.circuit_breaker = Some(breaker);
        self
    }

    pub fn bulkhead(mut self, bulkhead: Arc<Bulkhead>) -> Self {
        self.bulkhead = Some(bulkhead);
        self
    }

    pub fn tracer(mut self, tracer: Arc<dyn Tracer>) -> Self {
        self.tracer = tracer;
        self
    }

    pub fn grouping(mut self, grouping: Arc<dyn GroupingStrategy>) -> Self {
        self.grouping = grouping;
        self
    }

    /// Cap on jobs pulled per dispatch round; defaults to the queue's
    /// configured batch size.
    pub fn max_batch_size(mut self, max: usize) -> Self {
        self.max_batch_size = Some(max);
        self
    }

    pub fn build(self) -> Batcher {
        Batcher {
            queue: self.queue,
            driver: self.driver,
            circuit_breaker: self.circuit_breaker,
            bulkhead: self.bulkhead,
            tracer: self.tracer,
            grouping: self.grouping,
            max_batch_size: self.max_batch_size,
        }
    }
}

impl Batcher {
    pub fn builder(queue: Arc<TransactionQueue>, driver: Arc<dyn Driver>) -> BatcherBuilder {
        BatcherBuilder {
            queue,
            driver,
            circuit_breaker: None,
            bulkhead: None,
            tracer: Arc::new(NoopTracer),
            grouping: Arc::new(SingleGroup),
            max_batch_size: None,
        }
    }

    /// Passthrough for integrators that pull jobs and dispatch manually.
    pub fn collect_ready_jobs(&self) -> Vec<Job> {
        self.queue.collect_ready_jobs(self.max_batch_size)
    }

    /// Run one dispatch round: pull ready jobs, submit per group, reconcile.
    ///
    /// With zero ready jobs this is a complete no-op: no tracer events fire.
    pub async fn dispatch(&self) -> BatchResult {
        let jobs = self.queue.collect_ready_jobs(self.max_batch_size);
        if jobs.is_empty() {
            return BatchResult::default();
        }

        self.tracer.trace_batch_start(jobs.len());
        info!(ready_jobs = jobs.len(), "dispatching batch");

        let mut result = BatchResult::default();
        for (group_key, group) in self.group_jobs(jobs) {
            debug!(group = %group_key, jobs = group.len(), "dispatching group");
            if self.driver.supports_batching() {
                self.dispatch_group_batched(group, &mut result).await;
            } else {
                self.dispatch_group_sequential(group, &mut result).await;
            }
        }

        self.tracer
            .trace_batch_complete(result.success_count(), result.failure_count());
        result
    }

    /// Partition jobs into dispatch groups, preserving arrival order within
    /// and across groups.
    fn group_jobs(&self, jobs: Vec<Job>) -> Vec<(String, Vec<Job>)> {
        let mut groups: Vec<(String, Vec<Job>)> = Vec::new();
        for job in jobs {
            let key = self.grouping.group_key(&job);
            match groups.iter_mut().find(|(existing, _)| *existing == key) {
                Some((_, group)) => group.push(job),
                None => groups.push((key, vec![job])),
            }
        }
        groups
    }

    async fn dispatch_group_batched(&self, jobs: Vec<Job>, result: &mut BatchResult) {
        let payloads: Vec<Vec<u8>> = jobs.iter().map(|job| job.payload.clone()).collect();

        match self.guarded_send_batch(&payloads).await {
            Ok(outcomes) => {
                let mut outcomes = outcomes.into_iter();
                for job in jobs {
                    match outcomes.next() {
                        Some(Ok(submission_id)) => {
                            self.finalize_success(job, &submission_id, result);
                        }
                        Some(Err(driver_error)) => {
                            self.handle_failure(job, &driver_error.message, result);
                        }
                        // A short outcome vector is a driver contract bug;
                        // treat the unreported tail as failed, never lost.
                        None => {
                            self.handle_failure(
                                job,
                                "driver returned no outcome for batch index",
                                result,
                            );
                        }
                    }
                }
            }
            Err(rejection) => {
                let message = rejection.to_string();
                for job in jobs {
                    self.handle_failure(job, &message, result);
                }
            }
        }
    }

    async fn dispatch_group_sequential(&self, jobs: Vec<Job>, result: &mut BatchResult) {
        for job in jobs {
            let outcome = self.guarded_send(&job.payload).await;
            match outcome {
                Ok(submission_id) => self.finalize_success(job, &submission_id, result),
                Err(rejection) => self.handle_failure(job, &rejection.to_string(), result),
            }
        }
    }

    /// One `send_transaction` call through the configured gates.
    async fn guarded_send(&self, payload: &[u8]) -> Result<String, DispatchError> {
        let driver = Arc::clone(&self.driver);
        let breaker = self.circuit_breaker.clone();
        let inner = move || async move {
            match breaker {
                Some(breaker) => breaker
                    .call(|| driver.send_transaction(payload))
                    .await
                    .map_err(flatten_breaker),
                None => driver
                    .send_transaction(payload)
                    .await
                    .map_err(|e| DispatchError::Driver { message: e.message }),
            }
        };

        match &self.bulkhead {
            Some(bulkhead) => bulkhead
                .execute(inner)
                .await
                .map_err(|e| flatten_bulkhead(e, bulkhead)),
            None => inner().await,
        }
    }

    /// One `send_batch` call through the configured gates.
    async fn guarded_send_batch(
        &self,
        payloads: &[Vec<u8>],
    ) -> Result<Vec<Result<String, DriverError>>, DispatchError> {
        let driver = Arc::clone(&self.driver);
        let breaker = self.circuit_breaker.clone();
        let inner = move || async move {
            match breaker {
                Some(breaker) => breaker
                    .call(|| driver.send_batch(payloads))
                    .await
                    .map_err(flatten_breaker),
                None => driver
                    .send_batch(payloads)
                    .await
                    .map_err(|e| DispatchError::Driver { message: e.message }),
            }
        };

        match &self.bulkhead {
            Some(bulkhead) => bulkhead
                .execute(inner)
                .await
                .map_err(|e| flatten_bulkhead(e, bulkhead)),
            None => inner().await,
        }
    }

    fn finalize_success(&self, job: Job, submission_id: &str, result: &mut BatchResult) {
        self.queue.acknowledge(&job);
        self.tracer.trace_job_success(&job.id);
        debug!(job_id = %job.id, submission_id = %submission_id, "job finalized");
        result.successes.push(job);
    }

    /// Sanitize, record, and either re-queue or terminally drop a failed job.
    fn handle_failure(&self, job: Job, raw_error: &str, result: &mut BatchResult) {
        let sanitized = sanitize_error(raw_error);
        match self.queue.record_failure(job, &sanitized) {
            RetryDecision::Retry { job, .. } => {
                self.tracer.trace_job_failure(&job.id, &sanitized);
                result.failures.push(JobFailure {
                    job,
                    error: sanitized,
                });
            }
            RetryDecision::Exhausted { job } => {
                let terminal = format!(
                    "attempts exhausted after {}: {}",
                    job.attempts, sanitized
                );
                error!(
                    job_id = %job.id,
                    attempts = job.attempts,
                    "job dropped after exhausting retries"
                );
                self.tracer.trace_job_failure(&job.id, &terminal);
                result.failures.push(JobFailure {
                    job,
                    error: terminal,
                });
            }
        }
    }
}

fn flatten_breaker(error: CircuitBreakerError<DriverError>) -> DispatchError {
    match error {
        CircuitBreakerError::CircuitOpen { endpoint } => DispatchError::CircuitOpen { endpoint },
        CircuitBreakerError::OperationFailed(driver_error) => DispatchError::Driver {
            message: driver_error.message,
        },
    }
}

fn flatten_bulkhead(error: BulkheadError<DispatchError>, bulkhead: &Bulkhead) -> DispatchError {
    match error {
        BulkheadError::Full { active, max, .. } => DispatchError::BulkheadFull { active, max },
        BulkheadError::QueueTimeout { .. } => DispatchError::BulkheadFull {
            active: bulkhead.active_count(),
            max: bulkhead.stats().max_concurrent,
        },
        BulkheadError::OperationFailed(inner) => inner,
    }
}
