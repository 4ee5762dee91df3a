//! # Observability Hooks
//!
//! The [`Tracer`] trait is the only telemetry surface of the core: queue and
//! batcher call these hooks at every job transition, and integrators decide
//! what to do with them (metrics, spans, audit logs). Every method has a
//! no-op default body, so implementors override only what they need.
//!
//! Error text reaching `trace_job_failure` has already been through
//! [`crate::sanitize::sanitize_error`].

use tracing::{debug, info, warn};

/// Observability hooks fired by the queue and the batcher.
pub trait Tracer: Send + Sync {
    /// A job was accepted into the queue.
    fn on_enqueued(&self, _job_id: &str) {}

    /// A ready job was pulled from the queue for dispatch.
    fn on_dequeued(&self, _job_id: &str) {}

    /// A dispatch round started with this many ready jobs. Never fired for
    /// an empty round.
    fn trace_batch_start(&self, _count: usize) {}

    /// A dispatch round finished. Fires once any job was touched.
    fn trace_batch_complete(&self, _successes: usize, _failures: usize) {}

    /// A job was accepted by the driver and finalized.
    fn trace_job_success(&self, _job_id: &str) {}

    /// A job failed; `sanitized_error` is safe for logs and exports.
    /// Fires both for retryable failures and for the terminal drop after
    /// attempts are exhausted.
    fn trace_job_failure(&self, _job_id: &str, _sanitized_error: &str) {}
}

/// Default tracer: every hook is a no-op.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTracer;

impl Tracer for NoopTracer {}

/// Tracer that forwards every hook to structured `tracing` events.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogTracer;

impl Tracer for LogTracer {
    fn on_enqueued(&self, job_id: &str) {
        debug!(job_id = %job_id, "job enqueued");
    }

    fn on_dequeued(&self, job_id: &str) {
        debug!(job_id = %job_id, "job dequeued for dispatch");
    }

    fn trace_batch_start(&self, count: usize) {
        info!(ready_jobs = count, "dispatch batch started");
    }

    fn trace_batch_complete(&self, successes: usize, failures: usize) {
        info!(
            successes = successes,
            failures = failures,
            "dispatch batch complete"
        );
    }

    fn trace_job_success(&self, job_id: &str) {
        debug!(job_id = %job_id, "job dispatched successfully");
    }

    fn trace_job_failure(&self, job_id: &str, sanitized_error: &str) {
        warn!(job_id = %job_id, error = %sanitized_error, "job dispatch failed");
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::Tracer;
    use parking_lot::Mutex;

    /// Tracer that records every hook invocation for assertions.
    #[derive(Default)]
    pub struct RecordingTracer {
        pub enqueued: Mutex<Vec<String>>,
        pub dequeued: Mutex<Vec<String>>,
        pub batch_starts: Mutex<Vec<usize>>,
        pub batch_completes: Mutex<Vec<(usize, usize)>>,
        pub successes: Mutex<Vec<String>>,
        pub failures: Mutex<Vec<(String, String)>>,
    }

    impl Tracer for RecordingTracer {
        fn on_enqueued(&self, job_id: &str) {
            self.enqueued.lock().push(job_id.to_string());
        }

        fn on_dequeued(&self, job_id: &str) {
            self.dequeued.lock().push(job_id.to_string());
        }

        fn trace_batch_start(&self, count: usize) {
            self.batch_starts.lock().push(count);
        }

        fn trace_batch_complete(&self, successes: usize, failures: usize) {
            self.batch_completes.lock().push((successes, failures));
        }

        fn trace_job_success(&self, job_id: &str) {
            self.successes.lock().push(job_id.to_string());
        }

        fn trace_job_failure(&self, job_id: &str, sanitized_error: &str) {
            self.failures
                .lock()
                .push((job_id.to_string(), sanitized_error.to_string()));
        }
    }
}
