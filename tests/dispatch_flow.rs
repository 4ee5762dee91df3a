//! End-to-end dispatch flow integration tests.
//!
//! Exercises the complete path: producer enqueue with idempotency tokens,
//! batcher dispatch through circuit breaker and bulkhead gates, failure
//! backoff across simulated time, and terminal drop after exhausted attempts.

use async_trait::async_trait;
use chain_dispatch::batcher::{Batcher, Driver, DriverError};
use chain_dispatch::clock::MockClock;
use chain_dispatch::config::{
    BackoffConfig, BulkheadConfig, CircuitBreakerConfig, QueueConfig,
};
use chain_dispatch::idempotency::{generate_token_with_hint, InMemoryIdempotencyStore};
use chain_dispatch::job::Job;
use chain_dispatch::queue::TransactionQueue;
use chain_dispatch::resilience::{Bulkhead, CircuitBreaker};
use chain_dispatch::tracer::Tracer;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Driver that fails the first `failures_before_success` submissions of each
/// payload, then accepts.
struct FlakyDriver {
    failures_before_success: usize,
    attempts: Mutex<std::collections::HashMap<Vec<u8>, usize>>,
    calls: AtomicUsize,
}

impl FlakyDriver {
    fn new(failures_before_success: usize) -> Self {
        Self {
            failures_before_success,
            attempts: Mutex::new(std::collections::HashMap::new()),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Driver for FlakyDriver {
    async fn send_transaction(&self, payload: &[u8]) -> Result<String, DriverError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut attempts = self.attempts.lock();
        let seen = attempts.entry(payload.to_vec()).or_insert(0);
        *seen += 1;
        if *seen <= self.failures_before_success {
            Err(DriverError::new("node unavailable"))
        } else {
            Ok(format!("sub-{}", payload.first().copied().unwrap_or(0)))
        }
    }
}

/// Records terminal failure traces for assertions.
#[derive(Default)]
struct TerminalTracer {
    failures: Mutex<Vec<(String, String)>>,
}

impl Tracer for TerminalTracer {
    fn trace_job_failure(&self, job_id: &str, sanitized_error: &str) {
        self.failures
            .lock()
            .push((job_id.to_string(), sanitized_error.to_string()));
    }
}

fn queue_config(max_attempts: u32) -> QueueConfig {
    QueueConfig {
        backoff: BackoffConfig {
            base: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            jitter_factor: 0.0,
            max_attempts,
        },
        ..Default::default()
    }
}

#[tokio::test]
async fn flaky_endpoint_recovers_across_dispatch_rounds() {
    let clock = Arc::new(MockClock::epoch());
    let queue = Arc::new(TransactionQueue::new(queue_config(5), clock.clone()).unwrap());
    let driver = Arc::new(FlakyDriver::new(2));
    let batcher = Batcher::builder(queue.clone(), driver.clone()).build();

    queue.enqueue(Job::new("tx-1", vec![1])).await;

    // Round one: fails, re-queued with backoff.
    let round = batcher.dispatch().await;
    assert_eq!(round.failure_count(), 1);
    assert_eq!(queue.size(), 1);

    // Nothing is ready until the backoff elapses.
    assert!(batcher.dispatch().await.is_empty());

    clock.advance(Duration::from_secs(3));
    let round = batcher.dispatch().await;
    assert_eq!(round.failure_count(), 1);

    clock.advance(Duration::from_secs(5));
    let round = batcher.dispatch().await;
    assert_eq!(round.success_count(), 1);
    assert!(queue.is_empty());
    assert_eq!(driver.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn persistent_failure_exhausts_and_drops_with_trace() {
    let clock = Arc::new(MockClock::epoch());
    let queue = Arc::new(TransactionQueue::new(queue_config(3), clock.clone()).unwrap());
    let driver = Arc::new(FlakyDriver::new(usize::MAX));
    let tracer = Arc::new(TerminalTracer::default());
    let batcher = Batcher::builder(queue.clone(), driver)
        .tracer(tracer.clone())
        .build();

    queue.enqueue(Job::new("tx-doomed", vec![9])).await;

    for _ in 0..3 {
        batcher.dispatch().await;
        clock.advance(Duration::from_secs(120));
    }

    assert!(queue.is_empty());
    let failures = tracer.failures.lock();
    let terminal = failures.last().unwrap();
    assert_eq!(terminal.0, "tx-doomed");
    assert!(terminal.1.contains("attempts exhausted"));
}

#[tokio::test]
async fn duplicate_producers_converge_on_one_submission() {
    let clock = Arc::new(MockClock::epoch());
    let store = Arc::new(InMemoryIdempotencyStore::new(clock.clone()));
    let queue = Arc::new(
        TransactionQueue::new(queue_config(5), clock.clone())
            .unwrap()
            .with_store(store),
    );
    let driver = Arc::new(FlakyDriver::new(0));
    let batcher = Batcher::builder(queue.clone(), driver.clone()).build();

    // Two producers derive the same token from the same sender + payload.
    let token = generate_token_with_hint("sender-1:payload-abc");
    queue
        .enqueue(Job::new("tx-a", vec![7]).with_idempotency_token(token.clone()))
        .await;
    queue
        .enqueue(Job::new("tx-b", vec![7]).with_idempotency_token(token.clone()))
        .await;
    assert_eq!(queue.size(), 1);

    let result = batcher.dispatch().await;
    assert_eq!(result.success_count(), 1);
    assert_eq!(driver.calls.load(Ordering::SeqCst), 1);

    // The token stays recorded after success: resubmission is still blocked.
    queue
        .enqueue(Job::new("tx-c", vec![7]).with_idempotency_token(token))
        .await;
    assert!(queue.is_empty());
}

#[tokio::test]
async fn breaker_and_bulkhead_gate_the_full_pipeline() {
    let clock = Arc::new(MockClock::epoch());
    let queue = Arc::new(TransactionQueue::new(queue_config(10), clock.clone()).unwrap());
    let breaker = Arc::new(
        CircuitBreaker::new(
            "rpc-primary",
            CircuitBreakerConfig {
                failure_threshold: 2,
                window: Duration::from_secs(60),
                cooldown: Duration::from_secs(30),
                success_threshold: 1,
            },
            clock.clone(),
        )
        .unwrap(),
    );
    let bulkhead = Arc::new(
        Bulkhead::new(
            "rpc-primary",
            BulkheadConfig {
                max_concurrent: 4,
                ..Default::default()
            },
        )
        .unwrap(),
    );

    let driver = Arc::new(FlakyDriver::new(1));
    let batcher = Batcher::builder(queue.clone(), driver.clone())
        .circuit_breaker(breaker.clone())
        .bulkhead(bulkhead.clone())
        .build();

    queue.enqueue(Job::new("tx-1", vec![1])).await;
    queue.enqueue(Job::new("tx-2", vec![2])).await;

    // Both first submissions fail, tripping the breaker at threshold 2.
    let round = batcher.dispatch().await;
    assert_eq!(round.failure_count(), 2);
    assert!(breaker.is_open());
    assert_eq!(bulkhead.active_count(), 0);

    // While open, dispatch rejects without reaching the driver.
    clock.advance(Duration::from_secs(5));
    let calls_before = driver.calls.load(Ordering::SeqCst);
    let round = batcher.dispatch().await;
    assert_eq!(round.failure_count(), 2);
    assert_eq!(driver.calls.load(Ordering::SeqCst), calls_before);
    assert!(round
        .failures
        .iter()
        .all(|f| f.error.contains("circuit breaker is open")));

    // After the cooldown the probe succeeds and the pipeline drains.
    clock.advance(Duration::from_secs(40));
    let round = batcher.dispatch().await;
    assert_eq!(round.success_count(), 2);
    assert!(breaker.is_closed());
    assert!(queue.is_empty());
    assert_eq!(bulkhead.active_count(), 0);
}
