#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Chain Dispatch
//!
//! Resilient operation-dispatch core for blockchain client SDKs.
//!
//! ## Overview
//!
//! The crate accepts idempotent work items ("jobs", typically prepared and
//! signed transactions), schedules their execution with exponential backoff,
//! groups ready jobs into batches, and protects the downstream remote
//! endpoint with circuit breaking and concurrency bulkheading. Chain-specific
//! protocol adapters (JSON-RPC clients, codecs, signing) live outside the
//! core and are reached through the narrow [`batcher::Driver`] trait.
//!
//! ## Architecture
//!
//! A producer creates a [`job::Job`] and hands it to
//! [`queue::TransactionQueue::enqueue`], where idempotency tokens suppress
//! duplicates. [`batcher::Batcher::dispatch`] pulls ready jobs, groups them,
//! and submits each group through the configured resilience gates
//! ([`resilience::Bulkhead`] admission outside, [`resilience::CircuitBreaker`]
//! inside). Successes are finalized; failures are sanitized, recorded with
//! backoff, and re-queued until attempts run out. [`tracer::Tracer`] hooks
//! fire at every transition.
//!
//! ## Module Organization
//!
//! - [`job`] - The unit of dispatchable work
//! - [`queue`] - Time-gated, dedup-aware pending-job store
//! - [`batcher`] - Queue-to-driver dispatch orchestration
//! - [`resilience`] - Circuit breaker, bulkhead, per-endpoint registry
//! - [`idempotency`] - Token generation and the store contract
//! - [`clock`] - Injectable time source for deterministic tests
//! - [`tracer`] - Observability hooks (no-op by default)
//! - [`sanitize`] - Masking of address-like and key-sized hex in errors
//! - [`config`] - Validated component configuration
//! - [`error`] - Structured error taxonomy
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use chain_dispatch::batcher::{Batcher, Driver, DriverError};
//! use chain_dispatch::clock::SystemClock;
//! use chain_dispatch::config::QueueConfig;
//! use chain_dispatch::job::Job;
//! use chain_dispatch::queue::TransactionQueue;
//! use async_trait::async_trait;
//! use std::sync::Arc;
//!
//! struct JsonRpcDriver;
//!
//! #[async_trait]
//! impl Driver for JsonRpcDriver {
//!     async fn send_transaction(&self, payload: &[u8]) -> Result<String, DriverError> {
//!         // protocol adapter submits the payload here
//!         # let _ = payload;
//!         Ok("0xsubmission".to_string())
//!     }
//! }
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let clock = Arc::new(SystemClock);
//! let queue = Arc::new(TransactionQueue::new(QueueConfig::default(), clock)?);
//! let batcher = Batcher::builder(queue.clone(), Arc::new(JsonRpcDriver)).build();
//!
//! queue.enqueue(Job::new("tx-1", vec![0xde, 0xad])).await;
//! let result = batcher.dispatch().await;
//! println!("dispatched: {} ok, {} failed", result.success_count(), result.failure_count());
//! # Ok(())
//! # }
//! ```

pub mod batcher;
pub mod clock;
pub mod config;
pub mod error;
pub mod idempotency;
pub mod job;
pub mod logging;
pub mod queue;
pub mod resilience;
pub mod sanitize;
pub mod tracer;

pub use batcher::{
    BatchResult, Batcher, BatcherBuilder, Driver, DriverError, GroupingStrategy, JobFailure,
    MetadataGrouping, SingleGroup,
};
pub use clock::{Clock, MockClock, SystemClock};
pub use config::{
    BackoffConfig, BulkheadConfig, CircuitBreakerConfig, ConfigError, QueueConfig,
};
pub use error::{DispatchError, Result};
pub use idempotency::{
    generate_token, generate_token_with_hint, IdempotencyContext, IdempotencyStore,
    InMemoryIdempotencyStore,
};
pub use job::Job;
pub use queue::{EnqueueOutcome, RetryDecision, TransactionQueue};
pub use resilience::{
    Bulkhead, BulkheadError, BulkheadStats, CircuitBreaker, CircuitBreakerError,
    CircuitBreakerRegistry, CircuitState,
};
pub use tracer::{LogTracer, NoopTracer, Tracer};
