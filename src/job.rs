//! # Job Model
//!
//! A job is a unit of idempotent work awaiting dispatch, typically a prepared
//! and signed transaction. The payload is an opaque blob whose meaning belongs
//! entirely to the driver; this core only schedules it.
//!
//! Ownership rules: the queue owns a job while it is pending. `attempts` and
//! `next_available_at` are updated only through queue methods; everything else
//! is immutable after enqueue.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// A unit of work awaiting dispatch to a remote endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Producer-assigned unique identifier, opaque to the core.
    pub id: String,

    /// Opaque payload handed verbatim to the driver.
    pub payload: Vec<u8>,

    /// Free-form key/value metadata (network name, sender, priority hints).
    pub metadata: HashMap<String, String>,

    /// Optional dedup token; see [`crate::idempotency`].
    pub idempotency_token: Option<String>,

    /// Delivery attempts so far. Starts at zero, bumped by
    /// `TransactionQueue::record_failure`.
    pub attempts: u32,

    /// Earliest instant the job may be dequeued again.
    pub next_available_at: DateTime<Utc>,

    /// When the job was accepted by the queue.
    pub created_at: DateTime<Utc>,
}

impl Job {
    /// Create a job ready for immediate dispatch. The queue restamps
    /// `created_at`/`next_available_at` from its injected clock on enqueue.
    pub fn new(id: impl Into<String>, payload: Vec<u8>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            payload,
            metadata: HashMap::new(),
            idempotency_token: None,
            attempts: 0,
            next_available_at: now,
            created_at: now,
        }
    }

    /// Create a job with a generated UUID v4 id, for producers that have no
    /// natural identifier of their own.
    pub fn with_generated_id(payload: Vec<u8>) -> Self {
        Self::new(Uuid::new_v4().to_string(), payload)
    }

    /// Attach a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Attach an idempotency token for duplicate suppression.
    pub fn with_idempotency_token(mut self, token: impl Into<String>) -> Self {
        self.idempotency_token = Some(token.into());
        self
    }
}
