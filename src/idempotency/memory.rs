//! In-memory idempotency store with optional lazy expiry.

use super::{IdempotencyContext, IdempotencyStore};
use crate::clock::Clock;
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

struct Entry {
    context: IdempotencyContext,
    recorded_at: DateTime<Utc>,
}

/// HashMap-backed [`IdempotencyStore`] for single-process deployments.
///
/// With a time-to-live configured, entries expire lazily: expired tokens
/// behave as absent on the next read and are removed then. Without one,
/// tokens live until `clear()`.
pub struct InMemoryIdempotencyStore {
    entries: Mutex<HashMap<String, Entry>>,
    ttl: Option<ChronoDuration>,
    clock: Arc<dyn Clock>,
}

impl InMemoryIdempotencyStore {
    /// Store without expiry.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl: None,
            clock,
        }
    }

    /// Store whose entries expire `ttl` after recording.
    pub fn with_ttl(clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl: ChronoDuration::from_std(ttl).ok(),
            clock,
        }
    }

    fn is_expired(&self, entry: &Entry, now: DateTime<Utc>) -> bool {
        match self.ttl {
            Some(ttl) => entry.recorded_at + ttl <= now,
            None => false,
        }
    }
}

#[async_trait]
impl IdempotencyStore for InMemoryIdempotencyStore {
    async fn has(&self, token: &str) -> bool {
        let now = self.clock.now();
        let mut entries = self.entries.lock();
        match entries.get(token) {
            Some(entry) if self.is_expired(entry, now) => {
                entries.remove(token);
                debug!(token_prefix = token.get(..8).unwrap_or(token), "idempotency token expired");
                false
            }
            Some(_) => true,
            None => false,
        }
    }

    async fn record(&self, token: &str, context: IdempotencyContext) {
        let entry = Entry {
            context,
            recorded_at: self.clock.now(),
        };
        self.entries.lock().insert(token.to_string(), entry);
    }

    async fn get_context(&self, token: &str) -> Option<IdempotencyContext> {
        let now = self.clock.now();
        let mut entries = self.entries.lock();
        match entries.get(token) {
            Some(entry) if self.is_expired(entry, now) => {
                entries.remove(token);
                None
            }
            Some(entry) => Some(entry.context.clone()),
            None => None,
        }
    }

    async fn clear(&self) {
        self.entries.lock().clear();
    }

    async fn count(&self) -> usize {
        self.entries.lock().len()
    }
}
