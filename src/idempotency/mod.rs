//! # Idempotency Tokens and Store Contract
//!
//! Duplicate suppression for logically identical work. Producers attach a
//! 256-bit token to a job; once the queue records that token, every later
//! enqueue bearing it is a no-op until the store entry is cleared or expires.
//!
//! Token generation comes in two flavors:
//! - [`generate_token`] draws from the OS random source and is intentionally
//!   non-reproducible.
//! - [`generate_token_with_hint`] hashes a caller-supplied hint (for example
//!   `sender + payload fingerprint`) so retrying producers converge on the
//!   same token without coordinating.
//!
//! The backing store is swappable: the queue depends only on the
//! [`IdempotencyStore`] trait, so an external key-value backend can replace
//! the bundled [`InMemoryIdempotencyStore`].

pub mod memory;

pub use memory::InMemoryIdempotencyStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt::Write as _;

/// Context recorded alongside a token, for diagnostics and duplicate reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdempotencyContext {
    /// Id of the job that first claimed the token.
    pub job_id: String,

    /// When the claiming job was enqueued.
    pub enqueued_at: DateTime<Utc>,

    /// Attempts at the time of recording.
    pub attempts: u32,
}

/// Contract between the queue and a token store backend.
///
/// Mutating operations must be serialized per instance; the bundled in-memory
/// implementation does so with an internal lock.
#[async_trait]
pub trait IdempotencyStore: Send + Sync {
    /// Whether the token has been recorded and is still live.
    async fn has(&self, token: &str) -> bool;

    /// Record a token with its context. Recording an already-present token
    /// overwrites the context.
    async fn record(&self, token: &str, context: IdempotencyContext);

    /// Context recorded for a live token, if any.
    async fn get_context(&self, token: &str) -> Option<IdempotencyContext>;

    /// Drop every recorded token. Operational/test use.
    async fn clear(&self);

    /// Number of live tokens.
    async fn count(&self) -> usize;
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut out, b| {
        let _ = write!(out, "{b:02x}");
        out
    })
}

/// Generate a random 256-bit token as 64 lowercase hex characters.
pub fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    hex_encode(&bytes)
}

/// Derive a deterministic 256-bit token from a hint. Equal hints always
/// produce equal tokens.
pub fn generate_token_with_hint(hint: &str) -> String {
    let digest = Sha256::digest(hint.as_bytes());
    hex_encode(&digest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_tokens_are_64_hex_chars() {
        let token = generate_token();
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn random_tokens_do_not_repeat() {
        assert_ne!(generate_token(), generate_token());
    }

    #[test]
    fn hinted_tokens_are_deterministic() {
        let a = generate_token_with_hint("sender-1:payload-fingerprint");
        let b = generate_token_with_hint("sender-1:payload-fingerprint");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn different_hints_diverge() {
        assert_ne!(
            generate_token_with_hint("sender-1:tx-a"),
            generate_token_with_hint("sender-1:tx-b")
        );
    }
}
