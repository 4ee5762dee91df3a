//! Property tests for backoff scheduling and error sanitization.

use chain_dispatch::clock::MockClock;
use chain_dispatch::config::{BackoffConfig, QueueConfig};
use chain_dispatch::job::Job;
use chain_dispatch::queue::{RetryDecision, TransactionQueue};
use chain_dispatch::sanitize::sanitize_error;
use proptest::prelude::*;
use std::sync::Arc;
use std::time::Duration;

fn queue(base_secs: u64, max_delay_secs: u64, jitter: f64) -> TransactionQueue {
    let config = QueueConfig {
        backoff: BackoffConfig {
            base: Duration::from_secs(base_secs),
            max_delay: Duration::from_secs(max_delay_secs),
            jitter_factor: jitter,
            max_attempts: u32::MAX,
        },
        ..Default::default()
    };
    TransactionQueue::new(config, Arc::new(MockClock::epoch())).unwrap()
}

proptest! {
    /// Successive failures of one job always yield a non-decreasing
    /// `next_available_at`, bounded by `max_delay` from the current instant.
    #[test]
    fn backoff_is_monotone_and_bounded(
        base_secs in 0u64..10,
        max_delay_secs in 1u64..600,
        jitter in 0.0f64..=1.0,
        rounds in 1usize..20,
    ) {
        let queue = queue(base_secs, max_delay_secs, jitter);
        let mut job = Job::new("tx-prop", vec![1]);
        let mut previous = None;

        for _ in 0..rounds {
            match queue.record_failure(job, "transient") {
                RetryDecision::Retry { job: requeued, next_available_at } => {
                    if let Some(previous) = previous {
                        prop_assert!(next_available_at >= previous);
                    }
                    let delay = next_available_at - chrono::DateTime::<chrono::Utc>::from_timestamp(0, 0).unwrap();
                    prop_assert!(delay.num_seconds() <= max_delay_secs as i64 + 1);
                    prop_assert!(delay > chrono::Duration::zero());
                    previous = Some(next_available_at);
                    // Drive the next round from the returned snapshot; the
                    // attempt counter lives on the job itself.
                    job = requeued;
                }
                RetryDecision::Exhausted { .. } => unreachable!("max_attempts is u32::MAX"),
            }
        }
    }

    /// No hex run of 40 or more characters survives sanitization verbatim,
    /// even when glued directly to surrounding word characters.
    #[test]
    fn long_hex_never_survives_sanitization(
        prefix in "[a-z]{0,20}",
        hex in "[0-9a-f]{40,128}",
        suffix in "[a-z]{0,20}",
    ) {
        let message = format!("{prefix}{hex}{suffix}");
        let sanitized = sanitize_error(&message);
        prop_assert!(!sanitized.contains(&hex));
    }

    /// Sanitization never rewrites plain prose with no hex content.
    #[test]
    fn prose_passes_through_sanitization(message in "[g-z ]{0,60}") {
        prop_assert_eq!(sanitize_error(&message), message);
    }
}
