//! # Resilience Module
//!
//! Fault-tolerance gates wrapped around the driver submission call: circuit
//! breaking to isolate a failing endpoint, and bulkheading to bound in-flight
//! concurrency. Both are independent; the batcher composes them, bulkhead
//! outside, breaker inside.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use chain_dispatch::clock::SystemClock;
//! use chain_dispatch::config::CircuitBreakerConfig;
//! use chain_dispatch::resilience::CircuitBreaker;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let breaker = CircuitBreaker::new(
//!     "rpc-primary",
//!     CircuitBreakerConfig::default(),
//!     Arc::new(SystemClock),
//! )?;
//!
//! let result = breaker
//!     .call(|| async {
//!         // driver submission here
//!         Ok::<&str, Box<dyn std::error::Error>>("accepted")
//!     })
//!     .await;
//! # let _ = result;
//! # Ok(())
//! # }
//! ```

pub mod bulkhead;
pub mod circuit_breaker;
pub mod registry;

pub use bulkhead::{Bulkhead, BulkheadError, BulkheadStats};
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerError, CircuitState};
pub use registry::CircuitBreakerRegistry;
