//! # Per-Endpoint Circuit Breaker Registry
//!
//! Integrators typically dispatch against several remote endpoints and want
//! one breaker per endpoint. The registry is an explicit object owned by the
//! integrator and passed by handle, constructed once with a default
//! configuration; there is no process-wide singleton.

use crate::clock::Clock;
use crate::config::{CircuitBreakerConfig, ConfigError};
use crate::resilience::{CircuitBreaker, CircuitState};
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Registry of circuit breakers keyed by endpoint name.
pub struct CircuitBreakerRegistry {
    breakers: DashMap<String, Arc<CircuitBreaker>>,
    default_config: CircuitBreakerConfig,
    clock: Arc<dyn Clock>,
}

impl CircuitBreakerRegistry {
    /// Create a registry whose breakers are built from `default_config`.
    /// The configuration is validated once, here.
    pub fn new(
        default_config: CircuitBreakerConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ConfigError> {
        default_config.validate()?;
        Ok(Self {
            breakers: DashMap::new(),
            default_config,
            clock,
        })
    }

    /// Breaker for the given endpoint, created from the default configuration
    /// on first use.
    pub fn breaker_for(&self, endpoint: &str) -> Arc<CircuitBreaker> {
        self.breakers
            .entry(endpoint.to_string())
            .or_insert_with(|| {
                debug!(endpoint = %endpoint, "creating circuit breaker for endpoint");
                Arc::new(CircuitBreaker::from_validated(
                    endpoint,
                    self.default_config.clone(),
                    self.clock.clone(),
                ))
            })
            .clone()
    }

    /// Register an endpoint with its own configuration, replacing any
    /// existing breaker for that endpoint.
    pub fn insert_with_config(
        &self,
        endpoint: &str,
        config: CircuitBreakerConfig,
    ) -> Result<Arc<CircuitBreaker>, ConfigError> {
        let breaker = Arc::new(CircuitBreaker::new(
            endpoint,
            config,
            self.clock.clone(),
        )?);
        self.breakers.insert(endpoint.to_string(), breaker.clone());
        Ok(breaker)
    }

    /// Current state of every registered breaker.
    pub fn snapshot(&self) -> HashMap<String, CircuitState> {
        self.breakers
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().state()))
            .collect()
    }

    /// Number of registered breakers.
    pub fn len(&self) -> usize {
        self.breakers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.breakers.is_empty()
    }
}
