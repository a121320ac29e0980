//! Per-key collection of circuit breakers.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use super::circuit::{CircuitBreaker, CircuitBreakerConfig};
use crate::clock::{self, Clock};

/// Hands out one shared breaker per dependency key, creating it on first use.
pub struct BreakerRegistry {
    breakers: DashMap<String, Arc<CircuitBreaker>>,
    config: CircuitBreakerConfig,
    clock: Arc<dyn Clock>,
}

impl BreakerRegistry {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self::with_clock(config, clock::system())
    }

    pub fn with_clock(config: CircuitBreakerConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            breakers: DashMap::new(),
            config,
            clock,
        }
    }

    /// The breaker for `key`.
    pub fn get(&self, key: &str) -> Arc<CircuitBreaker> {
        if let Some(existing) = self.breakers.get(key) {
            return existing.clone();
        }

        self.breakers
            .entry(key.to_owned())
            .or_insert_with(|| {
                debug!(key = %key, "Creating circuit breaker");
                Arc::new(CircuitBreaker::with_clock(self.config, self.clock.clone()))
            })
            .clone()
    }

    /// The breaker for `key`, only if one was already created.
    pub fn existing(&self, key: &str) -> Option<Arc<CircuitBreaker>> {
        self.breakers.get(key).map(|b| b.clone())
    }

    pub fn len(&self) -> usize {
        self.breakers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.breakers.is_empty()
    }
}
