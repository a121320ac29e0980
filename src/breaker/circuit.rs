//! In-memory circuit breaker.
//!
//! # State transitions
//! ```text
//! Closed    → Open:     failure_threshold consecutive failures
//! Open      → HalfOpen: open_timeout elapsed, applied by evaluate()
//! HalfOpen  → Closed:   success_threshold consecutive successes
//! HalfOpen  → Open:     failure_threshold failures while probing
//! ```
//!
//! The open → half-open move is lazy. Nothing runs in the background; the
//! transition happens in [`CircuitBreaker::evaluate`], which every
//! state-dependent operation calls first.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::state::CircuitState;
use crate::clock::{self, Clock};

/// Thresholds for a circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that open the circuit
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// Consecutive half-open successes that close the circuit
    #[serde(default = "default_success_threshold")]
    pub success_threshold: u32,

    /// How long the circuit stays open before probing, in milliseconds
    #[serde(default = "default_open_timeout_ms")]
    pub open_timeout_ms: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            success_threshold: default_success_threshold(),
            open_timeout_ms: default_open_timeout_ms(),
        }
    }
}

fn default_failure_threshold() -> u32 {
    5
}

fn default_success_threshold() -> u32 {
    2
}

fn default_open_timeout_ms() -> u64 {
    30_000
}

/// Point-in-time view of a breaker's internals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BreakerSnapshot {
    /// State as stored, before any timeout evaluation
    pub state: CircuitState,
    /// Consecutive failures counted in the current state
    pub failure_count: u32,
    /// Consecutive half-open successes
    pub success_count: u32,
    /// When the circuit last opened, if it has not been reset since
    pub opened_at: Option<DateTime<Utc>>,
}

#[derive(Debug)]
struct Inner {
    state: CircuitState,
    failure_count: u32,
    success_count: u32,
    opened_at: Option<DateTime<Utc>>,
}

impl Inner {
    fn closed() -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            success_count: 0,
            opened_at: None,
        }
    }

    /// Move to `to`, clearing both counters.
    fn transition(&mut self, to: CircuitState) {
        self.state = to;
        self.failure_count = 0;
        self.success_count = 0;
    }
}

/// A three-state circuit breaker guarding one dependency.
pub struct CircuitBreaker {
    inner: Mutex<Inner>,
    config: CircuitBreakerConfig,
    clock: Arc<dyn Clock>,
}

impl CircuitBreaker {
    /// Create a breaker with the given thresholds.
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self::with_clock(config, clock::system())
    }

    /// Create a breaker that reads time from `clock`.
    pub fn with_clock(config: CircuitBreakerConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Mutex::new(Inner::closed()),
            config,
            clock,
        }
    }

    /// Apply the timeout-based open → half-open transition and return the
    /// resulting state.
    pub fn evaluate(&self) -> CircuitState {
        let mut inner = self.inner.lock();
        self.evaluate_locked(&mut inner)
    }

    /// Current state, after evaluation.
    pub fn state(&self) -> CircuitState {
        self.evaluate()
    }

    /// Whether a request may be attempted right now.
    pub fn allow_request(&self) -> bool {
        self.evaluate().allows_requests()
    }

    /// Record a successful call.
    ///
    /// While half-open this counts towards closing the circuit. Otherwise it
    /// forgives any failure streak without changing state.
    pub fn record_success(&self) {
        let mut inner = self.inner.lock();
        match self.evaluate_locked(&mut inner) {
            CircuitState::HalfOpen => {
                inner.success_count += 1;
                if inner.success_count >= self.config.success_threshold {
                    info!(
                        successes = inner.success_count,
                        "Circuit breaker closing after successful probes"
                    );
                    *inner = Inner::closed();
                }
            }
            _ => inner.failure_count = 0,
        }
    }

    /// Record a failed call. Ignored while the circuit is open.
    pub fn record_failure(&self) {
        let mut inner = self.inner.lock();
        if self.evaluate_locked(&mut inner) == CircuitState::Open {
            return;
        }

        inner.failure_count += 1;
        if inner.failure_count >= self.config.failure_threshold {
            info!(
                failures = inner.failure_count,
                from = %inner.state,
                "Circuit breaker opening"
            );
            inner.transition(CircuitState::Open);
            inner.opened_at = Some(self.clock.now());
        }
    }

    /// Force the breaker closed and clear all counters.
    pub fn reset(&self) {
        *self.inner.lock() = Inner::closed();
    }

    /// Counters and state as they are stored, without evaluating the timeout.
    pub fn snapshot(&self) -> BreakerSnapshot {
        let inner = self.inner.lock();
        BreakerSnapshot {
            state: inner.state,
            failure_count: inner.failure_count,
            success_count: inner.success_count,
            opened_at: inner.opened_at,
        }
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    fn evaluate_locked(&self, inner: &mut Inner) -> CircuitState {
        if inner.state == CircuitState::Open {
            if let Some(opened_at) = inner.opened_at {
                let elapsed = self.clock.now() - opened_at;
                let timeout_ms = i64::try_from(self.config.open_timeout_ms).unwrap_or(i64::MAX);
                if elapsed.num_milliseconds() >= timeout_ms {
                    debug!(
                        elapsed_ms = elapsed.num_milliseconds(),
                        "Circuit breaker entering half-open"
                    );
                    inner.transition(CircuitState::HalfOpen);
                }
            }
        }
        inner.state
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}
