//! Remote-first coordination with local fallback.
//!
//! The coordinator asks the remote store first and falls back to a local
//! leaf component whenever the remote answer is missing or unusable. No
//! error ever reaches the caller.
//!
//! # Fallback rules
//! ```text
//! capability Absent        → local, no network call
//! 404                      → mark Absent, local
//! other non-2xx            → local, capability unchanged
//! 2xx with a row           → mark Available, remote answer
//! 2xx without usable row   → mark Available, local
//! transport error          → local
//! ```
//!
//! The two operations treat the local component differently. The rate
//! limiter is only consulted on fallback, so it stays cold while the remote
//! is healthy. The breaker is updated on every event before the remote call,
//! so it is always a warm shadow of recent outcomes.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, trace, warn};

use super::capability::{Capabilities, CapabilityCell};
use super::rows::{first_row, BreakerRow, RateLimitRow};
use super::transport::RpcTransport;
use crate::breaker::{CircuitBreaker, CircuitState};
use crate::error::GuardError;
use crate::ratelimit::{FixedWindowRateLimiter, RateLimitResult};

/// Remote procedure backing shared rate limits.
pub const RATE_LIMIT_PROCEDURE: &str = "sp_check_rate_limit";
/// Remote procedure backing shared circuit breakers.
pub const CIRCUIT_BREAKER_PROCEDURE: &str = "sp_circuit_breaker_record";

/// Outcome reported to a circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BreakerEvent {
    Success,
    Failure,
}

impl BreakerEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            BreakerEvent::Success => "success",
            BreakerEvent::Failure => "failure",
        }
    }
}

impl fmt::Display for BreakerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BreakerEvent {
    type Err = GuardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(BreakerEvent::Success),
            "failure" => Ok(BreakerEvent::Failure),
            other => Err(GuardError::Config(format!(
                "unknown breaker event: {}",
                other
            ))),
        }
    }
}

/// Breaker state after recording an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BreakerStatus {
    pub state: CircuitState,
    pub allows: bool,
}

impl BreakerStatus {
    /// Status of a local breaker, evaluated now.
    pub fn of(breaker: &CircuitBreaker) -> Self {
        let state = breaker.evaluate();
        Self {
            state,
            allows: state.allows_requests(),
        }
    }
}

/// Routes rate limit checks and breaker events to the remote store, with
/// local components as fallback.
pub struct RemoteCoordinator {
    transport: Option<Arc<dyn RpcTransport>>,
    capabilities: Capabilities,
}

impl RemoteCoordinator {
    /// Create a coordinator using the process-wide capability cells.
    pub fn new(transport: Arc<dyn RpcTransport>) -> Self {
        Self::with_capabilities(Some(transport), Capabilities::process_wide())
    }

    /// Create a coordinator that never leaves the process.
    pub fn local_only() -> Self {
        Self::with_capabilities(None, Capabilities::isolated())
    }

    /// Create a coordinator with explicit capability cells.
    pub fn with_capabilities(
        transport: Option<Arc<dyn RpcTransport>>,
        capabilities: Capabilities,
    ) -> Self {
        Self {
            transport,
            capabilities,
        }
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    /// Whether a remote transport is configured at all.
    pub fn has_remote(&self) -> bool {
        self.transport.is_some()
    }

    /// Check a shared rate limit for `key`.
    ///
    /// `fallback` is consulted only when the remote answer is unusable.
    pub async fn check_rate_limit_shared(
        &self,
        key: &str,
        limit: u32,
        window_seconds: u64,
        fallback: &FixedWindowRateLimiter,
    ) -> RateLimitResult {
        let body = json!({
            "p_key": key,
            "p_limit": limit,
            "p_window_seconds": window_seconds,
        });

        match self
            .call_remote::<RateLimitRow>(RATE_LIMIT_PROCEDURE, &self.capabilities.rate_limit, body)
            .await
        {
            Some(row) => {
                trace!(key = %key, allowed = row.allowed, "Shared rate limit answered remotely");
                row.into()
            }
            None => fallback.check(key),
        }
    }

    /// Record `event` for the breaker identified by `key`.
    ///
    /// `fallback` is updated first, whatever happens remotely. The remote
    /// state wins when it answers.
    pub async fn record_circuit_breaker_event(
        &self,
        key: &str,
        event: BreakerEvent,
        fallback: &CircuitBreaker,
    ) -> BreakerStatus {
        match event {
            BreakerEvent::Success => fallback.record_success(),
            BreakerEvent::Failure => fallback.record_failure(),
        }

        let body = json!({
            "p_key": key,
            "p_event": event.as_str(),
        });

        match self
            .call_remote::<BreakerRow>(
                CIRCUIT_BREAKER_PROCEDURE,
                &self.capabilities.circuit_breaker,
                body,
            )
            .await
        {
            Some(row) => BreakerStatus {
                state: row.current_state,
                allows: row.allows_request,
            },
            None => BreakerStatus::of(fallback),
        }
    }

    /// Call `procedure` and decode its first row, or `None` when the local
    /// fallback should answer instead.
    async fn call_remote<T: DeserializeOwned>(
        &self,
        procedure: &str,
        capability: &CapabilityCell,
        body: serde_json::Value,
    ) -> Option<T> {
        let transport = self.transport.as_ref()?;
        if !capability.should_attempt() {
            trace!(procedure = %procedure, "Remote procedure absent, using local fallback");
            return None;
        }

        let reply = match transport.call(procedure, body).await {
            Ok(reply) => reply,
            Err(e) => {
                debug!(procedure = %procedure, error = %e, "Remote call failed, using local fallback");
                return None;
            }
        };

        if reply.is_not_found() {
            if capability.mark_absent() {
                warn!(
                    procedure = %procedure,
                    "Remote procedure not found, switching to local-only mode"
                );
            }
            return None;
        }

        if !reply.is_success() {
            debug!(
                procedure = %procedure,
                status = reply.status,
                "Remote call returned error status, using local fallback"
            );
            return None;
        }

        capability.mark_available();

        match first_row(&reply.body) {
            Ok(Some(row)) => Some(row),
            Ok(None) => {
                debug!(procedure = %procedure, "Remote call returned no rows, using local fallback");
                None
            }
            Err(e) => {
                debug!(procedure = %procedure, error = %e, "Remote row unreadable, using local fallback");
                None
            }
        }
    }
}
