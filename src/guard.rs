//! Request guard combining shared rate limits and circuit breakers.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use crate::breaker::BreakerRegistry;
use crate::clock::{self, Clock};
use crate::config::GuardConfig;
use crate::error::Result;
use crate::ratelimit::{
    build_rate_limit_headers, build_rate_limit_key, FixedWindowRateLimiter, RateLimitHeaders,
    RateLimitResult,
};
use crate::remote::{BreakerEvent, BreakerStatus, HttpRpcTransport, RemoteCoordinator};

/// Result of admitting one request.
#[derive(Debug, Clone, Serialize)]
pub struct Admission {
    pub key: String,
    pub result: RateLimitResult,
    pub headers: RateLimitHeaders,
}

/// Front door for request handlers.
///
/// Owns the local fallback limiter and breaker registry and routes every
/// decision through a [`RemoteCoordinator`].
pub struct ApiGuard {
    coordinator: RemoteCoordinator,
    limiter: FixedWindowRateLimiter,
    breakers: BreakerRegistry,
    window_seconds: u64,
    clock: Arc<dyn Clock>,
}

impl ApiGuard {
    /// Build a guard from configuration, talking to the configured remote
    /// endpoint if there is one.
    pub fn from_config(config: &GuardConfig) -> Result<Self> {
        let coordinator = match HttpRpcTransport::from_config(&config.remote)? {
            Some(transport) => {
                info!(
                    endpoint = config.remote.endpoint_base.as_deref().unwrap_or_default(),
                    "Remote coordination enabled"
                );
                RemoteCoordinator::new(Arc::new(transport))
            }
            None => {
                info!("No remote endpoint configured, running local-only");
                RemoteCoordinator::local_only()
            }
        };
        Ok(Self::new(config, coordinator, clock::system()))
    }

    /// Build a guard around an existing coordinator.
    pub fn new(config: &GuardConfig, coordinator: RemoteCoordinator, clock: Arc<dyn Clock>) -> Self {
        Self {
            coordinator,
            limiter: FixedWindowRateLimiter::with_clock(
                config.rate_limit.max_requests,
                config.rate_limit.window(),
                clock.clone(),
            ),
            breakers: BreakerRegistry::with_clock(config.circuit_breaker, clock.clone()),
            window_seconds: config.rate_limit.window_seconds,
            clock,
        }
    }

    /// Rate limit a request from `user_id` at `client_ip`.
    pub async fn check(&self, user_id: Option<&str>, client_ip: Option<&str>) -> Admission {
        let key = build_rate_limit_key(user_id, client_ip);
        let limit = self.limiter.limit();

        let result = self
            .coordinator
            .check_rate_limit_shared(&key, limit, self.window_seconds, &self.limiter)
            .await;
        let headers = build_rate_limit_headers(&result, limit, self.clock.now());

        if !result.allowed {
            debug!(key = %key, retry_after = ?headers.retry_after, "Request rate limited");
        }

        Admission {
            key,
            result,
            headers,
        }
    }

    /// Record the outcome of a call to the dependency named `key`.
    pub async fn record(&self, key: &str, event: BreakerEvent) -> BreakerStatus {
        let breaker = self.breakers.get(key);
        self.coordinator
            .record_circuit_breaker_event(key, event, &breaker)
            .await
    }

    /// Whether calls to `key` may go ahead, according to the local shadow.
    pub fn allows(&self, key: &str) -> bool {
        self.breakers
            .existing(key)
            .map_or(true, |breaker| breaker.allow_request())
    }

    pub fn coordinator(&self) -> &RemoteCoordinator {
        &self.coordinator
    }

    pub fn limiter(&self) -> &FixedWindowRateLimiter {
        &self.limiter
    }

    pub fn breakers(&self) -> &BreakerRegistry {
        &self.breakers
    }
}
