//! Minimarket Guard - shared rate limiting and circuit breaking
//!
//! This crate guards the minimarket backend's request handlers. Rate limits
//! and circuit breaker state live in hosted database procedures so every
//! instance sees the same numbers; when those procedures are missing or
//! failing, in-process fallbacks take over without surfacing errors.

pub mod breaker;
pub mod clock;
pub mod config;
pub mod error;
pub mod guard;
pub mod ratelimit;
pub mod remote;

pub use breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use guard::{Admission, ApiGuard};
pub use ratelimit::{FixedWindowRateLimiter, RateLimitResult};
pub use remote::{BreakerEvent, BreakerStatus, RemoteCoordinator};
