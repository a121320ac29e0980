//! Fixed window rate limiter kept entirely in local memory.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::clock::{self, Clock};

/// Per-key window state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitBucket {
    /// Requests seen in the current window
    pub count: u32,
    /// When the current window ends
    pub reset_at: DateTime<Utc>,
}

/// Outcome of a single rate limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitResult {
    /// Whether the request is admitted
    pub allowed: bool,
    /// Requests left in the current window
    pub remaining: u32,
    /// When the current window ends
    pub reset_at: DateTime<Utc>,
}

/// Admits up to `max` requests per key in each fixed window.
///
/// Buckets are created lazily on the first check for a key and overwritten
/// once their window has passed. The map is sharded, so checks for
/// different keys do not contend.
pub struct FixedWindowRateLimiter {
    buckets: DashMap<String, RateLimitBucket>,
    max: u32,
    window: chrono::Duration,
    clock: Arc<dyn Clock>,
}

impl FixedWindowRateLimiter {
    /// Create a limiter admitting `max` requests per `window`.
    pub fn new(max: u32, window: Duration) -> Self {
        Self::with_clock(max, window, clock::system())
    }

    /// Create a limiter that reads time from `clock`.
    pub fn with_clock(max: u32, window: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            buckets: DashMap::new(),
            max,
            window: chrono::Duration::from_std(window).unwrap_or(chrono::Duration::MAX),
            clock,
        }
    }

    /// Admit or reject one request for `key`.
    pub fn check(&self, key: &str) -> RateLimitResult {
        let now = self.clock.now();

        // A missing bucket is treated as one that expired right now.
        let mut bucket = self
            .buckets
            .entry(key.to_owned())
            .or_insert(RateLimitBucket {
                count: 0,
                reset_at: now,
            });

        if now >= bucket.reset_at {
            *bucket = RateLimitBucket {
                count: 1,
                reset_at: now
                    .checked_add_signed(self.window)
                    .unwrap_or(DateTime::<Utc>::MAX_UTC),
            };
            trace!(key = %key, reset_at = %bucket.reset_at, "Starting new rate limit window");
            return RateLimitResult {
                allowed: true,
                remaining: self.max.saturating_sub(1),
                reset_at: bucket.reset_at,
            };
        }

        if bucket.count >= self.max {
            trace!(key = %key, count = bucket.count, "Rate limit exceeded");
            return RateLimitResult {
                allowed: false,
                remaining: 0,
                reset_at: bucket.reset_at,
            };
        }

        bucket.count += 1;
        RateLimitResult {
            allowed: true,
            remaining: self.max - bucket.count,
            reset_at: bucket.reset_at,
        }
    }

    /// The configured number of requests per window.
    pub fn limit(&self) -> u32 {
        self.max
    }

    /// The configured window length.
    pub fn window(&self) -> chrono::Duration {
        self.window
    }

    /// Current bucket for `key`, if one exists.
    pub fn bucket(&self, key: &str) -> Option<RateLimitBucket> {
        self.buckets.get(key).map(|b| *b)
    }

    /// Drop every bucket whose window has already ended.
    ///
    /// Returns the number of buckets removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let before = self.buckets.len();
        self.buckets.retain(|_, bucket| now < bucket.reset_at);
        before.saturating_sub(self.buckets.len())
    }

    /// Clear all buckets.
    pub fn clear(&self) {
        self.buckets.clear();
    }

    /// Get the number of tracked buckets.
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }
}
