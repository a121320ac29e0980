//! Rate limit key composition and response header construction.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::window::RateLimitResult;

/// Sentinel used by upstream proxies when the client address is not known.
pub const UNKNOWN_IP: &str = "unknown";

pub const LIMIT_HEADER: &str = "X-RateLimit-Limit";
pub const REMAINING_HEADER: &str = "X-RateLimit-Remaining";
pub const RESET_HEADER: &str = "X-RateLimit-Reset";
pub const RETRY_AFTER_HEADER: &str = "Retry-After";

/// Compose the identity a request is rate limited under.
///
/// The most specific identity wins: user and address together, then the
/// user alone, then the address (or `unknown`) for anonymous traffic.
/// Empty strings count as absent.
pub fn build_rate_limit_key(user_id: Option<&str>, client_ip: Option<&str>) -> String {
    let user_id = user_id.filter(|u| !u.is_empty());
    let client_ip = client_ip.filter(|ip| !ip.is_empty());

    match (user_id, client_ip) {
        (Some(user), Some(ip)) if ip != UNKNOWN_IP => format!("user:{}:ip:{}", user, ip),
        (Some(user), _) => format!("user:{}", user),
        (None, ip) => format!("ip:{}", ip.unwrap_or(UNKNOWN_IP)),
    }
}

/// Header values describing a rate limit decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RateLimitHeaders {
    pub limit: u32,
    pub remaining: u32,
    /// Seconds until the window resets
    pub reset: u64,
    /// Present only for rejected requests
    pub retry_after: Option<u64>,
}

impl RateLimitHeaders {
    /// Header name/value pairs in emission order.
    pub fn pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            (LIMIT_HEADER, self.limit.to_string()),
            (REMAINING_HEADER, self.remaining.to_string()),
            (RESET_HEADER, self.reset.to_string()),
        ];
        if let Some(retry_after) = self.retry_after {
            pairs.push((RETRY_AFTER_HEADER, retry_after.to_string()));
        }
        pairs
    }
}

/// Build the headers for `result` as seen at `now`.
///
/// The reset delta is whole seconds rounded up and never negative.
pub fn build_rate_limit_headers(
    result: &RateLimitResult,
    limit: u32,
    now: DateTime<Utc>,
) -> RateLimitHeaders {
    let delta_ms = (result.reset_at - now).num_milliseconds().max(0) as u64;
    let reset = delta_ms.div_ceil(1000);

    RateLimitHeaders {
        limit,
        remaining: result.remaining,
        reset,
        retry_after: (!result.allowed).then_some(reset),
    }
}
