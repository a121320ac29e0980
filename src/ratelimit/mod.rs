//! Local rate limiting and header helpers.

mod headers;
mod window;

pub use headers::{
    build_rate_limit_headers, build_rate_limit_key, RateLimitHeaders, LIMIT_HEADER,
    REMAINING_HEADER, RESET_HEADER, RETRY_AFTER_HEADER, UNKNOWN_IP,
};
pub use window::{FixedWindowRateLimiter, RateLimitBucket, RateLimitResult};
