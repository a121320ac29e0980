//! Decoding of remote procedure result rows.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::breaker::CircuitState;
use crate::error::{GuardError, Result};
use crate::ratelimit::RateLimitResult;

/// Row returned by `sp_check_rate_limit`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RateLimitRow {
    pub allowed: bool,
    pub remaining: i64,
    pub reset_at: DateTime<Utc>,
}

impl From<RateLimitRow> for RateLimitResult {
    fn from(row: RateLimitRow) -> Self {
        RateLimitResult {
            allowed: row.allowed,
            remaining: row.remaining.clamp(0, u32::MAX as i64) as u32,
            reset_at: row.reset_at,
        }
    }
}

/// Row returned by `sp_circuit_breaker_record`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BreakerRow {
    pub current_state: CircuitState,
    pub allows_request: bool,
}

/// Decode the first row of a procedure result.
///
/// Set-returning procedures answer with an array, scalar ones with a bare
/// object; both are accepted. An empty array or `null` yields `None`.
pub fn first_row<T: DeserializeOwned>(body: &str) -> Result<Option<T>> {
    let value: serde_json::Value = serde_json::from_str(body)?;
    let row = match value {
        serde_json::Value::Array(rows) => rows.into_iter().next(),
        serde_json::Value::Null => None,
        object @ serde_json::Value::Object(_) => Some(object),
        other => {
            return Err(GuardError::Remote(format!(
                "expected row or array of rows, got {}",
                other
            )))
        }
    };

    match row {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(row) => Ok(Some(serde_json::from_value(row)?)),
    }
}
