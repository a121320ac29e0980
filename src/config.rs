//! Configuration management for minimarket-guard.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::breaker::CircuitBreakerConfig;
use crate::error::{GuardError, Result};

/// Prefix for environment overrides, e.g. `MINIMARKET_GUARD__REMOTE__SERVICE_KEY`.
pub const ENV_PREFIX: &str = "MINIMARKET_GUARD";

/// Longest accepted rate limit window, one year.
pub const MAX_WINDOW_SECONDS: u64 = 365 * 24 * 60 * 60;

/// Main configuration for the guard.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GuardConfig {
    /// Remote procedure endpoint
    #[serde(default)]
    pub remote: RemoteConfig,

    /// Local rate limiting configuration
    #[serde(default)]
    pub rate_limit: RateLimitSettings,

    /// Circuit breaker thresholds
    #[serde(default)]
    pub circuit_breaker: CircuitBreakerConfig,
}

/// Where the remote procedures live and how to authenticate.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Base URL of the hosted project; unset means local-only
    #[serde(default)]
    pub endpoint_base: Option<String>,

    /// Service credential sent as `apikey` and bearer token
    #[serde(default)]
    pub service_key: Option<String>,

    /// Per-request timeout in milliseconds; unset means none
    #[serde(default)]
    pub request_timeout_ms: Option<u64>,
}

/// Limits applied per rate limit key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitSettings {
    /// Requests allowed per window
    #[serde(default = "default_max_requests")]
    pub max_requests: u32,

    /// Window length in seconds
    #[serde(default = "default_window_seconds")]
    pub window_seconds: u64,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            max_requests: default_max_requests(),
            window_seconds: default_window_seconds(),
        }
    }
}

impl RateLimitSettings {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_seconds)
    }
}

fn default_max_requests() -> u32 {
    60
}

fn default_window_seconds() -> u64 {
    60
}

impl GuardConfig {
    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: GuardConfig = serde_yaml::from_str(yaml)
            .map_err(|e| GuardError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from an optional YAML file, then apply
    /// `MINIMARKET_GUARD__*` environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = ::config::Config::builder();

        if let Some(path) = path {
            info!(path = %path.display(), "Loading configuration file");
            builder = builder.add_source(
                ::config::File::from(path).format(::config::FileFormat::Yaml),
            );
        }

        let config: GuardConfig = builder
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Semantic checks that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.rate_limit.max_requests == 0 {
            return Err(GuardError::Config(
                "rate_limit.max_requests must be positive".to_string(),
            ));
        }
        if self.rate_limit.window_seconds == 0 {
            return Err(GuardError::Config(
                "rate_limit.window_seconds must be positive".to_string(),
            ));
        }
        if self.rate_limit.window_seconds > MAX_WINDOW_SECONDS {
            return Err(GuardError::Config(format!(
                "rate_limit.window_seconds must be at most {}",
                MAX_WINDOW_SECONDS
            )));
        }

        let cb = &self.circuit_breaker;
        if cb.failure_threshold == 0 || cb.success_threshold == 0 {
            return Err(GuardError::Config(
                "circuit_breaker thresholds must be positive".to_string(),
            ));
        }

        if let Some(base) = &self.remote.endpoint_base {
            let url = url::Url::parse(base).map_err(|e| {
                GuardError::Config(format!("remote.endpoint_base is not a valid URL: {}", e))
            })?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err(GuardError::Config(format!(
                    "remote.endpoint_base must be http or https, got {}",
                    url.scheme()
                )));
            }
        }

        Ok(())
    }
}
