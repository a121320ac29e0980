//! Transport for calling PostgREST-style remote procedures.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use tracing::trace;
use url::Url;

use crate::config::RemoteConfig;
use crate::error::{GuardError, Result};

/// Raw answer from a remote procedure call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcReply {
    pub status: u16,
    pub body: String,
}

impl RpcReply {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_not_found(&self) -> bool {
        self.status == 404
    }
}

/// Something that can invoke a named remote procedure with a JSON body.
///
/// Any status code is a successful call at this level; `Err` means the
/// request itself did not complete.
#[async_trait]
pub trait RpcTransport: Send + Sync {
    async fn call(&self, procedure: &str, body: serde_json::Value) -> Result<RpcReply>;
}

/// [`RpcTransport`] over HTTP, posting to `<base>/rest/v1/rpc/<procedure>`.
pub struct HttpRpcTransport {
    client: reqwest::Client,
    base: Url,
}

impl HttpRpcTransport {
    /// Create a transport for `endpoint_base`, authenticating with
    /// `service_key` when given.
    pub fn new(
        endpoint_base: &str,
        service_key: Option<&str>,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        let mut base = Url::parse(endpoint_base)
            .map_err(|e| GuardError::Config(format!("invalid endpoint base: {}", e)))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(key) = service_key {
            let apikey = HeaderValue::from_str(key)
                .map_err(|e| GuardError::Config(format!("invalid service key: {}", e)))?;
            let bearer = HeaderValue::from_str(&format!("Bearer {}", key))
                .map_err(|e| GuardError::Config(format!("invalid service key: {}", e)))?;
            headers.insert("apikey", apikey);
            headers.insert(AUTHORIZATION, bearer);
        }

        let mut builder = reqwest::Client::builder().default_headers(headers);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            base,
        })
    }

    /// Build a transport from configuration, or `None` when no endpoint is set.
    pub fn from_config(config: &RemoteConfig) -> Result<Option<Self>> {
        let Some(base) = config.endpoint_base.as_deref() else {
            return Ok(None);
        };
        Self::new(
            base,
            config.service_key.as_deref(),
            config.request_timeout_ms.map(Duration::from_millis),
        )
        .map(Some)
    }

    /// Full URL for a procedure.
    pub fn procedure_url(&self, procedure: &str) -> Result<Url> {
        self.base
            .join(&format!("rest/v1/rpc/{}", procedure))
            .map_err(|e| GuardError::Config(format!("invalid procedure url: {}", e)))
    }
}

#[async_trait]
impl RpcTransport for HttpRpcTransport {
    async fn call(&self, procedure: &str, body: serde_json::Value) -> Result<RpcReply> {
        let url = self.procedure_url(procedure)?;
        trace!(url = %url, "Calling remote procedure");

        let response = self.client.post(url).json(&body).send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;

        Ok(RpcReply { status, body })
    }
}
