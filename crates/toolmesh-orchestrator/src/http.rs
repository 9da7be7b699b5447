//! HTTP collaborator
//!
//! POSTs JSON arguments to a service URL. Trace headers from the current
//! [`TraceContext`] are injected on every request; non-success responses
//! and transport failures become raw [`UpstreamError`]s for the mapper.

use crate::invoker::Invoke;
use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::RETRY_AFTER;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::Duration;
use toolmesh_core::error_mapper::parse_retry_after;
use toolmesh_core::{TraceContext, UpstreamError};
use tracing::debug;

/// Default per-request timeout
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// A client-side request failure paired with the timeout it ran under
#[derive(Debug)]
pub(crate) struct TransportError {
    source: reqwest::Error,
    timeout: Duration,
}

impl TransportError {
    pub(crate) fn new(source: reqwest::Error, timeout: Duration) -> Self {
        Self { source, timeout }
    }
}

impl From<TransportError> for UpstreamError {
    fn from(err: TransportError) -> Self {
        let TransportError { source, timeout } = err;
        if source.is_timeout() {
            return UpstreamError::Timeout {
                after: Some(timeout),
            };
        }
        if source.is_builder() {
            return UpstreamError::InvalidArguments(source.to_string());
        }
        // resolver failures surface as connect errors
        let detail = format!("{:?}", source);
        if source.is_connect() && detail.contains("dns error") {
            return UpstreamError::Dns(source.to_string());
        }
        UpstreamError::ConnectionRefused(source.to_string())
    }
}

/// JSON-over-HTTP invoker for one service endpoint
#[derive(Debug, Clone)]
pub struct HttpInvoker {
    url: String,
    client: Client,
    timeout: Duration,
    api_key: Option<String>,
}

impl HttpInvoker {
    /// Invoker posting to `url` with a fresh client
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client: Client::new(),
            timeout: DEFAULT_TIMEOUT,
            api_key: None,
        }
    }

    /// Share a client (and its connection pool) across invokers
    #[must_use]
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    /// Per-request timeout, reported as `UPSTREAM_UNAVAILABLE` when it fires
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Send `Authorization: Bearer <key>`
    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Endpoint URL
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

}

#[async_trait]
impl Invoke for HttpInvoker {
    async fn invoke(&self, args: Value) -> Result<Value, UpstreamError> {
        let mut request = self
            .client
            .post(&self.url)
            .timeout(self.timeout)
            .json(&args);

        if let Some(ctx) = TraceContext::current() {
            for (name, value) in ctx.headers() {
                request = request.header(name, value);
            }
        }
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| TransportError::new(e, self.timeout))?;
        let status = response.status();
        debug!(url = %self.url, status = status.as_u16(), "Upstream responded");

        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| parse_retry_after(v, Utc::now()));
            let body = response.text().await.ok().filter(|b| !b.is_empty());
            return Err(UpstreamError::Http {
                status: status.as_u16(),
                retry_after,
                body,
            });
        }

        if status == StatusCode::NO_CONTENT {
            return Ok(Value::Null);
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TransportError::new(e, self.timeout).into()
                } else {
                    UpstreamError::Internal(format!("invalid JSON from upstream: {}", e))
                }
            })
    }
}
