//! HTTP transport used by the upstream clients.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{RatesError, RatesResult};

/// Raw upstream response.
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: u16,
    pub body: String,
}

impl UpstreamResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Whether the status is 2xx.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Turn a non-success status into [`RatesError::UpstreamUnavailable`].
    pub fn ensure_success(self, provider: &'static str) -> RatesResult<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(RatesError::UpstreamUnavailable {
                provider,
                status: Some(self.status),
                message: format!("HTTP status {}", self.status),
            })
        }
    }

    /// Decode the body as JSON.
    pub fn json<T: DeserializeOwned>(&self, provider: &'static str) -> RatesResult<T> {
        serde_json::from_str(&self.body).map_err(|e| RatesError::malformed(provider, e))
    }
}

/// Issues GET requests on behalf of the upstream clients.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Fetch `url`. Network failures map to [`RatesError::UpstreamUnavailable`];
    /// HTTP error statuses are returned as responses.
    async fn get(&self, provider: &'static str, url: &str) -> RatesResult<UpstreamResponse>;
}

/// [`Transport`] backed by a shared reqwest client.
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Create a transport with the given per-request timeout.
    pub fn new(timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self { client }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, provider: &'static str, url: &str) -> RatesResult<UpstreamResponse> {
        let unavailable = |e: reqwest::Error| RatesError::UpstreamUnavailable {
            provider,
            status: e.status().map(|s| s.as_u16()),
            message: e.without_url().to_string(),
        };

        let response = self.client.get(url).send().await.map_err(unavailable)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(unavailable)?;

        debug!(provider, status, bytes = body.len(), "Upstream responded");

        Ok(UpstreamResponse::new(status, body))
    }
}
