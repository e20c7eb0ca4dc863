//! NerdGraph transport
//!
//! The query layer talks to the API through `NerdGraphTransport` so the
//! orchestrator can be driven by a scripted transport in tests. The real
//! implementation is a thin wrapper over one shared `reqwest::Client`.
//!
//! # Important
//!
//! There are no retries. A request that fails is reported once and the
//! caller decides what that means for the run.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

pub const NERDGRAPH_ENDPOINT: &str = "https://api.newrelic.com/graphql";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Status and body of an HTTP exchange, before any interpretation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawReply {
    pub status: u16,
    pub body: String,
}

impl RawReply {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }
}

/// The request could not be completed (connect, TLS, timeout, body read).
#[derive(Debug, Error)]
#[error("{0}")]
pub struct TransportFailure(pub String);

/// Sends one GraphQL request body and returns the raw reply.
#[async_trait]
pub trait NerdGraphTransport: Send + Sync {
    /// POST `body` with the `API-Key` header set to `api_key`.
    async fn post(&self, api_key: &str, body: &Value) -> std::result::Result<RawReply, TransportFailure>;
}

/// reqwest-backed transport. One client is reused for the whole run.
pub struct HttpTransport {
    http: Client,
    endpoint: String,
}

impl HttpTransport {
    /// Transport for the public US endpoint with the default timeout.
    pub fn new() -> Result<Self> {
        Self::with_options(NERDGRAPH_ENDPOINT, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    pub fn with_options(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("usermig/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http,
            endpoint: endpoint.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl NerdGraphTransport for HttpTransport {
    async fn post(&self, api_key: &str, body: &Value) -> std::result::Result<RawReply, TransportFailure> {
        let response = self
            .http
            .post(&self.endpoint)
            .header("API-Key", api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| TransportFailure(format!("Failed to reach {}: {}", self.endpoint, e)))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| TransportFailure(format!("Failed to read response body: {}", e)))?;

        Ok(RawReply { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_endpoint() {
        let transport = HttpTransport::new().unwrap();
        assert_eq!(transport.endpoint(), "https://api.newrelic.com/graphql");
    }

    #[test]
    fn test_custom_endpoint() {
        let transport =
            HttpTransport::with_options("https://api.eu.newrelic.com/graphql", Duration::from_secs(5))
                .unwrap();
        assert_eq!(transport.endpoint(), "https://api.eu.newrelic.com/graphql");
    }
}
