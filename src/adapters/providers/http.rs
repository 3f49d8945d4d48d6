//! Quote HTTP Client - Concurrency-limited JSON GET client
//!
//! Wraps reqwest with a request timeout and a concurrency cap shared by
//! every provider adapter. Errors are mapped straight into the
//! `ProviderError` taxonomy; there are no retries here because the
//! feed's fallback chain is the retry policy.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;
use serde::de::DeserializeOwned;
use tokio::sync::Semaphore;
use tracing::debug;

use crate::ports::quote_source::ProviderError;

/// Configuration for the quote HTTP client.
#[derive(Debug, Clone)]
pub struct QuoteHttpConfig {
    /// Per-request timeout.
    pub timeout: Duration,
    /// Maximum concurrent in-flight requests.
    pub max_concurrent: usize,
}

impl Default for QuoteHttpConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(8),
            max_concurrent: 8,
        }
    }
}

/// Shared HTTP client for provider adapters.
#[derive(Debug, Clone)]
pub struct QuoteHttpClient {
    /// Underlying HTTP client.
    http: Client,
    /// Concurrency limiter.
    semaphore: Arc<Semaphore>,
}

impl QuoteHttpClient {
    /// Create a new client.
    pub fn new(config: &QuoteHttpConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .pool_max_idle_per_host(4)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            semaphore: Arc::new(Semaphore::new(config.max_concurrent.max(1))),
        })
    }

    /// GET `url` with `headers` and decode the JSON body into `T`.
    ///
    /// Network errors, timeouts and non-2xx statuses become
    /// `Transport`; an undecodable body becomes `SchemaViolation`.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        headers: &[(&str, &str)],
    ) -> Result<T, ProviderError> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|e| ProviderError::Transport(format!("client closed: {e}")))?;

        let mut request = self.http.get(url).header("Accept", "application/json");
        for (name, value) in headers {
            request = request.header(*name, *value);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        let status = response.status();
        debug!(url = %strip_query(url), status = status.as_u16(), "Quote response");
        if !status.is_success() {
            return Err(ProviderError::Transport(format!("HTTP {status}")));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        serde_json::from_slice(&body)
            .map_err(|e| ProviderError::SchemaViolation(format!("malformed JSON: {e}")))
    }
}

/// URL without its query string, for logs.
fn strip_query(url: &str) -> &str {
    url.split('?').next().unwrap_or(url)
}
