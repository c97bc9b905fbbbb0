use std::cmp::min;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, warn};

/// HTTP settings for talking to a `lala.cgi` endpoint.
#[cfg_attr(feature = "config", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Per-request timeout in milliseconds.
    pub timeout_ms: u64,
    /// Number of retries per request after the initial attempt.
    pub retry_count: usize,
    /// Base delay between retries in milliseconds (exponential backoff).
    pub retry_backoff_ms: u64,
    /// Upper bound for retry backoff delay in milliseconds.
    pub retry_max_backoff_ms: u64,
    /// Newer appliances serve HTTPS with a self-signed certificate.
    pub accept_invalid_certs: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 5_000,
            retry_count: 0,
            retry_backoff_ms: 250,
            retry_max_backoff_ms: 2_000,
            accept_invalid_certs: false,
        }
    }
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("http client setup failed: {0}")]
    Build(reqwest::Error),
    #[error("http transport error: {0}")]
    Http(reqwest::Error),
    #[error("request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
    #[error("unexpected http status {0}")]
    Status(u16),
}

/// Posts a request body to the device and hands back the raw response body.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn post(&self, url: &str, body: &str) -> Result<String, ClientError>;
}

#[derive(Debug, Clone)]
pub struct LalaClient {
    config: ClientConfig,
    http: reqwest::Client,
}

impl LalaClient {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()
            .map_err(ClientError::Build)?;
        Ok(Self { config, http })
    }

    async fn post_once(&self, url: &str, body: &str) -> Result<String, ClientError> {
        // the appliance expects the JSON document as a raw form post
        let response = self
            .http
            .post(url)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(body.to_string())
            .send()
            .await
            .map_err(|err| self.classify(err))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Status(status.as_u16()));
        }

        response.text().await.map_err(|err| self.classify(err))
    }

    fn classify(&self, err: reqwest::Error) -> ClientError {
        if err.is_timeout() {
            ClientError::Timeout {
                timeout_ms: self.config.timeout_ms,
            }
        } else {
            ClientError::Http(err)
        }
    }

    fn retry_delay_ms(&self, attempt: usize) -> u64 {
        let base = self.config.retry_backoff_ms.max(1);
        let shift = u32::try_from(attempt).unwrap_or(u32::MAX);
        let factor = 1u64.checked_shl(shift).unwrap_or(u64::MAX);
        let delay = base.saturating_mul(factor);
        let max = self.config.retry_max_backoff_ms.max(base);
        min(delay, max)
    }
}

#[async_trait]
impl Transport for LalaClient {
    async fn post(&self, url: &str, body: &str) -> Result<String, ClientError> {
        let mut attempts = 0usize;

        loop {
            match self.post_once(url, body).await {
                Ok(text) => {
                    debug!(url, bytes = text.len(), "lala request ok");
                    return Ok(text);
                }
                Err(err) => {
                    warn!(url, attempt = attempts, error = %err, "lala request failed");
                    if attempts >= self.config.retry_count {
                        return Err(err);
                    }
                }
            }

            let delay_ms = self.retry_delay_ms(attempts);
            attempts += 1;
            sleep(Duration::from_millis(delay_ms)).await;
        }
    }
}
