//! Direct HTTP retrieval of the unrendered page.
//!
//! Not a browser, just a GET. Retries on 5xx and connection errors with
//! exponential backoff, and falls back to HTTP/1.1 when the error looks
//! like a protocol problem. The whole retrieval, retries included, is
//! bounded by `raw_timeout_ms`.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::{CaptureStrategy, Captured};
use crate::config::{CaptureConfig, RetryPolicy};
use crate::types::CaptureError;

/// Raw GET strategy.
#[derive(Clone)]
pub struct RawRetrieval {
    client: reqwest::Client,
    /// HTTP/1.1-only fallback client for sites that reject HTTP/2.
    h1_client: reqwest::Client,
    timeout: Duration,
    retry: RetryPolicy,
}

impl RawRetrieval {
    pub fn new(config: &CaptureConfig) -> Self {
        let timeout = Duration::from_millis(config.raw_timeout_ms);

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(5))
            .user_agent(config.user_agent.as_str())
            .build()
            .unwrap_or_default();

        let h1_client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(5))
            .user_agent(config.user_agent.as_str())
            .http1_only()
            .build()
            .unwrap_or_default();

        Self {
            client,
            h1_client,
            timeout,
            retry: config.raw_retry,
        }
    }

    /// GET `url` and return the body of a 2xx response.
    pub async fn get(&self, url: &str) -> Result<String, CaptureError> {
        match self.get_inner(&self.client, url).await {
            Ok(body) => Ok(body),
            Err(CaptureError::Transport(e)) if looks_like_protocol_error(&e) => {
                debug!(url, error = %e, "retrying over HTTP/1.1");
                self.get_inner(&self.h1_client, url).await
            }
            Err(e) => Err(e),
        }
    }

    async fn get_inner(&self, client: &reqwest::Client, url: &str) -> Result<String, CaptureError> {
        let mut attempt = 1u32;

        loop {
            let retry_allowed = attempt < self.retry.max_attempts;

            match client.get(url).send().await {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_server_error() && retry_allowed {
                        debug!(url, status = status.as_u16(), attempt, "server error, backing off");
                        tokio::time::sleep(self.retry.delay_for(attempt)).await;
                        attempt += 1;
                        continue;
                    }
                    if !status.is_success() {
                        return Err(CaptureError::Status(status.as_u16()));
                    }
                    return Ok(resp.text().await?);
                }
                Err(e) if retry_allowed && !looks_like_protocol_error(&e) => {
                    debug!(url, error = %e, attempt, "request failed, backing off");
                    tokio::time::sleep(self.retry.delay_for(attempt)).await;
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

fn looks_like_protocol_error(e: &reqwest::Error) -> bool {
    let msg = format!("{e:?}");
    msg.contains("http2") || msg.contains("protocol") || msg.contains("connection closed")
}

#[async_trait]
impl CaptureStrategy for RawRetrieval {
    fn name(&self) -> &'static str {
        "raw"
    }

    async fn capture(&self, url: &str) -> Result<Captured, CaptureError> {
        let body = tokio::time::timeout(self.timeout, self.get(url))
            .await
            .map_err(|_| CaptureError::Timeout {
                stage: "raw retrieval",
                after_ms: self.timeout.as_millis() as u64,
            })??;

        Ok(Captured {
            raw_html: Some(body),
            ..Default::default()
        })
    }
}
