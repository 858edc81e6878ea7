//! JSON-over-HTTP calls to external services with retry and backoff.
//!
//! Shared by the embedding and generation providers:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use std::time::Duration;

use serde_json::Value;
use tracing::debug;

use crate::error::ServiceError;

pub fn build_client(service: &'static str, timeout_secs: u64) -> Result<reqwest::Client, ServiceError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| ServiceError::Unavailable {
            service,
            reason: format!("cannot build HTTP client: {}", e),
        })
}

pub fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(1 << (attempt.saturating_sub(1)).min(5))
}

pub async fn post_json(
    client: &reqwest::Client,
    service: &'static str,
    url: &str,
    bearer: Option<&str>,
    body: &Value,
    max_retries: u32,
) -> Result<Value, ServiceError> {
    let mut last_err = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            let delay = backoff_delay(attempt);
            debug!(service, attempt, delay_secs = delay.as_secs(), "retrying request");
            tokio::time::sleep(delay).await;
        }

        let mut request = client
            .post(url)
            .header("Content-Type", "application/json")
            .json(body);
        if let Some(key) = bearer {
            request = request.header("Authorization", format!("Bearer {}", key));
        }

        match request.send().await {
            Ok(response) => {
                let status = response.status();

                if status.is_success() {
                    return response
                        .json::<Value>()
                        .await
                        .map_err(|e| ServiceError::InvalidResponse {
                            service,
                            reason: e.to_string(),
                        });
                }

                let body_text = response.text().await.unwrap_or_default();
                let err = ServiceError::Api {
                    service,
                    status: status.as_u16(),
                    body: body_text,
                };

                // Rate limited or server error: retry
                if status.as_u16() == 429 || status.is_server_error() {
                    last_err = Some(err);
                    continue;
                }

                return Err(err);
            }
            Err(e) => {
                last_err = Some(ServiceError::Transport {
                    service,
                    message: e.to_string(),
                });
                continue;
            }
        }
    }

    Err(last_err.unwrap_or_else(|| ServiceError::Transport {
        service,
        message: "request failed after retries".to_string(),
    }))
}
