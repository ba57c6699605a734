//! Cast delivery through the Neynar posting API.
//!
//! One HTTP POST per cast, authenticated with an API key header. Failures
//! are classified: timeouts, connect errors, 429 and 5xx get a bounded retry
//! with backoff; other 4xx are dropped immediately. Nothing here ever fails
//! the process: an undeliverable cast is logged and lost.

use crate::config::FarcasterConfig;
use crate::format::Cast;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

#[derive(Error, Debug)]
pub enum PublishError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },
}

#[derive(Serialize)]
struct CastRequest<'a> {
    text: &'a str,
    signer_uuid: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    embeds: Option<Vec<Embed<'a>>>,
}

#[derive(Serialize)]
struct Embed<'a> {
    url: &'a str,
}

/// HTTP client for the Neynar cast endpoint.
pub struct NeynarClient {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    signer_uuid: String,
    attempts: u32,
}

impl NeynarClient {
    pub fn new(config: &FarcasterConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .build()
            .expect("failed to build HTTP client");
        Self {
            client,
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
            signer_uuid: config.signer_uuid.clone(),
            attempts: config.publish_attempts.max(1),
        }
    }

    /// Whether posting credentials are configured. Without them the publisher
    /// runs in dry-run mode and only logs cast texts.
    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty() && !self.signer_uuid.is_empty()
    }

    /// One POST to the cast endpoint. Non-2xx becomes `PublishError::Api`.
    pub async fn publish(&self, cast: &Cast) -> Result<(), PublishError> {
        let embeds = cast.image_url.as_deref().map(|url| vec![Embed { url }]);
        let body = CastRequest {
            text: &cast.text,
            signer_uuid: &self.signer_uuid,
            embeds,
        };
        let url = format!("{}/v2/farcaster/cast", self.api_url);

        let resp = self
            .client
            .post(&url)
            .header("api_key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = resp.status().as_u16();
        if !(200..300).contains(&status) {
            let body = resp.text().await.unwrap_or_default();
            return Err(PublishError::Api { status, body });
        }
        Ok(())
    }

    /// Deliver with bounded retry. Returns whether the cast went out;
    /// failures are logged, never raised.
    pub async fn publish_with_retry(&self, cast: &Cast) -> bool {
        let mut backoff = Duration::from_secs(1);
        for attempt in 1..=self.attempts {
            match self.publish(cast).await {
                Ok(()) => {
                    info!(attempt, "cast published");
                    return true;
                }
                Err(e) if is_retryable(&e) && attempt < self.attempts => {
                    warn!(
                        attempt,
                        error = %e,
                        backoff_secs = backoff.as_secs(),
                        "publish failed, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                }
                Err(e) => {
                    error!(attempt, error = %e, text = %cast.text, "cast dropped");
                    return false;
                }
            }
        }
        false
    }
}

/// Retryable: the request might succeed later. Other 4xx means the payload
/// itself was rejected and retrying cannot help.
fn is_retryable(err: &PublishError) -> bool {
    match err {
        PublishError::Request(e) => e.is_timeout() || e.is_connect(),
        PublishError::Api { status, .. } => *status == 429 || *status >= 500,
    }
}

/// Drain the bounded cast queue. Each cast is delivered (or dropped) before
/// the next one is taken, so in-flight publishes never pile up.
pub fn spawn_publisher(client: NeynarClient, mut rx: mpsc::Receiver<Cast>) -> JoinHandle<()> {
    tokio::spawn(async move {
        if !client.is_configured() {
            warn!("NEYNAR_API_KEY / SIGNER_UUID not set, casts will be logged instead of posted");
        }
        while let Some(cast) = rx.recv().await {
            if client.is_configured() {
                client.publish_with_retry(&cast).await;
            } else {
                info!(text = %cast.text, "cast (dry-run)");
            }
        }
        debug!("cast queue closed, publisher exiting");
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api_error(status: u16) -> PublishError {
        PublishError::Api {
            status,
            body: String::new(),
        }
    }

    #[test]
    fn test_server_side_failures_are_retryable() {
        assert!(is_retryable(&api_error(500)));
        assert!(is_retryable(&api_error(503)));
        assert!(is_retryable(&api_error(429)));
    }

    #[test]
    fn test_client_side_failures_are_not_retryable() {
        assert!(!is_retryable(&api_error(400)));
        assert!(!is_retryable(&api_error(401)));
        assert!(!is_retryable(&api_error(404)));
    }
}
