//! Outbound submission of transfer claims and votes
//!
//! Signing and delivery belong to the broadcaster service; the saver only
//! hands it messages.

use std::time::Duration;

use async_trait::async_trait;
use eyre::{Result, WrapErr};
use reqwest::Client;
use serde::Serialize;
use tracing::debug;

use crate::error::{BridgeError, BridgeResult};
use crate::types::TransferCreationRequest;

#[async_trait]
pub trait Broadcaster: Send + Sync {
    async fn send(&self, request: TransferCreationRequest) -> BridgeResult<()>;

    async fn send_vote(&self, operation: &str, accepted: bool) -> BridgeResult<()>;
}

#[derive(Debug, Serialize)]
struct VoteRequest<'a> {
    operation: &'a str,
    accepted: bool,
}

/// Posts messages as JSON to the broadcaster service
pub struct HttpBroadcaster {
    base_url: String,
    client: Client,
}

impl HttpBroadcaster {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .wrap_err("Failed to create HTTP client")?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    async fn post<T: Serialize + Sync>(&self, path: &str, body: &T) -> BridgeResult<()> {
        let url = format!("{}/{}", self.base_url, path);
        let response = self.client.post(&url).json(body).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(BridgeError::Transport(format!(
                "broadcaster rejected {}: {} - {}",
                path,
                status,
                response.text().await.unwrap_or_default()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl Broadcaster for HttpBroadcaster {
    async fn send(&self, request: TransferCreationRequest) -> BridgeResult<()> {
        debug!(tx = %request.tx, event_id = %request.event_id, "Broadcasting transfer");
        self.post("transfers", &request).await
    }

    async fn send_vote(&self, operation: &str, accepted: bool) -> BridgeResult<()> {
        debug!(operation = %operation, accepted, "Broadcasting vote");
        self.post("votes", &VoteRequest { operation, accepted })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_silent_broadcaster_times_out() {
        // Accepts connections and never answers
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let broadcaster =
            HttpBroadcaster::new(&format!("http://{}/", addr), Duration::from_millis(200)).unwrap();
        assert_eq!(broadcaster.base_url, format!("http://{}", addr));

        let result = tokio::time::timeout(
            Duration::from_secs(5),
            broadcaster.send_vote("op-1", true),
        )
        .await;

        assert!(matches!(result, Ok(Err(BridgeError::Transport(_)))));
    }
}
