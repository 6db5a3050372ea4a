//! Live listener
//!
//! Subscribes to finalized program logs and processes each mentioned
//! transaction in arrival order. Lost subscriptions are re-established after
//! a fixed backoff.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use eyre::{eyre, Result};
use futures::StreamExt;
use solana_client::nonblocking::pubsub_client::PubsubClient;
use solana_client::rpc_config::{RpcTransactionLogsConfig, RpcTransactionLogsFilter};
use solana_client::rpc_response::RpcLogsResponse;
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::processor::Processor;
use crate::server::{SharedMetrics, SharedStats};

/// How a subscription session ended
enum SessionEnd {
    Shutdown,
    StreamClosed,
}

pub struct Listener {
    ws_url: String,
    program_id: Pubkey,
    processor: Arc<Processor>,
    backoff: Duration,
    stats: SharedStats,
    metrics: SharedMetrics,
}

impl Listener {
    pub fn new(
        ws_url: &str,
        program_id: Pubkey,
        processor: Arc<Processor>,
        backoff: Duration,
        stats: SharedStats,
        metrics: SharedMetrics,
    ) -> Self {
        Self {
            ws_url: ws_url.to_string(),
            program_id,
            processor,
            backoff,
            stats,
            metrics,
        }
    }

    /// Run until shutdown. Failing to open the first subscription is fatal;
    /// later failures reconnect.
    pub async fn run(&self, mut shutdown: mpsc::Receiver<()>) -> Result<()> {
        info!(program = %self.program_id, ws = %self.ws_url, "Starting listener");
        let mut connected_once = false;

        loop {
            match self.session(&mut shutdown, &mut connected_once).await {
                Ok(SessionEnd::Shutdown) => break,
                Ok(SessionEnd::StreamClosed) => warn!("Log subscription closed by server"),
                Err(e) if !connected_once => return Err(e),
                Err(e) => error!(error = %e, "Log subscription failed"),
            }

            self.set_connected(false).await;
            info!(backoff_ms = self.backoff.as_millis() as u64, "Reconnecting listener");

            tokio::select! {
                _ = shutdown.recv() => break,
                _ = tokio::time::sleep(self.backoff) => {}
            }
            self.metrics.listener_reconnects_total.inc();
        }

        self.set_connected(false).await;
        info!("Listener stopped");
        Ok(())
    }

    async fn session(
        &self,
        shutdown: &mut mpsc::Receiver<()>,
        connected_once: &mut bool,
    ) -> Result<SessionEnd> {
        let client = PubsubClient::new(&self.ws_url)
            .await
            .map_err(|e| eyre!("Failed to connect to {}: {}", self.ws_url, e))?;

        let (mut notifications, unsubscribe) = client
            .logs_subscribe(
                RpcTransactionLogsFilter::Mentions(vec![self.program_id.to_string()]),
                RpcTransactionLogsConfig {
                    commitment: Some(CommitmentConfig::finalized()),
                },
            )
            .await
            .map_err(|e| eyre!("Failed to subscribe to program logs: {}", e))?;

        *connected_once = true;
        self.set_connected(true).await;
        info!(program = %self.program_id, "Subscribed to program logs");

        let end = loop {
            tokio::select! {
                _ = shutdown.recv() => break SessionEnd::Shutdown,
                notification = notifications.next() => match notification {
                    Some(response) => self.handle(response.value).await,
                    None => break SessionEnd::StreamClosed,
                },
            }
        };

        unsubscribe().await;
        drop(notifications);
        if let Err(e) = client.shutdown().await {
            debug!(error = %e, "Pubsub client shutdown failed");
        }
        Ok(end)
    }

    async fn handle(&self, logs: RpcLogsResponse) {
        if logs.err.is_some() {
            debug!(signature = %logs.signature, "Skipping failed transaction");
            return;
        }

        let signature = match Signature::from_str(&logs.signature) {
            Ok(signature) => signature,
            Err(e) => {
                warn!(signature = %logs.signature, error = %e, "Unparsable signature in notification");
                return;
            }
        };

        match self.processor.process_signature(&signature).await {
            Ok(count) => debug!(signature = %signature, transfers = count, "Transaction processed"),
            Err(e) => error!(signature = %signature, error = %e, "Failed to process transaction"),
        }
    }

    async fn set_connected(&self, connected: bool) {
        self.stats.write().await.listener_connected = connected;
        self.metrics.listener_connected.set(connected as i64);
    }
}
