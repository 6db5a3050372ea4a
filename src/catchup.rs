//! Catchup scanner
//!
//! Walks the program's signature history backwards from the newest
//! transaction to the configured start signature, processing every
//! transaction on the way. Page failures abort the run; the supervising loop
//! restarts it after a fixed backoff.

use std::sync::Arc;
use std::time::Duration;

use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::chain::ChainClient;
use crate::error::BridgeResult;
use crate::processor::Processor;
use crate::server::{SharedMetrics, SharedStats};

/// Result of one history page
#[derive(Debug, Clone, PartialEq, Eq)]
enum PageOutcome {
    /// The start signature was processed
    Reached,
    /// History ran out before the start signature
    Exhausted,
    /// Continue before this signature
    Continue(Signature),
}

pub struct CatchupScanner {
    program_id: Pubkey,
    from_tx: Option<Signature>,
    chain: Arc<dyn ChainClient>,
    processor: Arc<Processor>,
    stats: SharedStats,
    metrics: SharedMetrics,
}

impl CatchupScanner {
    /// `from_tx == None` disables the scanner
    pub fn new(
        program_id: Pubkey,
        from_tx: Option<Signature>,
        chain: Arc<dyn ChainClient>,
        processor: Arc<Processor>,
        stats: SharedStats,
        metrics: SharedMetrics,
    ) -> Self {
        Self {
            program_id,
            from_tx,
            chain,
            processor,
            stats,
            metrics,
        }
    }

    /// One full pass from the newest signature down to `from_tx`
    pub async fn catchup(&self) -> BridgeResult<()> {
        let Some(from_tx) = self.from_tx else {
            info!("Catchup disabled");
            self.stats.write().await.catchup_complete = true;
            return Ok(());
        };

        info!(from_tx = %from_tx, "Starting catchup");
        let mut before = None;
        loop {
            match self.catchup_page(before, &from_tx).await? {
                PageOutcome::Reached => break,
                PageOutcome::Exhausted => {
                    warn!(from_tx = %from_tx, "History exhausted before start signature");
                    break;
                }
                PageOutcome::Continue(last) => before = Some(last),
            }
        }

        self.stats.write().await.catchup_complete = true;
        info!("Catchup finished");
        Ok(())
    }

    async fn catchup_page(
        &self,
        before: Option<Signature>,
        from_tx: &Signature,
    ) -> BridgeResult<PageOutcome> {
        info!(before = ?before.map(|s| s.to_string()), "Catchupping history");
        let signatures = self.chain.list_signatures(&self.program_id, before).await?;

        let Some(last) = signatures.last().map(|s| s.signature) else {
            return Ok(PageOutcome::Exhausted);
        };

        for info in &signatures {
            self.metrics.catchup_signatures_total.inc();

            if info.failed {
                debug!(signature = %info.signature, "Skipping failed transaction");
            } else {
                debug!(signature = %info.signature, "Checking tx");
                match self.processor.process_signature(&info.signature).await {
                    Ok(_) => {}
                    Err(e) if e.is_rejection() => {
                        error!(signature = %info.signature, error = %e, "Failed to process transaction")
                    }
                    Err(e) => return Err(e),
                }
            }

            if info.signature == *from_tx {
                return Ok(PageOutcome::Reached);
            }
        }

        Ok(PageOutcome::Continue(last))
    }

    /// Retry `catchup` until it completes or shutdown is requested
    pub async fn run_until_success(
        &self,
        backoff: Duration,
        mut shutdown: mpsc::Receiver<()>,
    ) -> eyre::Result<()> {
        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    info!("Catchup cancelled");
                    return Ok(());
                }
                result = self.catchup() => match result {
                    Ok(()) => return Ok(()),
                    Err(e) => error!(
                        error = %e,
                        backoff_ms = backoff.as_millis() as u64,
                        "Catchup failed, retrying"
                    ),
                },
            }

            tokio::select! {
                _ = shutdown.recv() => return Ok(()),
                _ = tokio::time::sleep(backoff) => {}
            }
        }
    }
}
