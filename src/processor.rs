//! Transaction processing
//!
//! Turns every bridge deposit instruction of a transaction into a transfer
//! creation request and hands it to the broadcaster.

use std::sync::Arc;

use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use tracing::{debug, error, info, warn};

use crate::broadcaster::Broadcaster;
use crate::chain::{ChainClient, SolanaTransaction};
use crate::error::BridgeResult;
use crate::hash::encode_0x;
use crate::instruction::BridgeInstruction;
use crate::operators::Operators;
use crate::server::{SharedMetrics, SharedStats};
use crate::types::{Transfer, TransferCreationRequest};

pub struct Processor {
    program_id: Pubkey,
    chain: Arc<dyn ChainClient>,
    operators: Arc<Operators>,
    broadcaster: Arc<dyn Broadcaster>,
    stats: SharedStats,
    metrics: SharedMetrics,
}

impl Processor {
    pub fn new(
        program_id: Pubkey,
        chain: Arc<dyn ChainClient>,
        operators: Arc<Operators>,
        broadcaster: Arc<dyn Broadcaster>,
        stats: SharedStats,
        metrics: SharedMetrics,
    ) -> Self {
        Self {
            program_id,
            chain,
            operators,
            broadcaster,
            stats,
            metrics,
        }
    }

    /// Fetch and process a transaction. Unknown or failed transactions are
    /// skipped; transport errors propagate.
    pub async fn process_signature(&self, signature: &Signature) -> BridgeResult<usize> {
        match self.chain.fetch_transaction(signature).await? {
            Some(tx) => self.process_transaction(&tx).await,
            None => {
                debug!(signature = %signature, "Nothing to process");
                Ok(0)
            }
        }
    }

    /// Build and broadcast every deposit instruction addressed to the bridge
    /// program. Returns the number of transfers broadcast.
    ///
    /// Rejected instructions are logged and skipped; a transport error aborts
    /// the transaction.
    pub async fn process_transaction(&self, tx: &SolanaTransaction) -> BridgeResult<usize> {
        debug!(signature = %tx.signature, "Parsing transaction");
        let mut broadcast = 0;

        for (index, instruction) in tx.instructions.iter().enumerate() {
            if tx.program_id(instruction) != Some(&self.program_id) {
                continue;
            }
            // Unrelated program instructions
            let Some(kind) = BridgeInstruction::from_data(&instruction.data) else {
                continue;
            };
            let Some(builder) = self.operators.builder_for(kind) else {
                continue;
            };

            info!(signature = %tx.signature, instruction = index, kind = ?kind, "Found new deposit");

            let Some(accounts) = tx.instruction_accounts(instruction) else {
                warn!(signature = %tx.signature, instruction = index, "Account index out of range");
                self.record_failure().await;
                continue;
            };

            let transfer = match builder.build(&accounts, &instruction.data).await {
                Ok(transfer) => Transfer {
                    tx: tx.signature.to_string(),
                    event_id: index.to_string(),
                    ..transfer
                },
                Err(e) if e.is_rejection() => {
                    warn!(signature = %tx.signature, instruction = index, error = %e, "Skipping deposit");
                    self.record_failure().await;
                    continue;
                }
                Err(e) => return Err(e),
            };

            let sender = kind
                .owner_index()
                .and_then(|i| accounts.get(i))
                .map(|owner| encode_0x(owner.as_ref()))
                .unwrap_or_default();
            let request = TransferCreationRequest::new(transfer, sender, builder.token_type());

            if let Err(e) = self.broadcaster.send(request).await {
                error!(signature = %tx.signature, instruction = index, error = %e, "Broadcast failed");
                self.record_failure().await;
                continue;
            }

            broadcast += 1;
            self.metrics.transfers_broadcast_total.inc();
            self.stats.write().await.transfers_broadcast += 1;
        }

        self.stats.write().await.last_signature = Some(tx.signature.to_string());
        Ok(broadcast)
    }

    async fn record_failure(&self) {
        self.metrics.instructions_failed_total.inc();
        self.stats.write().await.instructions_failed += 1;
    }
}
