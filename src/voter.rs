//! Revote: re-verify an already submitted operation and vote on it

use std::sync::Arc;

use tracing::{info, warn};

use crate::broadcaster::Broadcaster;
use crate::error::{BridgeError, BridgeResult};
use crate::registry::Registry;
use crate::verifier::{RejectReason, TransferVerifier, VerificationResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevoteOutcome {
    /// A vote was submitted
    Voted { accepted: bool },
    /// The transfer originates on another chain; no vote from this saver
    NotOurs,
}

pub struct Voter {
    registry: Arc<dyn Registry>,
    verifier: Arc<TransferVerifier>,
    broadcaster: Arc<dyn Broadcaster>,
}

impl Voter {
    pub fn new(
        registry: Arc<dyn Registry>,
        verifier: Arc<TransferVerifier>,
        broadcaster: Arc<dyn Broadcaster>,
    ) -> Self {
        Self {
            registry,
            verifier,
            broadcaster,
        }
    }

    /// Load the operation's transfer, verify it and submit the vote
    pub async fn revote(&self, operation: &str) -> BridgeResult<RevoteOutcome> {
        let transfer = self
            .registry
            .operation_transfer(operation)
            .await?
            .ok_or_else(|| BridgeError::InvalidRequest(format!("unknown operation {}", operation)))?;

        let result = self
            .verifier
            .verify(&transfer, &transfer.tx, &transfer.event_id)
            .await?;

        let accepted = match result {
            VerificationResult::Valid => true,
            VerificationResult::Invalid {
                reason: RejectReason::UnsupportedNetwork,
            } => {
                warn!(operation = %operation, chain = %transfer.from.chain, "Revote for foreign chain");
                return Ok(RevoteOutcome::NotOurs);
            }
            VerificationResult::Invalid {
                reason: RejectReason::WrongOperationContent,
            } => false,
        };

        self.broadcaster.send_vote(operation, accepted).await?;
        info!(operation = %operation, accepted, "Revote submitted");
        Ok(RevoteOutcome::Voted { accepted })
    }
}
