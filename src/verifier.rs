//! Transfer verification
//!
//! Re-derives a claimed transfer from the on-chain instruction it points at
//! and compares the two.
//!
//! # Verification Flow
//!
//! 1. Claims from another chain are not ours to judge (`UnsupportedNetwork`)
//! 2. The event id is the instruction index inside the transaction
//! 3. The instruction must target the bridge program and be a deposit
//! 4. The matching builder rebuilds the transfer from chain data
//! 5. Rebuilt and claimed transfers must be equal once request fields are
//!    aligned

use std::str::FromStr;
use std::sync::Arc;

use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use tracing::{debug, info, warn};

use crate::chain::ChainClient;
use crate::error::BridgeResult;
use crate::instruction::BridgeInstruction;
use crate::operators::Operators;
use crate::types::Transfer;

/// Why a claim was rejected
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// The claim originates on a chain this validator does not watch
    UnsupportedNetwork,
    /// The claim does not match what the chain says
    WrongOperationContent,
}

/// Verification result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationResult {
    /// Claim matches the independently rebuilt transfer
    Valid,
    /// Claim is wrong or not ours
    Invalid { reason: RejectReason },
}

impl VerificationResult {
    pub fn is_valid(&self) -> bool {
        matches!(self, VerificationResult::Valid)
    }

    fn wrong_content() -> Self {
        VerificationResult::Invalid {
            reason: RejectReason::WrongOperationContent,
        }
    }
}

/// Stateless verifier; safe to share across concurrent requests
pub struct TransferVerifier {
    chain_name: String,
    program_id: Pubkey,
    chain: Arc<dyn ChainClient>,
    operators: Arc<Operators>,
}

impl TransferVerifier {
    pub fn new(
        chain_name: &str,
        program_id: Pubkey,
        chain: Arc<dyn ChainClient>,
        operators: Arc<Operators>,
    ) -> Self {
        Self {
            chain_name: chain_name.to_string(),
            program_id,
            chain,
            operators,
        }
    }

    /// Verify `claim` against instruction `event_id` of transaction `tx`.
    ///
    /// Only transport failures are returned as errors; everything the chain
    /// contradicts is an `Invalid` result.
    pub async fn verify(
        &self,
        claim: &Transfer,
        tx: &str,
        event_id: &str,
    ) -> BridgeResult<VerificationResult> {
        if claim.from.chain != self.chain_name {
            info!(
                tx = %tx,
                claim_chain = %claim.from.chain,
                chain = %self.chain_name,
                "Claim from unsupported network"
            );
            return Ok(VerificationResult::Invalid {
                reason: RejectReason::UnsupportedNetwork,
            });
        }

        let Ok(signature) = Signature::from_str(tx) else {
            debug!(tx = %tx, "Unparsable transaction signature");
            return Ok(VerificationResult::wrong_content());
        };
        let Ok(index) = event_id.parse::<usize>() else {
            debug!(tx = %tx, event_id = %event_id, "Unparsable event id");
            return Ok(VerificationResult::wrong_content());
        };

        let Some(transaction) = self.chain.fetch_transaction(&signature).await? else {
            warn!(tx = %tx, "Claimed transaction not found or failed");
            return Ok(VerificationResult::wrong_content());
        };

        let Some(instruction) = transaction.instructions.get(index) else {
            debug!(tx = %tx, event_id = %event_id, "Instruction index out of range");
            return Ok(VerificationResult::wrong_content());
        };

        if transaction.program_id(instruction) != Some(&self.program_id) {
            debug!(tx = %tx, event_id = %event_id, "Instruction does not target bridge program");
            return Ok(VerificationResult::wrong_content());
        }

        let builder = BridgeInstruction::from_data(&instruction.data)
            .and_then(|kind| self.operators.builder_for(kind));
        let Some(builder) = builder else {
            debug!(tx = %tx, event_id = %event_id, "Instruction is not a deposit");
            return Ok(VerificationResult::wrong_content());
        };

        let Some(accounts) = transaction.instruction_accounts(instruction) else {
            debug!(tx = %tx, event_id = %event_id, "Instruction account index out of range");
            return Ok(VerificationResult::wrong_content());
        };

        let rebuilt = match builder.build(&accounts, &instruction.data).await {
            Ok(transfer) => transfer,
            Err(e) if e.is_rejection() => {
                debug!(tx = %tx, event_id = %event_id, error = %e, "Rebuild rejected");
                return Ok(VerificationResult::wrong_content());
            }
            Err(e) => return Err(e),
        };

        if rebuilt.aligned_with(claim) == *claim {
            info!(tx = %tx, event_id = %event_id, "Transfer verified");
            Ok(VerificationResult::Valid)
        } else {
            warn!(
                tx = %tx,
                event_id = %event_id,
                claimed = ?claim,
                rebuilt = ?rebuilt,
                "Transfer mismatch"
            );
            Ok(VerificationResult::wrong_content())
        }
    }
}
