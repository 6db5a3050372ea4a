//! Transfer builders
//!
//! One builder per deposit kind. Each turns the instruction's accounts and
//! data into the canonical `Transfer`; the processor and the verifier share
//! them so both sides derive byte-identical records.

use std::sync::Arc;

use async_trait::async_trait;
use solana_sdk::pubkey::Pubkey;
use tracing::debug;

use crate::error::{BridgeError, BridgeResult};
use crate::hash::encode_0x;
use crate::instruction::BridgeInstruction;
use crate::metadata::MetadataFetcher;
use crate::registry::Registry;
use crate::types::{TokenType, Transfer};

pub mod fungible;
pub mod native;
pub mod nft;

pub use fungible::FtOperator;
pub use native::NativeOperator;
pub use nft::NftOperator;

#[async_trait]
pub trait TransferBuilder: Send + Sync {
    /// Build a transfer from resolved instruction accounts and raw data.
    /// `origin`, `tx` and `event_id` are left empty for the caller to fill.
    async fn build(&self, accounts: &[Pubkey], data: &[u8]) -> BridgeResult<Transfer>;

    fn token_type(&self) -> TokenType;
}

/// Fixed association of deposit kinds to builders
pub struct Operators {
    native: NativeOperator,
    ft: FtOperator,
    nft: NftOperator,
}

impl Operators {
    pub fn new(chain: &str, registry: Arc<dyn Registry>, metadata: MetadataFetcher) -> Self {
        Self {
            native: NativeOperator::new(chain, registry.clone()),
            ft: FtOperator::new(chain, registry.clone()),
            nft: NftOperator::new(chain, registry, metadata),
        }
    }

    /// Builder for an instruction kind; `None` for non-deposit instructions
    pub fn builder_for(&self, kind: BridgeInstruction) -> Option<&dyn TransferBuilder> {
        match kind {
            BridgeInstruction::DepositNative => Some(&self.native),
            BridgeInstruction::DepositFT => Some(&self.ft),
            BridgeInstruction::DepositNFT => Some(&self.nft),
            _ => None,
        }
    }
}

/// Bundle fields are carried only when both parts are present and the data
/// is non-empty; anything else means "no bundle"
pub(crate) fn bundle_fields(data: &Option<Vec<u8>>, seed: &Option<[u8; 32]>) -> (String, String) {
    match (data, seed) {
        (Some(data), Some(seed)) if !data.is_empty() => (encode_0x(data), encode_0x(seed)),
        _ => (String::new(), String::new()),
    }
}

pub(crate) fn account_at(accounts: &[Pubkey], index: usize) -> BridgeResult<Pubkey> {
    accounts.get(index).copied().ok_or_else(|| {
        debug!(index, available = accounts.len(), "Instruction account missing");
        BridgeError::WrongOperationContent
    })
}
