//! SPL token deposits

use std::sync::Arc;

use async_trait::async_trait;
use solana_sdk::pubkey::Pubkey;

use super::{account_at, bundle_fields, TransferBuilder};
use crate::error::BridgeResult;
use crate::hash::encode_0x;
use crate::instruction::{decode_ft, token_accounts};
use crate::registry::Registry;
use crate::resolver::{rebase_for_target, resolve_fungible_target};
use crate::types::{OnChainItemIndex, TokenType, Transfer};

pub struct FtOperator {
    chain: String,
    registry: Arc<dyn Registry>,
}

impl FtOperator {
    pub fn new(chain: &str, registry: Arc<dyn Registry>) -> Self {
        Self {
            chain: chain.to_string(),
            registry,
        }
    }
}

#[async_trait]
impl TransferBuilder for FtOperator {
    async fn build(&self, accounts: &[Pubkey], data: &[u8]) -> BridgeResult<Transfer> {
        let args = decode_ft(data)?;
        let mint = account_at(accounts, token_accounts::MINT)?;

        let from = OnChainItemIndex::new(&self.chain, encode_0x(mint.as_ref()), "");
        let to = resolve_fungible_target(self.registry.as_ref(), &from, &args.network_to).await?;
        let amount = rebase_for_target(self.registry.as_ref(), args.amount, &from, &to).await?;
        let (bundle_data, bundle_salt) = bundle_fields(&args.bundle_data, &args.bundle_seed);

        Ok(Transfer {
            receiver: args.receiver_address,
            amount,
            bundle_data,
            bundle_salt,
            from,
            to,
            ..Default::default()
        })
    }

    fn token_type(&self) -> TokenType {
        TokenType::MetaplexFt
    }
}
