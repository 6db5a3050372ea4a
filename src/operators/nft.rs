//! Metaplex NFT deposits

use std::sync::Arc;

use async_trait::async_trait;
use solana_sdk::pubkey::Pubkey;
use tracing::debug;

use super::{account_at, bundle_fields, TransferBuilder};
use crate::error::{BridgeError, BridgeResult};
use crate::hash::encode_0x;
use crate::instruction::{decode_nft, token_accounts};
use crate::metadata::{collection_address, MetadataFetcher};
use crate::registry::Registry;
use crate::resolver::resolve_target;
use crate::types::{OnChainItemIndex, TokenType, Transfer};

/// Amount of every non-fungible transfer
const NFT_AMOUNT: &str = "1";

pub struct NftOperator {
    chain: String,
    registry: Arc<dyn Registry>,
    metadata: MetadataFetcher,
}

impl NftOperator {
    pub fn new(chain: &str, registry: Arc<dyn Registry>, metadata: MetadataFetcher) -> Self {
        Self {
            chain: chain.to_string(),
            registry,
            metadata,
        }
    }
}

#[async_trait]
impl TransferBuilder for NftOperator {
    async fn build(&self, accounts: &[Pubkey], data: &[u8]) -> BridgeResult<Transfer> {
        let args = decode_nft(data)?;
        let mint = account_at(accounts, token_accounts::MINT)?;

        // A mint without a metadata account is its own collection
        let metadata = self.metadata.metadata(&mint).await?;
        let collection = metadata
            .as_ref()
            .map(collection_address)
            .unwrap_or(mint);

        let from = OnChainItemIndex::new(
            &self.chain,
            encode_0x(collection.as_ref()),
            encode_0x(mint.as_ref()),
        );
        let target = resolve_target(self.registry.as_ref(), &from, &args.network_to).await?;

        // A registered item already carries its metadata
        let meta = if target.exists {
            None
        } else {
            let metadata = metadata.ok_or_else(|| {
                debug!(mint = %mint, "Cannot describe new item without metadata account");
                BridgeError::WrongOperationContent
            })?;
            Some(self.metadata.item_metadata(&metadata).await?)
        };

        let (bundle_data, bundle_salt) = bundle_fields(&args.bundle_data, &args.bundle_seed);

        Ok(Transfer {
            receiver: args.receiver_address,
            amount: NFT_AMOUNT.to_string(),
            bundle_data,
            bundle_salt,
            from,
            to: target.index,
            meta,
            ..Default::default()
        })
    }

    fn token_type(&self) -> TokenType {
        TokenType::MetaplexNft
    }
}
