//! Token metadata for non-fungible deposits
//!
//! Reads the Metaplex metadata account of a mint, applies the collection
//! membership rule and resolves the off-chain image to a content hash.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use eyre::{Result, WrapErr};
use reqwest::Client;
use solana_sdk::pubkey::Pubkey;
use tracing::debug;

use crate::chain::ChainClient;
use crate::error::{BridgeError, BridgeResult, DecodeError};
use crate::hash::{encode_0x, keccak256};
use crate::types::ItemMetadata;

pub use mpl_token_metadata::accounts::Metadata;

/// Metadata account address of a mint
pub fn metadata_address(mint: &Pubkey) -> Pubkey {
    Metadata::find_pda(mint).0
}

/// Collection address of the token: the verified collection key, or the
/// mint itself when the collection is absent or unverified
pub fn collection_address(metadata: &Metadata) -> Pubkey {
    match &metadata.collection {
        Some(collection) if collection.verified => collection.key,
        _ => metadata.mint,
    }
}

/// Decode a metadata account, including legacy accounts that end before
/// the optional trailing fields
pub fn decode_metadata(data: &[u8]) -> Result<Metadata, DecodeError> {
    Metadata::safe_deserialize(data)
        .map_err(|e| DecodeError::Malformed(format!("metadata account: {}", e)))
}

/// Fixed-size metadata strings are stored NUL padded
fn unpad(s: &str) -> String {
    s.trim_end_matches('\0').to_string()
}

/// Resolves a metadata URI to its image reference and content hash
#[async_trait]
pub trait ContentFetcher: Send + Sync {
    /// Returns `(image_uri, image_hash)`
    async fn fetch_image_hash(&self, uri: &str) -> BridgeResult<(String, String)>;
}

/// Fetches the metadata JSON over HTTP and hashes the referenced image
pub struct HttpContentFetcher {
    client: Client,
}

impl HttpContentFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .wrap_err("Failed to create HTTP client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ContentFetcher for HttpContentFetcher {
    async fn fetch_image_hash(&self, uri: &str) -> BridgeResult<(String, String)> {
        let response = self.client.get(uri).send().await?.error_for_status()?;
        let document: serde_json::Value = response.json().await.map_err(|e| {
            debug!(uri = %uri, error = %e, "Metadata document is not JSON");
            BridgeError::WrongOperationContent
        })?;

        let image = document
            .get("image")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                debug!(uri = %uri, "Metadata document has no image");
                BridgeError::WrongOperationContent
            })?
            .to_string();

        let bytes = self
            .client
            .get(&image)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;

        Ok((image, encode_0x(&keccak256(&bytes))))
    }
}

/// Reads token metadata through the chain client and content fetcher
#[derive(Clone)]
pub struct MetadataFetcher {
    chain: Arc<dyn ChainClient>,
    content: Arc<dyn ContentFetcher>,
}

impl MetadataFetcher {
    pub fn new(chain: Arc<dyn ChainClient>, content: Arc<dyn ContentFetcher>) -> Self {
        Self { chain, content }
    }

    /// `Ok(None)` when the mint has no metadata account
    pub async fn metadata(&self, mint: &Pubkey) -> BridgeResult<Option<Metadata>> {
        let address = metadata_address(mint);
        match self.chain.fetch_account_data(&address).await? {
            Some(data) => Ok(Some(decode_metadata(&data)?)),
            None => {
                debug!(mint = %mint, metadata = %address, "No metadata account");
                Ok(None)
            }
        }
    }

    /// Build registry metadata for an item first seen on this chain
    pub async fn item_metadata(&self, metadata: &Metadata) -> BridgeResult<ItemMetadata> {
        let uri = unpad(&metadata.uri);
        let (image_uri, image_hash) = self.content.fetch_image_hash(&uri).await?;
        Ok(ItemMetadata {
            image_uri,
            image_hash,
            // Items minted here have this chain as native chain
            seed: String::new(),
            name: unpad(&metadata.name),
            symbol: unpad(&metadata.symbol),
            uri,
        })
    }
}
