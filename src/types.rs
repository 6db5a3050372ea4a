//! Registry records and the canonical transfer
//!
//! Field names follow the registry's JSON (snake_case) so the same types
//! deserialize straight from registry responses.

use serde::{Deserialize, Serialize};

/// A token or collection instance on one chain.
///
/// Empty `address` and `token_id` are valid: the native asset has neither,
/// fungible tokens have no token id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OnChainItemIndex {
    pub chain: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub token_id: String,
}

impl OnChainItemIndex {
    pub fn new(chain: impl Into<String>, address: impl Into<String>, token_id: impl Into<String>) -> Self {
        Self {
            chain: chain.into(),
            address: address.into(),
            token_id: token_id.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CollectionDataIndex {
    pub chain: String,
    #[serde(default)]
    pub address: String,
}

/// Per-chain registry entry of a collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionData {
    pub index: CollectionDataIndex,
    pub collection: String,
    #[serde(default)]
    pub token_type: TokenType,
    #[serde(default)]
    pub wrapped: bool,
    #[serde(default)]
    pub decimals: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collection {
    pub index: String,
    #[serde(default)]
    pub data: Vec<CollectionDataIndex>,
}

impl Collection {
    pub fn data_on(&self, chain: &str) -> Option<&CollectionDataIndex> {
        self.data.iter().find(|d| d.chain == chain)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnChainItem {
    pub index: OnChainItemIndex,
    pub item: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub index: String,
    #[serde(default)]
    pub collection: String,
    #[serde(default)]
    pub meta: Option<ItemMetadata>,
    #[serde(default)]
    pub on_chain: Vec<OnChainItemIndex>,
}

impl Item {
    pub fn on_chain_for(&self, chain: &str) -> Option<&OnChainItemIndex> {
        self.on_chain.iter().find(|i| i.chain == chain)
    }
}

/// Off-chain content of a non-fungible item
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemMetadata {
    pub image_uri: String,
    pub image_hash: String,
    #[serde(default)]
    pub seed: String,
    pub name: String,
    pub symbol: String,
    pub uri: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TokenType {
    #[default]
    Native,
    MetaplexFt,
    MetaplexNft,
}

/// Canonical cross-chain transfer record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    #[serde(default)]
    pub origin: String,
    #[serde(default)]
    pub tx: String,
    #[serde(default)]
    pub event_id: String,
    pub receiver: String,
    pub amount: String,
    #[serde(default)]
    pub bundle_data: String,
    #[serde(default)]
    pub bundle_salt: String,
    pub from: OnChainItemIndex,
    pub to: OnChainItemIndex,
    #[serde(default)]
    pub meta: Option<ItemMetadata>,
}

impl Transfer {
    /// Comparison value for a claim: request metadata is taken from the
    /// claim, and metadata is dropped when the claim carries none.
    pub fn aligned_with(&self, claim: &Transfer) -> Transfer {
        Transfer {
            origin: claim.origin.clone(),
            tx: claim.tx.clone(),
            event_id: claim.event_id.clone(),
            meta: if claim.meta.is_none() {
                None
            } else {
                self.meta.clone()
            },
            ..self.clone()
        }
    }
}

/// Message handed to the broadcaster for a freshly observed deposit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferCreationRequest {
    pub tx: String,
    pub event_id: String,
    pub sender: String,
    pub token_type: TokenType,
    pub receiver: String,
    pub amount: String,
    pub bundle_data: String,
    pub bundle_salt: String,
    pub from: OnChainItemIndex,
    pub to: OnChainItemIndex,
    pub meta: Option<ItemMetadata>,
}

impl TransferCreationRequest {
    pub fn new(transfer: Transfer, sender: String, token_type: TokenType) -> Self {
        Self {
            tx: transfer.tx,
            event_id: transfer.event_id,
            sender,
            token_type,
            receiver: transfer.receiver,
            amount: transfer.amount,
            bundle_data: transfer.bundle_data,
            bundle_salt: transfer.bundle_salt,
            from: transfer.from,
            to: transfer.to,
            meta: transfer.meta,
        }
    }
}
