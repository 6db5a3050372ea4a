//! Registry query client
//!
//! Read-only view of the remote token registry. Every lookup distinguishes
//! "not found" (`Ok(None)`) from an unreachable registry (`Err(Transport)`).

use std::time::Duration;

use async_trait::async_trait;
use eyre::{Result, WrapErr};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{BridgeError, BridgeResult};
use crate::types::{Collection, CollectionData, Item, OnChainItem, OnChainItemIndex, Transfer};

/// gRPC `NotFound` as reported in gateway error bodies
const GRPC_NOT_FOUND: i64 = 5;

#[async_trait]
pub trait Registry: Send + Sync {
    /// Registry entry for a token instance on a chain
    async fn on_chain_item(&self, index: &OnChainItemIndex) -> BridgeResult<Option<OnChainItem>>;

    /// Existing mapping of `from` onto `other_chain`
    async fn on_chain_item_by_other(
        &self,
        from: &OnChainItemIndex,
        other_chain: &str,
    ) -> BridgeResult<Option<OnChainItem>>;

    async fn item(&self, index: &str) -> BridgeResult<Option<Item>>;

    async fn collection_by_collection_data(
        &self,
        chain: &str,
        address: &str,
    ) -> BridgeResult<Option<Collection>>;

    async fn collection_data(&self, chain: &str, address: &str)
        -> BridgeResult<Option<CollectionData>>;

    /// Data entry on the chain where the collection was first minted
    async fn native_collection_data(&self, collection: &str)
        -> BridgeResult<Option<CollectionData>>;

    /// Transfer attached to a core operation (revote input)
    async fn operation_transfer(&self, operation: &str) -> BridgeResult<Option<Transfer>>;
}

/// Registry client over the LCD REST gateway
pub struct RestRegistryClient {
    base_url: String,
    client: Client,
}

impl RestRegistryClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .wrap_err("Failed to create HTTP client")?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    /// GET `path` and extract `field` from the JSON body
    async fn query<R: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, &str)],
        field: &str,
    ) -> BridgeResult<Option<R>> {
        let url = format!("{}/{}", self.base_url, path);
        debug!(url = %url, ?params, "Registry query");

        let response = self.client.get(&url).query(params).send().await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let body: serde_json::Value = response.json().await?;
        if !status.is_success() {
            if body.get("code").and_then(|c| c.as_i64()) == Some(GRPC_NOT_FOUND) {
                return Ok(None);
            }
            return Err(BridgeError::Transport(format!(
                "registry query {} failed: {} - {}",
                path, status, body
            )));
        }

        let value = match body.get(field) {
            Some(v) if !v.is_null() => v.clone(),
            _ => return Ok(None),
        };
        serde_json::from_value(value)
            .map(Some)
            .map_err(|e| BridgeError::Transport(format!("bad registry response for {}: {}", path, e)))
    }
}

#[async_trait]
impl Registry for RestRegistryClient {
    async fn on_chain_item(&self, index: &OnChainItemIndex) -> BridgeResult<Option<OnChainItem>> {
        self.query(
            "tokenmanager/on_chain_item",
            &[
                ("chain", index.chain.as_str()),
                ("address", index.address.as_str()),
                ("token_id", index.token_id.as_str()),
            ],
            "item",
        )
        .await
    }

    async fn on_chain_item_by_other(
        &self,
        from: &OnChainItemIndex,
        other_chain: &str,
    ) -> BridgeResult<Option<OnChainItem>> {
        self.query(
            "tokenmanager/on_chain_item_by_other",
            &[
                ("chain", from.chain.as_str()),
                ("address", from.address.as_str()),
                ("token_id", from.token_id.as_str()),
                ("other_chain", other_chain),
            ],
            "item",
        )
        .await
    }

    async fn item(&self, index: &str) -> BridgeResult<Option<Item>> {
        self.query(&format!("tokenmanager/item/{}", index), &[], "item")
            .await
    }

    async fn collection_by_collection_data(
        &self,
        chain: &str,
        address: &str,
    ) -> BridgeResult<Option<Collection>> {
        self.query(
            "tokenmanager/collection_by_collection_data",
            &[("chain", chain), ("address", address)],
            "collection",
        )
        .await
    }

    async fn collection_data(
        &self,
        chain: &str,
        address: &str,
    ) -> BridgeResult<Option<CollectionData>> {
        self.query(
            "tokenmanager/collection_data",
            &[("chain", chain), ("address", address)],
            "data",
        )
        .await
    }

    async fn native_collection_data(
        &self,
        collection: &str,
    ) -> BridgeResult<Option<CollectionData>> {
        self.query(
            &format!("tokenmanager/native_collection_data/{}", collection),
            &[],
            "data",
        )
        .await
    }

    async fn operation_transfer(&self, operation: &str) -> BridgeResult<Option<Transfer>> {
        self.query(
            &format!("rarimocore/operation/{}/transfer", operation),
            &[],
            "transfer",
        )
        .await
    }
}
