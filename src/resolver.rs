//! Cross-chain token identity resolution
//!
//! Maps a source-chain token onto its counterpart on a target chain using
//! the registry, and rescales amounts between chain precisions.

use std::str::FromStr;

use bigdecimal::BigDecimal;
use tracing::debug;

use crate::error::{BridgeError, BridgeResult};
use crate::registry::Registry;
use crate::types::OnChainItemIndex;

/// Target of a transfer and whether the registry already knows it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTarget {
    pub index: OnChainItemIndex,
    pub exists: bool,
}

/// Resolve the target of a non-fungible transfer.
///
/// Order matters: an existing mapping always wins, and when none exists the
/// token id comes from the collection's native chain.
pub async fn resolve_target(
    registry: &dyn Registry,
    from: &OnChainItemIndex,
    target_chain: &str,
) -> BridgeResult<ResolvedTarget> {
    if from.chain == target_chain {
        let exists = registry.on_chain_item(from).await?.is_some();
        return Ok(ResolvedTarget {
            index: from.clone(),
            exists,
        });
    }

    if let Some(existing) = registry.on_chain_item_by_other(from, target_chain).await? {
        return Ok(ResolvedTarget {
            index: existing.index,
            exists: true,
        });
    }

    let collection = registry
        .collection_by_collection_data(&from.chain, &from.address)
        .await?
        .ok_or_else(|| lookup_miss("collection_by_collection_data", from, target_chain))?;

    let target_data = collection
        .data_on(target_chain)
        .cloned()
        .ok_or_else(|| lookup_miss("collection target data", from, target_chain))?;

    let native = registry
        .native_collection_data(&collection.index)
        .await?
        .ok_or_else(|| lookup_miss("native_collection_data", from, target_chain))?;

    let token_id = if native.index.chain == from.chain {
        from.token_id.clone()
    } else {
        registry
            .on_chain_item_by_other(from, &native.index.chain)
            .await?
            .ok_or_else(|| lookup_miss("native chain mapping", from, &native.index.chain))?
            .index
            .token_id
    };

    Ok(ResolvedTarget {
        index: OnChainItemIndex {
            chain: target_chain.to_string(),
            address: target_data.address,
            token_id,
        },
        exists: false,
    })
}

/// Resolve the target of a fungible or native transfer.
///
/// Fungible items must be registered on every chain they move to; there is
/// no fallback.
pub async fn resolve_fungible_target(
    registry: &dyn Registry,
    from: &OnChainItemIndex,
    target_chain: &str,
) -> BridgeResult<OnChainItemIndex> {
    let on_chain = registry
        .on_chain_item(from)
        .await?
        .ok_or_else(|| lookup_miss("on_chain_item", from, target_chain))?;

    let item = registry
        .item(&on_chain.item)
        .await?
        .ok_or_else(|| lookup_miss("item", from, target_chain))?;

    item.on_chain_for(target_chain)
        .cloned()
        .ok_or_else(|| lookup_miss("item target mapping", from, target_chain))
}

/// Rescale a fungible amount from the source to the target chain precision
pub async fn rebase_for_target(
    registry: &dyn Registry,
    amount: u64,
    from: &OnChainItemIndex,
    to: &OnChainItemIndex,
) -> BridgeResult<String> {
    let source = registry
        .collection_data(&from.chain, &from.address)
        .await?
        .ok_or_else(|| lookup_miss("source collection_data", from, &to.chain))?;
    let target = registry
        .collection_data(&to.chain, &to.address)
        .await?
        .ok_or_else(|| lookup_miss("target collection_data", to, &to.chain))?;

    rebase(&amount.to_string(), source.decimals, target.decimals)
}

/// Rescale a non-negative integer amount between decimal precisions.
///
/// Scaling down truncates, so `rebase(rebase(a, s, t), t, s) == a` only
/// holds for `s <= t`.
pub fn rebase(amount: &str, source_decimals: u32, target_decimals: u32) -> BridgeResult<String> {
    let value = BigDecimal::from_str(amount)
        .map_err(|_| BridgeError::InvalidRequest(format!("invalid amount: {}", amount)))?;
    if !value.is_integer() || value < BigDecimal::from(0) {
        return Err(BridgeError::InvalidRequest(format!("invalid amount: {}", amount)));
    }

    let (digits, scale) = value.into_bigint_and_exponent();
    let shift = target_decimals as i64 - source_decimals as i64;
    let rescaled = BigDecimal::new(digits, scale - shift).with_scale(0);
    let (integer, _) = rescaled.into_bigint_and_exponent();
    Ok(integer.to_string())
}

fn lookup_miss(what: &str, from: &OnChainItemIndex, target_chain: &str) -> BridgeError {
    debug!(
        lookup = what,
        chain = %from.chain,
        address = %from.address,
        token_id = %from.token_id,
        target_chain = %target_chain,
        "Registry mapping missing"
    );
    BridgeError::WrongOperationContent
}
