//! Solana chain access
//!
//! `ChainClient` is the only way the rest of the crate touches the ledger.
//! `RpcChainClient` implements it over the nonblocking JSON-RPC client.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_client::GetConfirmedSignaturesForAddress2Config;
use solana_client::rpc_config::RpcTransactionConfig;
use solana_client::rpc_request::RpcRequest;
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::instruction::CompiledInstruction;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_transaction_status::option_serializer::OptionSerializer;
use solana_transaction_status::{EncodedConfirmedTransactionWithStatusMeta, UiTransactionEncoding};
use tracing::{debug, warn};

use crate::error::{BridgeError, BridgeResult};

/// Successful transaction reduced to what instruction processing needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolanaTransaction {
    pub signature: Signature,
    /// Static keys followed by lookup-table keys (writable, then readonly)
    pub account_keys: Vec<Pubkey>,
    pub instructions: Vec<CompiledInstruction>,
}

impl SolanaTransaction {
    pub fn program_id(&self, instruction: &CompiledInstruction) -> Option<&Pubkey> {
        self.account_keys
            .get(instruction.program_id_index as usize)
    }

    /// Resolve an instruction's account indexes against the message keys
    pub fn instruction_accounts(&self, instruction: &CompiledInstruction) -> Option<Vec<Pubkey>> {
        instruction
            .accounts
            .iter()
            .map(|&i| self.account_keys.get(i as usize).copied())
            .collect()
    }
}

/// One entry of a signature listing, newest first
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureInfo {
    pub signature: Signature,
    pub block_time: Option<i64>,
    pub failed: bool,
}

#[async_trait]
pub trait ChainClient: Send + Sync {
    /// `None` when the transaction is unknown or failed on chain
    async fn fetch_transaction(&self, signature: &Signature)
        -> BridgeResult<Option<SolanaTransaction>>;

    /// Signatures mentioning `address`, older than `before`, newest first
    async fn list_signatures(
        &self,
        address: &Pubkey,
        before: Option<Signature>,
    ) -> BridgeResult<Vec<SignatureInfo>>;

    /// Raw account data; `None` when the account does not exist
    async fn fetch_account_data(&self, address: &Pubkey) -> BridgeResult<Option<Vec<u8>>>;
}

/// Finalized-commitment JSON-RPC implementation
pub struct RpcChainClient {
    rpc: RpcClient,
}

impl RpcChainClient {
    pub fn new(rpc_url: &str, timeout: Duration) -> Self {
        Self {
            rpc: RpcClient::new_with_timeout_and_commitment(
                rpc_url.to_string(),
                timeout,
                CommitmentConfig::finalized(),
            ),
        }
    }
}

#[async_trait]
impl ChainClient for RpcChainClient {
    async fn fetch_transaction(
        &self,
        signature: &Signature,
    ) -> BridgeResult<Option<SolanaTransaction>> {
        let config = RpcTransactionConfig {
            encoding: Some(UiTransactionEncoding::Base64),
            commitment: Some(CommitmentConfig::finalized()),
            max_supported_transaction_version: Some(0),
        };
        // Only a literal `null` result means the ledger does not have it;
        // a reply that fails to parse is a transport problem
        let response = self
            .rpc
            .send::<Option<EncodedConfirmedTransactionWithStatusMeta>>(
                RpcRequest::GetTransaction,
                json!([signature.to_string(), config]),
            )
            .await
            .map_err(BridgeError::transport)?;
        let Some(response) = response else {
            debug!(signature = %signature, "Transaction not found");
            return Ok(None);
        };

        let meta = response.transaction.meta;
        if let Some(meta) = meta.as_ref() {
            if let Some(err) = meta.err.as_ref() {
                debug!(signature = %signature, error = %err, "Skipping failed transaction");
                return Ok(None);
            }
        }

        let transaction = response.transaction.transaction.decode().ok_or_else(|| {
            BridgeError::Transport(format!("undecodable transaction {}", signature))
        })?;

        let mut account_keys = transaction.message.static_account_keys().to_vec();
        if let Some(meta) = meta.as_ref() {
            if let OptionSerializer::Some(loaded) = &meta.loaded_addresses {
                for key in loaded.writable.iter().chain(loaded.readonly.iter()) {
                    match Pubkey::from_str(key) {
                        Ok(key) => account_keys.push(key),
                        Err(e) => {
                            warn!(signature = %signature, key = %key, error = %e, "Bad loaded address");
                            return Err(BridgeError::Transport(format!(
                                "bad loaded address in {}",
                                signature
                            )));
                        }
                    }
                }
            }
        }

        Ok(Some(SolanaTransaction {
            signature: *signature,
            account_keys,
            instructions: transaction.message.instructions().to_vec(),
        }))
    }

    async fn list_signatures(
        &self,
        address: &Pubkey,
        before: Option<Signature>,
    ) -> BridgeResult<Vec<SignatureInfo>> {
        let statuses = self
            .rpc
            .get_signatures_for_address_with_config(
                address,
                GetConfirmedSignaturesForAddress2Config {
                    before,
                    until: None,
                    limit: None,
                    commitment: Some(CommitmentConfig::finalized()),
                },
            )
            .await
            .map_err(BridgeError::transport)?;

        statuses
            .into_iter()
            .map(|status| {
                let signature = Signature::from_str(&status.signature).map_err(|e| {
                    BridgeError::Transport(format!("bad signature {}: {}", status.signature, e))
                })?;
                Ok(SignatureInfo {
                    signature,
                    block_time: status.block_time,
                    failed: status.err.is_some(),
                })
            })
            .collect()
    }

    async fn fetch_account_data(&self, address: &Pubkey) -> BridgeResult<Option<Vec<u8>>> {
        let response = self
            .rpc
            .get_account_with_commitment(address, CommitmentConfig::finalized())
            .await
            .map_err(BridgeError::transport)?;
        Ok(response.value.map(|account| account.data))
    }
}
