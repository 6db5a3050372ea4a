//! In-memory collaborators shared by the integration tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use borsh::BorshSerialize;
use solana_sdk::instruction::CompiledInstruction;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use tokio::sync::RwLock;

use sol_saver::broadcaster::Broadcaster;
use sol_saver::chain::{ChainClient, SignatureInfo, SolanaTransaction};
use sol_saver::error::{BridgeError, BridgeResult};
use sol_saver::hash::{encode_0x, keccak256};
use sol_saver::metadata::{metadata_address, ContentFetcher, Metadata, MetadataFetcher};
use sol_saver::operators::Operators;
use sol_saver::processor::Processor;
use sol_saver::registry::Registry;
use sol_saver::server::{Metrics, SaverStats, SharedMetrics, SharedStats};
use sol_saver::types::{
    Collection, CollectionData, CollectionDataIndex, Item, OnChainItem, OnChainItemIndex,
    TokenType, Transfer, TransferCreationRequest,
};
use sol_saver::verifier::TransferVerifier;
use sol_saver::voter::Voter;

pub const CHAIN: &str = "solana";

// ============================================================================
// Registry
// ============================================================================

#[derive(Default)]
pub struct MockRegistry {
    on_chain_items: HashMap<OnChainItemIndex, OnChainItem>,
    by_other: HashMap<(OnChainItemIndex, String), OnChainItem>,
    items: HashMap<String, Item>,
    collections: HashMap<String, Collection>,
    collections_by_data: HashMap<(String, String), String>,
    collection_data: HashMap<(String, String), CollectionData>,
    native_data: HashMap<String, CollectionData>,
    operations: Mutex<HashMap<String, Transfer>>,
    unavailable: bool,
    calls: Mutex<Vec<String>>,
}

impl MockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every registry call fails with a transport error
    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    /// Register an item and its per-chain instances
    pub fn add_item(&mut self, item: &str, on_chain: Vec<OnChainItemIndex>) {
        for index in &on_chain {
            self.on_chain_items.insert(
                index.clone(),
                OnChainItem {
                    index: index.clone(),
                    item: item.to_string(),
                },
            );
        }
        for from in &on_chain {
            for to in &on_chain {
                if from.chain != to.chain {
                    self.by_other.insert(
                        (from.clone(), to.chain.clone()),
                        OnChainItem {
                            index: to.clone(),
                            item: item.to_string(),
                        },
                    );
                }
            }
        }
        self.items.insert(
            item.to_string(),
            Item {
                index: item.to_string(),
                collection: String::new(),
                meta: None,
                on_chain,
            },
        );
    }

    /// Register a collection with its per-chain data. The first entry is the
    /// native chain.
    pub fn add_collection(&mut self, collection: &str, data: Vec<(CollectionDataIndex, u32)>) {
        for (i, (index, decimals)) in data.iter().enumerate() {
            let record = CollectionData {
                index: index.clone(),
                collection: collection.to_string(),
                token_type: TokenType::Native,
                wrapped: i != 0,
                decimals: *decimals,
            };
            if i == 0 {
                self.native_data
                    .insert(collection.to_string(), record.clone());
            }
            self.collection_data
                .insert((index.chain.clone(), index.address.clone()), record);
            self.collections_by_data.insert(
                (index.chain.clone(), index.address.clone()),
                collection.to_string(),
            );
        }
        self.collections.insert(
            collection.to_string(),
            Collection {
                index: collection.to_string(),
                data: data.into_iter().map(|(index, _)| index).collect(),
            },
        );
    }

    pub fn add_operation(&self, operation: &str, transfer: Transfer) {
        self.operations
            .lock()
            .unwrap()
            .insert(operation.to_string(), transfer);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: &str) -> BridgeResult<()> {
        self.calls.lock().unwrap().push(call.to_string());
        if self.unavailable {
            return Err(BridgeError::Transport("registry unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl Registry for MockRegistry {
    async fn on_chain_item(&self, index: &OnChainItemIndex) -> BridgeResult<Option<OnChainItem>> {
        self.record("on_chain_item")?;
        Ok(self.on_chain_items.get(index).cloned())
    }

    async fn on_chain_item_by_other(
        &self,
        from: &OnChainItemIndex,
        other_chain: &str,
    ) -> BridgeResult<Option<OnChainItem>> {
        self.record("on_chain_item_by_other")?;
        Ok(self
            .by_other
            .get(&(from.clone(), other_chain.to_string()))
            .cloned())
    }

    async fn item(&self, index: &str) -> BridgeResult<Option<Item>> {
        self.record("item")?;
        Ok(self.items.get(index).cloned())
    }

    async fn collection_by_collection_data(
        &self,
        chain: &str,
        address: &str,
    ) -> BridgeResult<Option<Collection>> {
        self.record("collection_by_collection_data")?;
        Ok(self
            .collections_by_data
            .get(&(chain.to_string(), address.to_string()))
            .and_then(|c| self.collections.get(c))
            .cloned())
    }

    async fn collection_data(
        &self,
        chain: &str,
        address: &str,
    ) -> BridgeResult<Option<CollectionData>> {
        self.record("collection_data")?;
        Ok(self
            .collection_data
            .get(&(chain.to_string(), address.to_string()))
            .cloned())
    }

    async fn native_collection_data(
        &self,
        collection: &str,
    ) -> BridgeResult<Option<CollectionData>> {
        self.record("native_collection_data")?;
        Ok(self.native_data.get(collection).cloned())
    }

    async fn operation_transfer(&self, operation: &str) -> BridgeResult<Option<Transfer>> {
        self.record("operation_transfer")?;
        Ok(self.operations.lock().unwrap().get(operation).cloned())
    }
}

// ============================================================================
// Chain
// ============================================================================

#[derive(Default)]
pub struct MockChain {
    transactions: HashMap<Signature, SolanaTransaction>,
    accounts: HashMap<Pubkey, Vec<u8>>,
    /// Full history, newest first
    history: Vec<SignatureInfo>,
    page_size: usize,
    /// Remaining transport failures per signature
    failing: Mutex<HashMap<Signature, usize>>,
    fetched: Mutex<Vec<Signature>>,
}

impl MockChain {
    pub fn new() -> Self {
        Self {
            page_size: 2,
            ..Self::default()
        }
    }

    /// Add a successful transaction at the head of the history
    pub fn add_transaction(&mut self, tx: SolanaTransaction) {
        self.history.insert(
            0,
            SignatureInfo {
                signature: tx.signature,
                block_time: None,
                failed: false,
            },
        );
        self.transactions.insert(tx.signature, tx);
    }

    /// Add a failed transaction at the head of the history
    pub fn add_failed(&mut self, signature: Signature) {
        self.history.insert(
            0,
            SignatureInfo {
                signature,
                block_time: None,
                failed: true,
            },
        );
    }

    pub fn add_account(&mut self, address: Pubkey, data: Vec<u8>) {
        self.accounts.insert(address, data);
    }

    /// Store a metadata account at the mint's metadata address
    pub fn add_metadata(&mut self, metadata: &Metadata) {
        self.add_account(
            metadata_address(&metadata.mint),
            metadata.try_to_vec().unwrap(),
        );
    }

    pub fn fail_fetch(&self, signature: Signature, times: usize) {
        self.failing.lock().unwrap().insert(signature, times);
    }

    pub fn fetched(&self) -> Vec<Signature> {
        self.fetched.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChainClient for MockChain {
    async fn fetch_transaction(
        &self,
        signature: &Signature,
    ) -> BridgeResult<Option<SolanaTransaction>> {
        {
            let mut failing = self.failing.lock().unwrap();
            if let Some(remaining) = failing.get_mut(signature) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(BridgeError::Transport("rpc timeout".to_string()));
                }
            }
        }
        self.fetched.lock().unwrap().push(*signature);
        Ok(self.transactions.get(signature).cloned())
    }

    async fn list_signatures(
        &self,
        _address: &Pubkey,
        before: Option<Signature>,
    ) -> BridgeResult<Vec<SignatureInfo>> {
        let start = match before {
            Some(before) => self
                .history
                .iter()
                .position(|s| s.signature == before)
                .map(|i| i + 1)
                .unwrap_or(self.history.len()),
            None => 0,
        };
        Ok(self
            .history
            .iter()
            .skip(start)
            .take(self.page_size)
            .cloned()
            .collect())
    }

    async fn fetch_account_data(&self, address: &Pubkey) -> BridgeResult<Option<Vec<u8>>> {
        Ok(self.accounts.get(address).cloned())
    }
}

// ============================================================================
// Content and broadcaster
// ============================================================================

/// Resolves every URI to `<uri>/image.png` and hashes the URI text
#[derive(Default)]
pub struct MockContent {
    fetched: Mutex<Vec<String>>,
}

impl MockContent {
    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }
}

pub fn image_hash_of(uri: &str) -> String {
    encode_0x(&keccak256(uri.as_bytes()))
}

#[async_trait]
impl ContentFetcher for MockContent {
    async fn fetch_image_hash(&self, uri: &str) -> BridgeResult<(String, String)> {
        self.fetched.lock().unwrap().push(uri.to_string());
        Ok((format!("{}/image.png", uri), image_hash_of(uri)))
    }
}

#[derive(Default)]
pub struct RecordingBroadcaster {
    pub sent: Mutex<Vec<TransferCreationRequest>>,
    pub votes: Mutex<Vec<(String, bool)>>,
}

impl RecordingBroadcaster {
    pub fn sent(&self) -> Vec<TransferCreationRequest> {
        self.sent.lock().unwrap().clone()
    }

    pub fn votes(&self) -> Vec<(String, bool)> {
        self.votes.lock().unwrap().clone()
    }
}

#[async_trait]
impl Broadcaster for RecordingBroadcaster {
    async fn send(&self, request: TransferCreationRequest) -> BridgeResult<()> {
        self.sent.lock().unwrap().push(request);
        Ok(())
    }

    async fn send_vote(&self, operation: &str, accepted: bool) -> BridgeResult<()> {
        self.votes
            .lock()
            .unwrap()
            .push((operation.to_string(), accepted));
        Ok(())
    }
}

// ============================================================================
// Transactions
// ============================================================================

/// One instruction: program, accounts, data
pub struct Ix {
    pub program: Pubkey,
    pub accounts: Vec<Pubkey>,
    pub data: Vec<u8>,
}

/// Compile instructions into a transaction with a deduplicated key list
pub fn transaction(instructions: Vec<Ix>) -> SolanaTransaction {
    fn key_index(key: Pubkey, keys: &mut Vec<Pubkey>) -> u8 {
        match keys.iter().position(|k| *k == key) {
            Some(i) => i as u8,
            None => {
                keys.push(key);
                (keys.len() - 1) as u8
            }
        }
    }

    let mut keys: Vec<Pubkey> = Vec::new();
    let compiled = instructions
        .into_iter()
        .map(|ix| {
            let program_id_index = key_index(ix.program, &mut keys);
            let accounts = ix
                .accounts
                .iter()
                .map(|a| key_index(*a, &mut keys))
                .collect();
            CompiledInstruction {
                program_id_index,
                accounts,
                data: ix.data,
            }
        })
        .collect();

    SolanaTransaction {
        signature: Signature::new_unique(),
        account_keys: keys,
        instructions: compiled,
    }
}

/// Accounts of a native deposit; the owner is the last one
pub fn native_accounts(owner: Pubkey) -> Vec<Pubkey> {
    vec![Pubkey::new_unique(), Pubkey::new_unique(), owner]
}

/// Accounts of an FT/NFT deposit
pub fn token_accounts(mint: Pubkey, owner: Pubkey) -> Vec<Pubkey> {
    vec![
        Pubkey::new_unique(),
        mint,
        Pubkey::new_unique(),
        Pubkey::new_unique(),
        Pubkey::new_unique(),
        owner,
    ]
}

pub fn hex_key(key: &Pubkey) -> String {
    encode_0x(key.as_ref())
}

// ============================================================================
// Wiring
// ============================================================================

pub struct Harness {
    pub program_id: Pubkey,
    pub registry: Arc<MockRegistry>,
    pub chain: Arc<MockChain>,
    pub content: Arc<MockContent>,
    pub broadcaster: Arc<RecordingBroadcaster>,
    pub operators: Arc<Operators>,
    pub verifier: Arc<TransferVerifier>,
    pub processor: Arc<Processor>,
    pub voter: Arc<Voter>,
    pub stats: SharedStats,
    pub metrics: SharedMetrics,
}

impl Harness {
    pub fn new(program_id: Pubkey, registry: MockRegistry, chain: MockChain) -> Self {
        let registry = Arc::new(registry);
        let chain = Arc::new(chain);
        let content = Arc::new(MockContent::default());
        let broadcaster = Arc::new(RecordingBroadcaster::default());
        let stats: SharedStats = Arc::new(RwLock::new(SaverStats::default()));
        let metrics: SharedMetrics = Arc::new(Metrics::new());

        let operators = Arc::new(Operators::new(
            CHAIN,
            registry.clone(),
            MetadataFetcher::new(chain.clone(), content.clone()),
        ));
        let verifier = Arc::new(TransferVerifier::new(
            CHAIN,
            program_id,
            chain.clone(),
            operators.clone(),
        ));
        let processor = Arc::new(Processor::new(
            program_id,
            chain.clone(),
            operators.clone(),
            broadcaster.clone(),
            stats.clone(),
            metrics.clone(),
        ));
        let voter = Arc::new(Voter::new(
            registry.clone(),
            verifier.clone(),
            broadcaster.clone(),
        ));

        Self {
            program_id,
            registry,
            chain,
            content,
            broadcaster,
            operators,
            verifier,
            processor,
            voter,
            stats,
            metrics,
        }
    }
}
