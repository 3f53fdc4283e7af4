//! Mock Collaborators - In-memory chain and middleware
//!
//! Scriptable stand-ins for the real RPC-backed clients, used by the
//! runtime's tests. The mock chain keeps identity, balance, permission and
//! governance state in memory and materializes blocks on demand, so both
//! the subscription and the polling submission strategies can be driven
//! deterministically.

use crate::{ChainClient, ClientError, MiddlewareClient, SigningOptions, TxSubscription, TxUpdate};
use async_trait::async_trait;
use dashmap::DashMap;
use ledger_types::{
    AccountAddress, AssetId, Balance, BlockDetails, BlockHash, BlockInfo, BlockNumber,
    ChainEvent, ComposedCall, ExtrinsicEntry, IdentityId, MultiSigInfo, OnChainError,
    Permissions, Ratio, Role, Subsidy, TxHash, TxTag,
};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Scripted outcome for the next submission.
#[derive(Debug, Clone)]
pub enum MockOutcome {
    /// Included and finalized with these events.
    Finalize { events: Vec<ChainEvent> },
    /// Included and finalized, but the extrinsic failed on-chain.
    FailWith { error: OnChainError },
    /// Included with a failing event, but the stream ends before the
    /// finalization update arrives.
    FailWithoutFinality { error: OnChainError },
    /// A transport-level error receipt after broadcast.
    TransportError { message: String },
    /// The signer declines to sign.
    RejectSigning,
    /// Broadcast succeeds but the transaction is never included.
    NeverIncluded,
}

struct Blocks {
    height: BlockNumber,
    by_number: HashMap<BlockNumber, BlockDetails>,
    by_hash: HashMap<BlockHash, BlockNumber>,
}

struct MockState {
    subscriptions: bool,
    balances: DashMap<AccountAddress, Balance>,
    nonces: DashMap<AccountAddress, u64>,
    identities: DashMap<AccountAddress, IdentityId>,
    primary_keys: DashMap<IdentityId, AccountAddress>,
    frozen: DashMap<IdentityId, bool>,
    roles: DashMap<IdentityId, Vec<Role>>,
    key_perms: DashMap<AccountAddress, Permissions>,
    agent_perms: DashMap<(IdentityId, AssetId), Permissions>,
    subsidies: DashMap<AccountAddress, Subsidy>,
    multisigs: DashMap<AccountAddress, MultiSigInfo>,
    coefficient: RwLock<Ratio>,
    base_fees: DashMap<TxTag, Balance>,
    gas_fee: RwLock<Balance>,
    outcomes: Mutex<VecDeque<MockOutcome>>,
    blocks: RwLock<Blocks>,
    /// Extrinsics waiting to be included in the next sealed block.
    pending: Mutex<Vec<(TxHash, Vec<ChainEvent>)>>,
    submitted: Mutex<Vec<(ComposedCall, AccountAddress, SigningOptions)>>,
}

impl MockState {
    fn tx_hash_for(&self, call: &ComposedCall, nonce: u64) -> TxHash {
        let mut hasher = blake3::Hasher::new();
        let encoded = serde_json::to_vec(call).expect("composed calls are serializable");
        hasher.update(&encoded);
        hasher.update(&nonce.to_le_bytes());
        TxHash(*hasher.finalize().as_bytes())
    }

    fn seal_block(&self, entries: Vec<(TxHash, Vec<ChainEvent>)>) -> BlockDetails {
        let mut blocks = self.blocks.write();
        blocks.height += 1;
        let number = blocks.height;
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"block");
        hasher.update(&number.to_le_bytes());
        let hash = BlockHash(*hasher.finalize().as_bytes());
        let extrinsics = entries
            .into_iter()
            .enumerate()
            .map(|(index, (tx_hash, events))| ExtrinsicEntry {
                tx_hash,
                index: index as u32,
                events,
            })
            .collect();
        let details = BlockDetails {
            hash,
            number,
            extrinsics,
        };
        tracing::debug!("sealed block {} with {} extrinsics", number, details.extrinsics.len());
        blocks.by_hash.insert(hash, number);
        blocks.by_number.insert(number, details.clone());
        details
    }

    fn next_outcome(&self) -> MockOutcome {
        self.outcomes.lock().pop_front().unwrap_or(MockOutcome::Finalize {
            events: vec![ChainEvent::ExtrinsicSuccess],
        })
    }

    fn record_submission(
        &self,
        call: &ComposedCall,
        signer: &AccountAddress,
        options: SigningOptions,
    ) {
        self.submitted
            .lock()
            .push((call.clone(), signer.clone(), options));
        *self.nonces.entry(signer.clone()).or_insert(0) += 1;
    }
}

/// In-memory scripted chain client.
#[derive(Clone)]
pub struct MockChain {
    state: Arc<MockState>,
}

impl MockChain {
    /// A mock chain whose client supports push subscriptions.
    pub fn new() -> Self {
        Self::build(true)
    }

    /// A mock chain whose client only supports fire-and-forget submission.
    pub fn polling() -> Self {
        Self::build(false)
    }

    fn build(subscriptions: bool) -> Self {
        Self {
            state: Arc::new(MockState {
                subscriptions,
                balances: DashMap::new(),
                nonces: DashMap::new(),
                identities: DashMap::new(),
                primary_keys: DashMap::new(),
                frozen: DashMap::new(),
                roles: DashMap::new(),
                key_perms: DashMap::new(),
                agent_perms: DashMap::new(),
                subsidies: DashMap::new(),
                multisigs: DashMap::new(),
                coefficient: RwLock::new(Ratio::new(1, 1)),
                base_fees: DashMap::new(),
                gas_fee: RwLock::new(500),
                outcomes: Mutex::new(VecDeque::new()),
                blocks: RwLock::new(Blocks {
                    height: 0,
                    by_number: HashMap::new(),
                    by_hash: HashMap::new(),
                }),
                pending: Mutex::new(Vec::new()),
                submitted: Mutex::new(Vec::new()),
            }),
        }
    }

    // --- state setup ---

    /// Register an identity with its primary key.
    pub fn register_identity(&self, identity: IdentityId, primary_key: AccountAddress) {
        self.state
            .identities
            .insert(primary_key.clone(), identity.clone());
        self.state.primary_keys.insert(identity, primary_key);
    }

    /// Attach a secondary key to an existing identity.
    pub fn attach_key(&self, address: AccountAddress, identity: IdentityId) {
        self.state.identities.insert(address, identity);
    }

    pub fn set_balance(&self, address: AccountAddress, balance: Balance) {
        self.state.balances.insert(address, balance);
    }

    pub fn freeze_secondary_keys(&self, identity: IdentityId) {
        self.state.frozen.insert(identity, true);
    }

    pub fn grant_role(&self, identity: IdentityId, role: Role) {
        self.state.roles.entry(identity).or_default().push(role);
    }

    pub fn set_key_permissions(&self, address: AccountAddress, permissions: Permissions) {
        self.state.key_perms.insert(address, permissions);
    }

    pub fn set_agent_permissions(
        &self,
        identity: IdentityId,
        asset: AssetId,
        permissions: Permissions,
    ) {
        self.state.agent_perms.insert((identity, asset), permissions);
    }

    pub fn set_subsidy(
        &self,
        beneficiary: AccountAddress,
        subsidizer: AccountAddress,
        allowance: Balance,
    ) {
        self.state.subsidies.insert(
            beneficiary,
            Subsidy {
                subsidizer,
                allowance,
            },
        );
    }

    /// Bind a signing key to a multisig account.
    pub fn bind_multisig(
        &self,
        signer: AccountAddress,
        multisig: AccountAddress,
        creator: AccountAddress,
    ) {
        self.state.multisigs.insert(
            signer,
            MultiSigInfo {
                address: multisig,
                creator,
            },
        );
    }

    pub fn set_fee_coefficient(&self, ratio: Ratio) {
        *self.state.coefficient.write() = ratio;
    }

    pub fn set_base_fee(&self, tag: TxTag, fee: Balance) {
        self.state.base_fees.insert(tag, fee);
    }

    pub fn set_gas_fee(&self, fee: Balance) {
        *self.state.gas_fee.write() = fee;
    }

    /// Script the outcome of the next submission.
    pub fn queue_outcome(&self, outcome: MockOutcome) {
        self.state.outcomes.lock().push_back(outcome);
    }

    // --- inspection ---

    /// Calls submitted so far, with signer and signing options.
    pub fn submitted(&self) -> Vec<(ComposedCall, AccountAddress, SigningOptions)> {
        self.state.submitted.lock().clone()
    }

    pub fn current_height(&self) -> BlockNumber {
        self.state.blocks.read().height
    }
}

impl Default for MockChain {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChainClient for MockChain {
    fn supports_subscriptions(&self) -> bool {
        self.state.subscriptions
    }

    fn compose(&self, tag: TxTag, args: Value) -> Result<ComposedCall, ClientError> {
        Ok(ComposedCall::Call { tag, args })
    }

    fn compose_batch(
        &self,
        calls: Vec<ComposedCall>,
        atomic: bool,
    ) -> Result<ComposedCall, ClientError> {
        if calls.is_empty() {
            return Err(ClientError::InvalidCall("empty batch".into()));
        }
        Ok(ComposedCall::Batch { calls, atomic })
    }

    async fn sign_and_subscribe(
        &self,
        call: &ComposedCall,
        signer: &AccountAddress,
        options: SigningOptions,
    ) -> Result<TxSubscription, ClientError> {
        let outcome = self.state.next_outcome();
        if matches!(outcome, MockOutcome::RejectSigning) {
            return Err(ClientError::SignerRejected);
        }
        self.state.record_submission(call, signer, options);

        let tx_hash = self.state.tx_hash_for(call, options.nonce);
        let (tx, rx) = mpsc::unbounded_channel();
        let state = self.state.clone();
        let handle = tokio::spawn(async move {
            let _ = tx.send(TxUpdate::Broadcast { tx_hash });
            tokio::time::sleep(Duration::from_millis(2)).await;
            match outcome {
                MockOutcome::TransportError { message } => {
                    let _ = tx.send(TxUpdate::Error { message });
                }
                MockOutcome::NeverIncluded => {
                    // Keep the stream open long enough for mortality logic
                    // elsewhere; then end it without inclusion.
                    tokio::time::sleep(Duration::from_millis(50)).await;
                }
                MockOutcome::Finalize { events } => {
                    let block = state.seal_block(vec![(tx_hash, events)]);
                    let _ = tx.send(TxUpdate::InBlock { block_hash: block.hash });
                    tokio::time::sleep(Duration::from_millis(2)).await;
                    let _ = tx.send(TxUpdate::Finalized { block_hash: block.hash });
                }
                MockOutcome::FailWith { error } => {
                    let events = vec![ChainEvent::ExtrinsicFailed { error }];
                    let block = state.seal_block(vec![(tx_hash, events)]);
                    let _ = tx.send(TxUpdate::InBlock { block_hash: block.hash });
                    tokio::time::sleep(Duration::from_millis(2)).await;
                    let _ = tx.send(TxUpdate::Finalized { block_hash: block.hash });
                }
                MockOutcome::FailWithoutFinality { error } => {
                    let events = vec![ChainEvent::ExtrinsicFailed { error }];
                    let block = state.seal_block(vec![(tx_hash, events)]);
                    let _ = tx.send(TxUpdate::InBlock { block_hash: block.hash });
                    tokio::time::sleep(Duration::from_millis(50)).await;
                }
                MockOutcome::RejectSigning => unreachable!("handled before subscribing"),
            }
        });

        Ok(TxSubscription::new(rx, move || handle.abort()))
    }

    async fn sign_and_send(
        &self,
        call: &ComposedCall,
        signer: &AccountAddress,
        options: SigningOptions,
    ) -> Result<TxHash, ClientError> {
        let outcome = self.state.next_outcome();
        match outcome {
            MockOutcome::RejectSigning => return Err(ClientError::SignerRejected),
            MockOutcome::TransportError { message } => {
                return Err(ClientError::Transport(message))
            }
            _ => {}
        }
        self.state.record_submission(call, signer, options);

        let tx_hash = self.state.tx_hash_for(call, options.nonce);
        match outcome {
            MockOutcome::Finalize { events } => {
                self.state.pending.lock().push((tx_hash, events));
            }
            MockOutcome::FailWith { error } | MockOutcome::FailWithoutFinality { error } => {
                self.state
                    .pending
                    .lock()
                    .push((tx_hash, vec![ChainEvent::ExtrinsicFailed { error }]));
            }
            MockOutcome::NeverIncluded => {}
            _ => unreachable!("handled above"),
        }
        Ok(tx_hash)
    }

    async fn estimate_fee(
        &self,
        _call: &ComposedCall,
        _payer: &AccountAddress,
    ) -> Result<Balance, ClientError> {
        Ok(*self.state.gas_fee.read())
    }

    async fn latest_block(&self) -> Result<BlockInfo, ClientError> {
        // Each poll advances the chain by one block, including anything
        // pending from fire-and-forget submissions.
        let pending = std::mem::take(&mut *self.state.pending.lock());
        let block = self.state.seal_block(pending);
        Ok(BlockInfo {
            hash: block.hash,
            number: block.number,
        })
    }

    async fn block_by_hash(
        &self,
        hash: &BlockHash,
    ) -> Result<Option<BlockDetails>, ClientError> {
        let blocks = self.state.blocks.read();
        Ok(blocks
            .by_hash
            .get(hash)
            .and_then(|number| blocks.by_number.get(number))
            .cloned())
    }

    async fn block_by_number(
        &self,
        number: BlockNumber,
    ) -> Result<Option<BlockDetails>, ClientError> {
        Ok(self.state.blocks.read().by_number.get(&number).cloned())
    }

    async fn next_nonce(&self, address: &AccountAddress) -> Result<u64, ClientError> {
        Ok(self.state.nonces.get(address).map(|n| *n).unwrap_or(0))
    }

    async fn fee_coefficient(&self) -> Result<Ratio, ClientError> {
        Ok(*self.state.coefficient.read())
    }

    async fn base_fee(&self, tag: TxTag) -> Result<Balance, ClientError> {
        Ok(self.state.base_fees.get(&tag).map(|f| *f).unwrap_or(0))
    }

    async fn free_balance(&self, address: &AccountAddress) -> Result<Balance, ClientError> {
        Ok(self.state.balances.get(address).map(|b| *b).unwrap_or(0))
    }

    async fn subsidy_of(
        &self,
        address: &AccountAddress,
    ) -> Result<Option<Subsidy>, ClientError> {
        Ok(self.state.subsidies.get(address).map(|s| s.clone()))
    }

    async fn identity_of(
        &self,
        address: &AccountAddress,
    ) -> Result<Option<IdentityId>, ClientError> {
        Ok(self.state.identities.get(address).map(|i| i.clone()))
    }

    async fn primary_key(
        &self,
        identity: &IdentityId,
    ) -> Result<AccountAddress, ClientError> {
        self.state
            .primary_keys
            .get(identity)
            .map(|k| k.clone())
            .ok_or_else(|| ClientError::NotFound(format!("identity {}", identity)))
    }

    async fn secondary_keys_frozen(&self, identity: &IdentityId) -> Result<bool, ClientError> {
        Ok(self.state.frozen.get(identity).map(|f| *f).unwrap_or(false))
    }

    async fn has_role(&self, identity: &IdentityId, role: &Role) -> Result<bool, ClientError> {
        Ok(self
            .state
            .roles
            .get(identity)
            .map(|roles| roles.contains(role))
            .unwrap_or(false))
    }

    async fn key_permissions(
        &self,
        address: &AccountAddress,
    ) -> Result<Permissions, ClientError> {
        if let Some(permissions) = self.state.key_perms.get(address) {
            return Ok(permissions.clone());
        }
        // Unregistered keys and primary keys default to full access.
        Ok(Permissions::full())
    }

    async fn agent_permissions(
        &self,
        identity: &IdentityId,
        asset: &AssetId,
    ) -> Result<Option<Permissions>, ClientError> {
        let owner = Role::AssetOwner {
            asset: asset.clone(),
        };
        if self.has_role(identity, &owner).await? {
            return Ok(Some(Permissions::full()));
        }
        Ok(self
            .state
            .agent_perms
            .get(&(identity.clone(), asset.clone()))
            .map(|p| p.clone()))
    }

    async fn multisig_of(
        &self,
        address: &AccountAddress,
    ) -> Result<Option<MultiSigInfo>, ClientError> {
        Ok(self.state.multisigs.get(address).map(|m| m.clone()))
    }
}

/// Scripted read replica.
pub struct MockMiddleware {
    heights: Mutex<VecDeque<BlockNumber>>,
    last: Mutex<Option<BlockNumber>>,
    failing: bool,
}

impl MockMiddleware {
    /// Reports these synced heights in order, then repeats the last one.
    pub fn with_heights(heights: impl IntoIterator<Item = BlockNumber>) -> Self {
        Self {
            heights: Mutex::new(heights.into_iter().collect()),
            last: Mutex::new(None),
            failing: false,
        }
    }

    /// Every query errors.
    pub fn failing() -> Self {
        Self {
            heights: Mutex::new(VecDeque::new()),
            last: Mutex::new(None),
            failing: true,
        }
    }
}

#[async_trait]
impl MiddlewareClient for MockMiddleware {
    async fn latest_synced_block(&self) -> Result<BlockNumber, ClientError> {
        if self.failing {
            return Err(ClientError::Transport("middleware unreachable".into()));
        }
        let mut heights = self.heights.lock();
        let mut last = self.last.lock();
        if let Some(height) = heights.pop_front() {
            *last = Some(height);
            return Ok(height);
        }
        (*last).ok_or_else(|| ClientError::NotFound("no synced height scripted".into()))
    }
}
