//! Ledger Client - Collaborator interfaces consumed by the runtime
//!
//! The runtime never talks to a wire protocol directly. Everything it needs
//! from the chain goes through [`ChainClient`], and everything it needs from
//! the read replica goes through [`MiddlewareClient`]. In-memory
//! implementations for tests live in [`mock`].

pub mod error;
pub mod mock;

pub use error::ClientError;

use async_trait::async_trait;
use ledger_types::{
    AccountAddress, AssetId, Balance, BlockDetails, BlockHash, BlockInfo, BlockNumber,
    ComposedCall, IdentityId, Mortality, MultiSigInfo, Permissions, Ratio, Role, Subsidy,
    TxHash, TxTag,
};
use serde_json::Value;
use tokio::sync::mpsc;

/// Signing parameters committed at submission time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SigningOptions {
    pub nonce: u64,
    pub mortality: Mortality,
}

/// Progress update for a submitted transaction.
#[derive(Debug, Clone, PartialEq)]
pub enum TxUpdate {
    /// The transaction was signed and broadcast; a hash is known.
    Broadcast { tx_hash: TxHash },
    /// The transaction was included in a block (not yet finalized).
    InBlock { block_hash: BlockHash },
    /// The block containing the transaction was finalized.
    Finalized { block_hash: BlockHash },
    /// A transport-level error receipt; the submission is over.
    Error { message: String },
}

/// Live subscription to a submitted transaction's progress.
///
/// Dropping the subscription unsubscribes.
pub struct TxSubscription {
    updates: mpsc::UnboundedReceiver<TxUpdate>,
    on_unsubscribe: Option<Box<dyn FnOnce() + Send>>,
}

impl TxSubscription {
    pub fn new(
        updates: mpsc::UnboundedReceiver<TxUpdate>,
        on_unsubscribe: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            updates,
            on_unsubscribe: Some(Box::new(on_unsubscribe)),
        }
    }

    /// Next progress update, or `None` if the stream ended.
    pub async fn next(&mut self) -> Option<TxUpdate> {
        self.updates.recv().await
    }

    /// Stop listening.
    pub fn unsubscribe(mut self) {
        if let Some(hook) = self.on_unsubscribe.take() {
            hook();
        }
    }
}

impl std::fmt::Debug for TxSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TxSubscription").finish_non_exhaustive()
    }
}

impl Drop for TxSubscription {
    fn drop(&mut self) {
        if let Some(hook) = self.on_unsubscribe.take() {
            hook();
        }
    }
}

/// Everything the runtime consumes from the ledger.
///
/// Implementations wrap the chain's RPC layer; the runtime only depends on
/// this trait.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Whether the client supports push subscriptions for submissions.
    fn supports_subscriptions(&self) -> bool;

    /// Compose a signable call from an operation tag and arguments.
    fn compose(&self, tag: TxTag, args: Value) -> Result<ComposedCall, ClientError>;

    /// Compose a batch sharing one signature and nonce. Atomic batches roll
    /// back entirely if any inner operation fails.
    fn compose_batch(
        &self,
        calls: Vec<ComposedCall>,
        atomic: bool,
    ) -> Result<ComposedCall, ClientError>;

    /// Sign, submit and subscribe to progress updates.
    async fn sign_and_subscribe(
        &self,
        call: &ComposedCall,
        signer: &AccountAddress,
        options: SigningOptions,
    ) -> Result<TxSubscription, ClientError>;

    /// Sign and submit once, returning the transaction hash.
    async fn sign_and_send(
        &self,
        call: &ComposedCall,
        signer: &AccountAddress,
        options: SigningOptions,
    ) -> Result<TxHash, ClientError>;

    /// Dry-run fee estimation for the fully composed call.
    async fn estimate_fee(
        &self,
        call: &ComposedCall,
        payer: &AccountAddress,
    ) -> Result<Balance, ClientError>;

    /// Latest finalized block header.
    async fn latest_block(&self) -> Result<BlockInfo, ClientError>;

    /// Full block by hash.
    async fn block_by_hash(&self, hash: &BlockHash)
        -> Result<Option<BlockDetails>, ClientError>;

    /// Full block by number.
    async fn block_by_number(
        &self,
        number: BlockNumber,
    ) -> Result<Option<BlockDetails>, ClientError>;

    /// Next nonce for an account.
    async fn next_nonce(&self, address: &AccountAddress) -> Result<u64, ClientError>;

    // --- governance and chain-state reads ---

    /// Governance coefficient scaling protocol base fees.
    async fn fee_coefficient(&self) -> Result<Ratio, ClientError>;

    /// Governance base fee for an operation kind.
    async fn base_fee(&self, tag: TxTag) -> Result<Balance, ClientError>;

    /// Free balance of an account.
    async fn free_balance(&self, address: &AccountAddress) -> Result<Balance, ClientError>;

    /// Active subsidy covering an account's fees, if any.
    async fn subsidy_of(&self, address: &AccountAddress)
        -> Result<Option<Subsidy>, ClientError>;

    /// Identity associated with a signing key, if any.
    async fn identity_of(
        &self,
        address: &AccountAddress,
    ) -> Result<Option<IdentityId>, ClientError>;

    /// Primary key of an identity.
    async fn primary_key(&self, identity: &IdentityId)
        -> Result<AccountAddress, ClientError>;

    /// Whether an identity's secondary keys are frozen.
    async fn secondary_keys_frozen(&self, identity: &IdentityId) -> Result<bool, ClientError>;

    /// Whether an identity holds a role.
    async fn has_role(&self, identity: &IdentityId, role: &Role) -> Result<bool, ClientError>;

    /// Permissions of a signing key (full for primary keys).
    async fn key_permissions(
        &self,
        address: &AccountAddress,
    ) -> Result<Permissions, ClientError>;

    /// Agent-group permissions an identity holds over an asset, if it is an
    /// agent at all.
    async fn agent_permissions(
        &self,
        identity: &IdentityId,
        asset: &AssetId,
    ) -> Result<Option<Permissions>, ClientError>;

    /// Multisig account a signing key belongs to, if any.
    async fn multisig_of(
        &self,
        address: &AccountAddress,
    ) -> Result<Option<MultiSigInfo>, ClientError>;
}

/// The read replica: one query, its currently-synced block height.
#[async_trait]
pub trait MiddlewareClient: Send + Sync {
    async fn latest_synced_block(&self) -> Result<BlockNumber, ClientError>;
}
