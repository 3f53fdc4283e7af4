//! Transactions - The lifecycle engine
//!
//! A [`Transaction`] is the runnable handle a prepared procedure hands
//! back. It runs at most once, walks a fixed status machine, fans out
//! status changes to listeners, and resolves the procedure's output from
//! the finalized receipt. When the signing key belongs to a multisig the
//! call must go through [`Transaction::run_as_proposal`] instead.

use crate::context::Context;
use crate::error::{Error, Result};
use crate::fees::{
    assert_solvency, estimate_fees, resolve_paying_account, FeeEstimate,
};
use crate::middleware::{watch_sync, MiddlewareNotifier};
use crate::multisig::{wrap_as_proposal, MultiSigProposal};
use crate::spec::Operation;
use crate::submit::submit;
use chrono::{DateTime, Utc};
use ledger_client::SigningOptions;
use ledger_types::{
    AccountAddress, BlockHash, BlockNumber, ComposedCall, Mortality, MultiSigInfo, TxHash,
    TxReceipt,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Where a transaction is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStatus {
    /// Constructed, not yet run.
    Idle,
    /// Submitted to the signer, awaiting signature and broadcast.
    Unapproved,
    /// Broadcast; a hash is known.
    Running,
    /// Finalized and executed successfully.
    Succeeded,
    /// Finalized but the extrinsic failed on-chain, or a check failed.
    Failed,
    /// Lost in transit or expired before inclusion.
    Aborted,
    /// The signer declined to sign.
    Rejected,
}

impl TransactionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TransactionStatus::Succeeded
                | TransactionStatus::Failed
                | TransactionStatus::Aborted
                | TransactionStatus::Rejected
        )
    }
}

/// Handle returned by [`Transaction::on_status_change`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerId(u64);

type Finalizer<T> = Box<dyn FnOnce(&TxReceipt) -> Result<T> + Send>;
type StatusListener<T> = Arc<dyn Fn(&Transaction<T>) + Send + Sync>;

#[derive(Default)]
struct TxState {
    status: Option<TransactionStatus>,
    error: Option<Error>,
    tx_hash: Option<TxHash>,
    block_hash: Option<BlockHash>,
    block_number: Option<BlockNumber>,
    tx_index: Option<u32>,
    receipt: Option<TxReceipt>,
}

/// Everything a compiled procedure passes into the transaction.
pub(crate) struct TxParams<T> {
    pub context: Context,
    pub call: ComposedCall,
    pub operations: Vec<Operation>,
    pub signer: AccountAddress,
    pub nonce: u64,
    pub mortality: Mortality,
    pub multisig: Option<MultiSigInfo>,
    pub paid_for_by: Option<AccountAddress>,
    pub proposal_expiry: Option<DateTime<Utc>>,
    pub finalizer: Finalizer<T>,
}

/// A run-once handle for one signed submission.
pub struct Transaction<T: Send + Sync + 'static> {
    context: Context,
    call: ComposedCall,
    operations: Vec<Operation>,
    signer: AccountAddress,
    nonce: u64,
    mortality: Mortality,
    multisig: Option<MultiSigInfo>,
    paid_for_by: Option<AccountAddress>,
    proposal_expiry: Option<DateTime<Utc>>,
    ran: AtomicBool,
    state: Mutex<TxState>,
    finalizer: Mutex<Option<Finalizer<T>>>,
    output: Mutex<Option<T>>,
    listeners: Mutex<Vec<(u64, StatusListener<T>)>>,
    next_listener: AtomicU64,
    middleware_sync: Arc<MiddlewareNotifier>,
}

impl<T: Send + Sync + 'static> std::fmt::Debug for Transaction<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("signer", &self.signer)
            .field("nonce", &self.nonce)
            .field("status", &self.status())
            .field("tx_hash", &self.tx_hash())
            .finish_non_exhaustive()
    }
}

impl<T: Send + Sync + 'static> Transaction<T> {
    pub(crate) fn from_params(params: TxParams<T>) -> Self {
        Self {
            context: params.context,
            call: params.call,
            operations: params.operations,
            signer: params.signer,
            nonce: params.nonce,
            mortality: params.mortality,
            multisig: params.multisig,
            paid_for_by: params.paid_for_by,
            proposal_expiry: params.proposal_expiry,
            ran: AtomicBool::new(false),
            state: Mutex::new(TxState {
                status: Some(TransactionStatus::Idle),
                ..TxState::default()
            }),
            finalizer: Mutex::new(Some(params.finalizer)),
            output: Mutex::new(None),
            listeners: Mutex::new(Vec::new()),
            next_listener: AtomicU64::new(1),
            middleware_sync: Arc::new(MiddlewareNotifier::new()),
        }
    }

    // --- getters ---

    pub fn status(&self) -> TransactionStatus {
        self.state.lock().status.unwrap_or(TransactionStatus::Idle)
    }

    /// The error that terminated this transaction, if any.
    pub fn error(&self) -> Option<Error> {
        self.state.lock().error.clone()
    }

    pub fn tx_hash(&self) -> Option<TxHash> {
        self.state.lock().tx_hash
    }

    pub fn block_hash(&self) -> Option<BlockHash> {
        self.state.lock().block_hash
    }

    pub fn block_number(&self) -> Option<BlockNumber> {
        self.state.lock().block_number
    }

    pub fn tx_index(&self) -> Option<u32> {
        self.state.lock().tx_index
    }

    pub fn receipt(&self) -> Option<TxReceipt> {
        self.state.lock().receipt.clone()
    }

    pub fn signing_address(&self) -> &AccountAddress {
        &self.signer
    }

    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    pub fn mortality(&self) -> Mortality {
        self.mortality
    }

    /// The multisig the signing key belongs to, if any.
    pub fn multisig(&self) -> Option<&MultiSigInfo> {
        self.multisig.as_ref()
    }

    /// The call as composed by the procedure, before any proposal wrapping.
    pub fn call(&self) -> &ComposedCall {
        &self.call
    }

    pub fn is_success(&self) -> bool {
        self.status() == TransactionStatus::Succeeded
    }

    /// The resolved output of a successful [`run`](Self::run).
    ///
    /// Errors until the transaction has succeeded, and always errors for
    /// multisig signers; the proposal handle is returned by
    /// [`run_as_proposal`](Self::run_as_proposal) directly.
    pub fn result(&self) -> Result<T>
    where
        T: Clone,
    {
        if self.multisig.is_some() {
            return Err(Error::General(
                "a multisig proposal has no output; run_as_proposal returns the proposal handle"
                    .into(),
            ));
        }
        if !self.is_success() {
            return Err(Error::General("the transaction has not succeeded".into()));
        }
        self.output
            .lock()
            .clone()
            .ok_or_else(|| Error::General("the transaction has not succeeded".into()))
    }

    // --- fees ---

    /// Estimate fees and resolve the paying account from live chain state.
    ///
    /// The payer is resolved fresh on every call; subsidies granted or
    /// revoked since preparation are picked up.
    pub async fn get_total_fees(&self) -> Result<FeeEstimate> {
        let call = self.submittable_call();
        let chain = self.context.chain();
        let fees = estimate_fees(chain.as_ref(), &call, &self.operations, &self.signer).await?;
        let payer = resolve_paying_account(
            chain.as_ref(),
            &self.signer,
            self.paid_for_by.as_ref(),
            self.multisig.as_ref(),
        )
        .await?;
        let payer_balance = chain.free_balance(payer.address()).await?;
        Ok(FeeEstimate {
            fees,
            payer,
            payer_balance,
        })
    }

    // --- listeners ---

    /// Subscribe to status changes. The listener observes the transaction
    /// after each change; block context is already set when `Succeeded` or
    /// `Failed` is observed.
    pub fn on_status_change(
        &self,
        listener: impl Fn(&Transaction<T>) + Send + Sync + 'static,
    ) -> ListenerId {
        let id = self.next_listener.fetch_add(1, Ordering::SeqCst);
        self.listeners.lock().push((id, Arc::new(listener)));
        ListenerId(id)
    }

    pub fn unsubscribe(&self, id: ListenerId) {
        self.listeners.lock().retain(|(lid, _)| *lid != id.0);
    }

    /// Subscribe to the one-shot replica sync notification emitted after
    /// this transaction finalizes. Errors if the context has no middleware.
    pub fn on_processed_by_middleware(
        &self,
        listener: impl FnOnce(Option<&Error>) + Send + 'static,
    ) -> Result<()> {
        if !self.context.middleware_enabled() {
            return Err(Error::General(
                "no middleware configured on this context".into(),
            ));
        }
        self.middleware_sync.subscribe(Box::new(listener));
        Ok(())
    }

    // --- running ---

    /// Run the transaction to finalization and resolve the output.
    pub async fn run(&self) -> Result<T>
    where
        T: Clone,
    {
        if self.multisig.is_some() {
            let err = Error::Validation(
                "the signing account is part of a multisig; use run_as_proposal".into(),
            );
            return Err(err);
        }

        let receipt = self.execute(self.call.clone()).await?;

        let finalizer = self
            .finalizer
            .lock()
            .take()
            .ok_or_else(|| Error::General("transaction already ran".into()))?;
        match finalizer(&receipt) {
            Ok(value) => {
                *self.output.lock() = Some(value.clone());
                self.enter_terminal(TransactionStatus::Succeeded, None);
                Ok(value)
            }
            Err(err) => {
                self.enter_terminal(TransactionStatus::Failed, Some(err.clone()));
                Err(err)
            }
        }
    }

    /// Run as a multisig proposal. The call is wrapped into a
    /// create-proposal submission; the output resolver never runs because
    /// the wrapped call has not executed yet.
    pub async fn run_as_proposal(&self) -> Result<MultiSigProposal> {
        let info = match &self.multisig {
            Some(info) => info.clone(),
            None => {
                return Err(Error::Validation(
                    "the signing account is not part of a multisig; use run".into(),
                ))
            }
        };

        let wrapped = wrap_as_proposal(&self.call, &info, self.proposal_expiry);
        let receipt = self.execute(wrapped).await?;

        match receipt.proposal_added() {
            Some((multisig, id)) => {
                let proposal = MultiSigProposal {
                    multisig_address: multisig.clone(),
                    id,
                };
                self.enter_terminal(TransactionStatus::Succeeded, None);
                Ok(proposal)
            }
            None => {
                let err = Error::Unexpected(
                    "proposal submission finalized without a proposal event".into(),
                );
                self.enter_terminal(TransactionStatus::Failed, Some(err.clone()));
                Err(err)
            }
        }
    }

    // --- internals ---

    fn submittable_call(&self) -> ComposedCall {
        match &self.multisig {
            Some(info) => wrap_as_proposal(&self.call, info, self.proposal_expiry),
            None => self.call.clone(),
        }
    }

    /// Check solvency, submit and wait for the finalized receipt. Returns
    /// an error with the terminal status already applied, except for the
    /// success path where the caller decides between resolving the output
    /// first and flipping to `Succeeded` after.
    async fn execute(&self, call: ComposedCall) -> Result<TxReceipt> {
        if self.ran.swap(true, Ordering::SeqCst) {
            return Err(Error::General("transaction already ran".into()));
        }

        let chain = self.context.chain().clone();

        // Solvency gate. Failing here goes straight to Failed; the signer
        // was never asked for anything.
        let solvency = async {
            let fees = estimate_fees(chain.as_ref(), &call, &self.operations, &self.signer).await?;
            let payer = resolve_paying_account(
                chain.as_ref(),
                &self.signer,
                self.paid_for_by.as_ref(),
                self.multisig.as_ref(),
            )
            .await?;
            assert_solvency(chain.as_ref(), &payer, &fees, &call.tags()).await
        };
        if let Err(err) = solvency.await {
            self.enter_terminal(TransactionStatus::Failed, Some(err.clone()));
            return Err(err);
        }

        self.set_status(TransactionStatus::Unapproved);

        let options = SigningOptions {
            nonce: self.nonce,
            mortality: self.mortality,
        };
        let outcome = submit(
            &chain,
            &call,
            &self.signer,
            options,
            self.context.config().poll_interval(),
            |tx_hash| {
                self.state.lock().tx_hash = Some(tx_hash);
                self.set_status(TransactionStatus::Running);
            },
        )
        .await;

        let receipt = match outcome {
            Ok(receipt) => receipt,
            Err(err) => {
                let status = match &err {
                    Error::RejectedBySigner => TransactionStatus::Rejected,
                    Error::Aborted(_) => TransactionStatus::Aborted,
                    _ => TransactionStatus::Failed,
                };
                self.enter_terminal(status, Some(err.clone()));
                return Err(err);
            }
        };

        // Block context lands before any terminal notification goes out.
        {
            let mut state = self.state.lock();
            state.tx_hash = Some(receipt.tx_hash);
            state.block_hash = Some(receipt.block_hash);
            state.block_number = Some(receipt.block_number);
            state.tx_index = Some(receipt.tx_index);
            state.receipt = Some(receipt.clone());
        }

        if let Some(failure) = receipt.failure() {
            let err = Error::Reverted(failure.clone());
            self.enter_terminal(TransactionStatus::Failed, Some(err.clone()));
            return Err(err);
        }

        Ok(receipt)
    }

    fn set_status(&self, status: TransactionStatus) {
        tracing::debug!("transaction {} -> {:?}", self.signer, status);
        self.state.lock().status = Some(status);
        self.notify_listeners();
    }

    fn enter_terminal(&self, status: TransactionStatus, error: Option<Error>) {
        match &error {
            Some(err) => tracing::info!("transaction {} -> {:?}: {}", self.signer, status, err),
            None => tracing::info!("transaction {} -> {:?}", self.signer, status),
        }
        {
            let mut state = self.state.lock();
            state.status = Some(status);
            state.error = error;
        }
        self.notify_listeners();

        // The replica sync notification fires once per run, whatever the
        // outcome; execute() reaches a terminal status exactly once.
        if let Some(middleware) = self.context.middleware() {
            let config = self.context.config();
            tokio::spawn(watch_sync(
                self.context.chain().clone(),
                middleware.clone(),
                self.middleware_sync.clone(),
                config.middleware_sync_attempts,
                config.middleware_retry_delay(),
            ));
        }
    }

    fn notify_listeners(&self) {
        let snapshot: Vec<StatusListener<T>> = self
            .listeners
            .lock()
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();
        for listener in snapshot {
            listener(self);
        }
    }
}
