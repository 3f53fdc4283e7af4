//! Procedures - Declarative recipes compiled into transactions
//!
//! A procedure declares three things: what it requires of the caller,
//! what chain state it reads, and which operations it emits. Preparing a
//! procedure runs authorization against live chain state, compiles the
//! operations into one signable call, resolves the nonce and hands back a
//! run-once [`Transaction`].

use crate::authorization::{check_authorization, ProcedureAuthorization};
use crate::context::Context;
use crate::error::{Error, Result};
use crate::spec::{OperationSet, ProcedureSpec};
use crate::transaction::{Transaction, TxParams};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use ledger_types::{AccountAddress, Mortality, TxReceipt};

/// Where the signing nonce comes from.
pub enum NonceSource {
    /// Query the chain at preparation time.
    Chain,
    /// Use this exact value.
    Literal(u64),
    /// Call out at preparation time (e.g. an external counter).
    Lazy(Box<dyn FnOnce() -> u64 + Send>),
    /// Await an in-flight computation at preparation time.
    Deferred(BoxFuture<'static, Result<u64>>),
}

impl Default for NonceSource {
    fn default() -> Self {
        NonceSource::Chain
    }
}

impl NonceSource {
    async fn resolve(self, context: &Context, signer: &AccountAddress) -> Result<u64> {
        match self {
            NonceSource::Chain => Ok(context.chain().next_nonce(signer).await?),
            NonceSource::Literal(nonce) => Ok(nonce),
            NonceSource::Lazy(f) => Ok(f()),
            NonceSource::Deferred(fut) => fut.await,
        }
    }
}

/// Per-preparation choices: who signs, and how.
pub struct PrepareOptions {
    pub signing_account: AccountAddress,
    pub nonce: NonceSource,
    pub mortality: Mortality,
    /// Expiry attached when the call ends up wrapped as a multisig
    /// proposal; ignored otherwise.
    pub proposal_expiry: Option<DateTime<Utc>>,
}

impl PrepareOptions {
    pub fn new(signing_account: AccountAddress) -> Self {
        Self {
            signing_account,
            nonce: NonceSource::default(),
            mortality: Mortality::default(),
            proposal_expiry: None,
        }
    }

    pub fn with_nonce(mut self, nonce: NonceSource) -> Self {
        self.nonce = nonce;
        self
    }

    pub fn with_mortality(mut self, mortality: Mortality) -> Self {
        self.mortality = mortality;
        self
    }

    pub fn with_proposal_expiry(mut self, expiry: DateTime<Utc>) -> Self {
        self.proposal_expiry = Some(expiry);
        self
    }
}

/// A reusable recipe for one ledger state change.
///
/// `Storage` is loaded exactly once per preparation and shared between
/// the authorization step and the body.
#[async_trait]
pub trait Procedure: Send + Sync {
    type Args: Send + Sync;
    type Output: Send + Sync + 'static;
    type Storage: Send + Sync;

    /// Fetch whatever chain state the procedure needs.
    async fn load_storage(&self, args: &Self::Args, context: &Context) -> Result<Self::Storage>;

    /// What the caller must hold to run this.
    async fn authorization(
        &self,
        args: &Self::Args,
        storage: &Self::Storage,
        context: &Context,
    ) -> Result<ProcedureAuthorization>;

    /// Emit the operations and the output resolver.
    async fn body(
        &self,
        args: &Self::Args,
        storage: &Self::Storage,
        context: &Context,
    ) -> Result<ProcedureSpec<Self::Output>>;
}

/// Preparation entry points, blanket-implemented for every procedure.
#[async_trait]
pub trait ProcedureExt: Procedure {
    /// Run only the authorization step, without preparing anything.
    async fn check_authorization(
        &self,
        args: &Self::Args,
        context: &Context,
        signer: &AccountAddress,
    ) -> Result<()> {
        let storage = self.load_storage(args, context).await?;
        let auth = self.authorization(args, &storage, context).await?;
        verify_authorization(&auth, signer, context).await
    }

    /// Authorize, run the body and compile it into a transaction.
    async fn prepare(
        &self,
        args: Self::Args,
        context: &Context,
        options: PrepareOptions,
    ) -> Result<Transaction<Self::Output>> {
        self.prepare_mapped(args, context, options, Ok).await
    }

    /// Like [`prepare`](Self::prepare), but the transaction resolves to
    /// `transform` applied to the procedure's output.
    async fn prepare_mapped<U, F>(
        &self,
        args: Self::Args,
        context: &Context,
        options: PrepareOptions,
        transform: F,
    ) -> Result<Transaction<U>>
    where
        U: Send + Sync + 'static,
        F: FnOnce(Self::Output) -> Result<U> + Send + 'static,
    {
        let storage = self.load_storage(&args, context).await?;
        let auth = self.authorization(&args, &storage, context).await?;
        verify_authorization(&auth, &options.signing_account, context).await?;

        let spec = self.body(&args, &storage, context).await?;
        let nonce = options
            .nonce
            .resolve(context, &options.signing_account)
            .await?;

        let chain = context.chain();
        // A batch stays a batch on the wire, even with one element.
        let (call, operations) = match spec.operations {
            OperationSet::Single(op) => {
                let call = chain.compose(op.tag, op.args.clone())?;
                (call, vec![op])
            }
            OperationSet::Batch(ops) => {
                let calls = ops
                    .iter()
                    .map(|op| chain.compose(op.tag, op.args.clone()))
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                // A batch where everything is critical rolls back as one.
                let atomic = ops.iter().all(|op| op.is_critical);
                (chain.compose_batch(calls, atomic)?, ops)
            }
        };
        let multisig = chain.multisig_of(&options.signing_account).await?;

        let resolver = spec.resolver;
        let finalizer: Box<dyn FnOnce(&TxReceipt) -> Result<U> + Send> =
            Box::new(move |receipt| resolver.resolve(receipt).and_then(transform));

        Ok(Transaction::from_params(TxParams {
            context: context.clone(),
            call,
            operations,
            signer: options.signing_account,
            nonce,
            mortality: options.mortality,
            multisig,
            paid_for_by: spec.paid_for_by,
            proposal_expiry: options.proposal_expiry,
            finalizer,
        }))
    }
}

impl<P: Procedure + ?Sized> ProcedureExt for P {}

/// Collapse the authorization axes into the first failing error, checked
/// in severity order.
async fn verify_authorization(
    auth: &ProcedureAuthorization,
    signer: &AccountAddress,
    context: &Context,
) -> Result<()> {
    let outcome = check_authorization(auth, signer, context.chain().as_ref()).await?;

    if outcome.no_identity {
        return Err(Error::NoIdentity(signer.clone()));
    }
    if outcome.account_frozen {
        return Err(Error::AccountFrozen(signer.clone()));
    }
    if !outcome.roles.satisfied {
        return Err(match outcome.roles.message {
            Some(message) => Error::Validation(message),
            None => Error::MissingRoles(outcome.roles.missing),
        });
    }
    if !outcome.signer_permissions.satisfied {
        return Err(Error::MissingPermissions {
            axis: "signer",
            missing: outcome.signer_permissions.missing.unwrap_or_default(),
        });
    }
    if !outcome.agent_permissions.satisfied {
        return Err(Error::MissingPermissions {
            axis: "agent",
            missing: outcome.agent_permissions.missing.unwrap_or_default(),
        });
    }
    Ok(())
}
