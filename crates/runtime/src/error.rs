//! Runtime Errors
//!
//! The full error taxonomy for procedure preparation and transaction
//! execution. Authorization failures get a distinct variant per axis so
//! callers can tell a frozen account from missing roles.

use ledger_client::ClientError;
use ledger_types::{AccountAddress, Balance, OnChainError, RequiredPermissions, Role};
use thiserror::Error;

/// Runtime errors.
#[derive(Error, Debug, Clone)]
pub enum Error {
    /// Bad input, detected before anything is submitted.
    #[error("validation error: {0}")]
    Validation(String),

    /// A prerequisite is not met (e.g. insufficient subsidy allowance).
    #[error("unmet prerequisite: {0}")]
    UnmetPrerequisite(String),

    /// The paying account cannot cover the fees.
    #[error("insufficient balance: {role} account {address} holds {free} but {required} is required")]
    InsufficientBalance {
        /// Payer arrangement (caller, subsidizer, multisig creator, ...).
        role: &'static str,
        address: AccountAddress,
        free: Balance,
        required: Balance,
    },

    /// Transport failure or mortality expiry while the call was in flight.
    #[error("transaction aborted: {0}")]
    Aborted(String),

    /// The signer declined to sign.
    #[error("transaction rejected by signer")]
    RejectedBySigner,

    /// The call executed and failed on-chain.
    #[error("transaction reverted: {0}")]
    Reverted(OnChainError),

    /// The read replica did not catch up with the chain.
    #[error("middleware did not sync after {attempts} attempts")]
    Middleware { attempts: u32 },

    /// Contract violation (re-running a transaction, wrong run method, ...).
    #[error("{0}")]
    General(String),

    /// The signing account has no associated identity.
    #[error("account {0} has no associated identity")]
    NoIdentity(AccountAddress),

    /// The signing account's identity has frozen its secondary keys.
    #[error("account {0} is frozen")]
    AccountFrozen(AccountAddress),

    /// The caller's identity lacks required roles.
    #[error("missing roles: {}", format_roles(.0))]
    MissingRoles(Vec<Role>),

    /// The signing key or agent group lacks required permissions.
    #[error("missing {axis} permissions: {missing:?}")]
    MissingPermissions {
        /// Which check failed: "signer" or "agent".
        axis: &'static str,
        missing: RequiredPermissions,
    },

    /// Anything unexpected from a collaborator.
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

fn format_roles(roles: &[Role]) -> String {
    roles
        .iter()
        .map(|r| r.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl From<ClientError> for Error {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Transport(message) => Error::Aborted(message),
            ClientError::SignerRejected => Error::RejectedBySigner,
            ClientError::InvalidCall(message) => Error::Validation(message),
            ClientError::NotFound(message) => Error::Unexpected(message),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
