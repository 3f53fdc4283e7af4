//! Client Errors

use thiserror::Error;

/// Errors surfaced by the ledger and middleware collaborators.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("signer rejected the transaction")]
    SignerRejected,

    #[error("invalid call: {0}")]
    InvalidCall(String),

    #[error("not found: {0}")]
    NotFound(String),
}
