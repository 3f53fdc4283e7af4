//! Transaction Runtime - Procedure preparation and lifecycle tracking
//!
//! This crate provides the client-side engine for a permissioned ledger:
//! - Declarative procedures compiled into run-once transactions
//! - Role and permission authorization against live chain state
//! - Protocol/gas fee estimation and four-way payer resolution
//! - Multisig signers submitting through wrapped proposals
//! - Best-effort read-replica sync notifications

pub mod authorization;
pub mod config;
pub mod context;
pub mod error;
pub mod fees;
mod middleware;
pub mod multisig;
pub mod procedure;
pub mod spec;
mod submit;
pub mod transaction;

pub use authorization::{
    AuthorizationOutcome, AuthorizationRequirements, PermissionCheck, ProcedureAuthorization,
    RoleCheck,
};
pub use config::RuntimeConfig;
pub use context::Context;
pub use error::{Error, Result};
pub use fees::{FeeBreakdown, FeeEstimate, PayingAccount};
pub use multisig::MultiSigProposal;
pub use procedure::{NonceSource, PrepareOptions, Procedure, ProcedureExt};
pub use spec::{Operation, OperationSet, ProcedureSpec, Resolver};
pub use transaction::{ListenerId, Transaction, TransactionStatus};
