//! MultiSig Wrapping - Propose instead of execute
//!
//! When the signing key belongs to a multisig, the composed call is
//! rewritten into a create-proposal call targeting the group address. The
//! lifecycle engine has no other multisig special-casing.

use chrono::{DateTime, Utc};
use ledger_types::{AccountAddress, ComposedCall, MultiSigInfo, TxTag};
use serde_json::json;

/// Handle to a created multisig proposal. Read-only; approvals and
/// execution happen through their own procedures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultiSigProposal {
    pub multisig_address: AccountAddress,
    pub id: u64,
}

/// Rewrite `call` into a create-proposal call for the multisig.
pub fn wrap_as_proposal(
    call: &ComposedCall,
    multisig: &MultiSigInfo,
    expiry: Option<DateTime<Utc>>,
) -> ComposedCall {
    ComposedCall::Call {
        tag: TxTag::MultiSigCreateProposalAsKey,
        args: json!({
            "multisig": multisig.address,
            "proposal": call,
            "expiry": expiry,
        }),
    }
}
