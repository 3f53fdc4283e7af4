//! Operation Tags - Kinds of state-changing calls
//!
//! Every composable operation on the ledger is identified by a tag.
//! Protocol fees and subsidy eligibility are keyed off these.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of a state-changing ledger operation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum TxTag {
    // Asset
    AssetRegisterTicker,
    AssetCreate,
    AssetIssue,
    AssetRedeem,
    AssetFreeze,
    AssetUnfreeze,
    // Compliance
    ComplianceAddRequirement,
    ComplianceRemoveRequirement,
    CompliancePause,
    ComplianceReset,
    // Identity / claims
    IdentityAddClaim,
    IdentityRevokeClaim,
    // Settlement
    SettlementCreateVenue,
    SettlementAddInstruction,
    SettlementAffirmInstruction,
    SettlementRejectInstruction,
    // Corporate actions
    CorporateActionInitiate,
    CapitalDistributionDistribute,
    // Portfolios
    PortfolioCreate,
    PortfolioMoveFunds,
    // MultiSig
    MultiSigCreate,
    MultiSigCreateProposalAsKey,
    MultiSigApprove,
    // Utility
    UtilityBatchAll,
}

impl TxTag {
    /// Whether a third-party subsidy may cover this operation's fees.
    ///
    /// Multisig operations always charge the multisig key arrangement
    /// directly and cannot be subsidized.
    pub fn is_subsidizable(&self) -> bool {
        !matches!(
            self,
            TxTag::MultiSigCreate | TxTag::MultiSigCreateProposalAsKey | TxTag::MultiSigApprove
        )
    }
}

impl fmt::Display for TxTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}
