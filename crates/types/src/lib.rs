//! Ledger Types - Shared domain vocabulary
//!
//! Plain data types used across the client runtime:
//! - Account, identity, asset and portfolio identifiers
//! - Operation tags, roles and permission sets
//! - Composed calls, block and receipt types

pub mod call;
pub mod ids;
pub mod permissions;
pub mod receipt;
pub mod tags;

pub use call::{ComposedCall, Mortality};
pub use ids::{AccountAddress, AssetId, BlockHash, IdentityId, PortfolioId, TxHash, VenueId};
pub use permissions::{ElementSet, Permissions, RequiredPermissions, Role};
pub use receipt::{BlockDetails, BlockInfo, ChainEvent, ExtrinsicEntry, OnChainError, TxReceipt};
pub use tags::TxTag;

use serde::{Deserialize, Serialize};

/// On-chain balance, in the chain's smallest unit.
pub type Balance = u128;

/// Block height.
pub type BlockNumber = u64;

/// Rational coefficient used by governance to scale protocol base fees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ratio {
    pub numerator: u32,
    pub denominator: u32,
}

impl Ratio {
    pub fn new(numerator: u32, denominator: u32) -> Self {
        Self {
            numerator,
            denominator,
        }
    }

    /// Scale a balance by this ratio, rounding half-up.
    pub fn apply(&self, base: Balance) -> Balance {
        let num = self.numerator as u128;
        let den = self.denominator as u128;
        (base * num * 2 + den) / (den * 2)
    }
}

/// Fee subsidy granted to a beneficiary account by a subsidizer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subsidy {
    /// Account that pays the beneficiary's fees.
    pub subsidizer: AccountAddress,
    /// Remaining allowance the subsidizer is willing to cover.
    pub allowance: Balance,
}

/// Multi-signature account a signing key belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiSigInfo {
    /// Address of the multisig account itself.
    pub address: AccountAddress,
    /// Primary key of the identity that created the multisig.
    pub creator: AccountAddress,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ratio_rounds_half_up() {
        // 7/3 * 250 = 583.33.. -> 583
        assert_eq!(Ratio::new(7, 3).apply(250), 583);
        // 1/2 * 3 = 1.5 -> 2
        assert_eq!(Ratio::new(1, 2).apply(3), 2);
        // 1/3 * 1 = 0.33.. -> 0
        assert_eq!(Ratio::new(1, 3).apply(1), 0);
        // 2/3 * 1 = 0.66.. -> 1
        assert_eq!(Ratio::new(2, 3).apply(1), 1);
    }

    #[test]
    fn ratio_zero_base() {
        assert_eq!(Ratio::new(7, 3).apply(0), 0);
    }
}
