//! Roles and Permissions - What a signer is allowed to do
//!
//! Two sides of the same check:
//! - `Permissions` is what a key or agent group actually holds on-chain.
//! - `RequiredPermissions` is what a procedure declares it needs.

use crate::ids::{AssetId, PortfolioId, VenueId};
use crate::tags::TxTag;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Role held by an identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    /// Owner of an asset.
    AssetOwner { asset: AssetId },
    /// External agent of an asset.
    AssetAgent { asset: AssetId },
    /// Customer due diligence provider.
    CddProvider,
    /// Owner of a settlement venue.
    VenueOwner { venue: VenueId },
    /// Custodian of a portfolio.
    PortfolioCustodian { portfolio: PortfolioId },
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::AssetOwner { asset } => write!(f, "owner of asset {}", asset),
            Role::AssetAgent { asset } => write!(f, "agent of asset {}", asset),
            Role::CddProvider => write!(f, "CDD provider"),
            Role::VenueOwner { venue } => write!(f, "owner of venue {}", venue),
            Role::PortfolioCustodian { portfolio } => {
                write!(f, "custodian of portfolio {}", portfolio)
            }
        }
    }
}

/// Held-permission encoding over one axis: unrestricted, or exactly a set.
///
/// `These` with an empty set means "holds none".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ElementSet<T: Ord> {
    /// No restriction; every element is covered.
    Whole,
    /// Exactly these elements.
    These(BTreeSet<T>),
}

impl<T: Ord + Clone> ElementSet<T> {
    pub fn these(elems: impl IntoIterator<Item = T>) -> Self {
        ElementSet::These(elems.into_iter().collect())
    }

    pub fn none() -> Self {
        ElementSet::These(BTreeSet::new())
    }

    /// Whether every required element is covered by this set.
    pub fn covers(&self, required: &[T]) -> bool {
        match self {
            ElementSet::Whole => true,
            ElementSet::These(held) => required.iter().all(|r| held.contains(r)),
        }
    }

    /// Required elements not covered by this set.
    pub fn missing_from(&self, required: &[T]) -> Vec<T> {
        match self {
            ElementSet::Whole => Vec::new(),
            ElementSet::These(held) => required
                .iter()
                .filter(|r| !held.contains(r))
                .cloned()
                .collect(),
        }
    }
}

/// Permissions held by a signing key or an agent group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permissions {
    pub transactions: ElementSet<TxTag>,
    pub assets: ElementSet<AssetId>,
    pub portfolios: ElementSet<PortfolioId>,
}

impl Permissions {
    /// Full access on every axis (a primary key).
    pub fn full() -> Self {
        Self {
            transactions: ElementSet::Whole,
            assets: ElementSet::Whole,
            portfolios: ElementSet::Whole,
        }
    }

    /// No access on any axis.
    pub fn empty() -> Self {
        Self {
            transactions: ElementSet::none(),
            assets: ElementSet::none(),
            portfolios: ElementSet::none(),
        }
    }
}

/// Permissions a procedure declares it needs. `None` on an axis means the
/// axis is unrestricted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequiredPermissions {
    pub transactions: Option<Vec<TxTag>>,
    pub assets: Option<Vec<AssetId>>,
    pub portfolios: Option<Vec<PortfolioId>>,
}

impl RequiredPermissions {
    pub fn transactions(tags: impl IntoIterator<Item = TxTag>) -> Self {
        Self {
            transactions: Some(tags.into_iter().collect()),
            ..Default::default()
        }
    }

    pub fn with_asset(mut self, asset: AssetId) -> Self {
        self.assets.get_or_insert_with(Vec::new).push(asset);
        self
    }

    pub fn with_portfolio(mut self, portfolio: PortfolioId) -> Self {
        self.portfolios.get_or_insert_with(Vec::new).push(portfolio);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_none() && self.assets.is_none() && self.portfolios.is_none()
    }

    /// Distinct assets named by this requirement.
    pub fn distinct_assets(&self) -> Vec<&AssetId> {
        let mut seen = Vec::new();
        if let Some(assets) = &self.assets {
            for asset in assets {
                if !seen.contains(&asset) {
                    seen.push(asset);
                }
            }
        }
        seen
    }
}
