//! Fees - Protocol/gas estimation and paying-account resolution
//!
//! The payer is re-resolved from chain state on every check, never cached:
//! subsidizer relationships can change between preparation and execution.

use crate::error::{Error, Result};
use crate::spec::Operation;
use ledger_client::ChainClient;
use ledger_types::{AccountAddress, Balance, ComposedCall, MultiSigInfo, TxTag};

/// Protocol and network fees for one transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeBreakdown {
    pub protocol: Balance,
    pub gas: Balance,
    pub total: Balance,
}

/// Who pays, and under which arrangement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayingAccount {
    /// The signing account pays for itself.
    Caller { address: AccountAddress },
    /// Explicit override: this account pays via its own primary key.
    Other { address: AccountAddress },
    /// A subsidizer pays, bounded by the remaining allowance.
    Subsidy {
        subsidizer: AccountAddress,
        allowance: Balance,
    },
    /// The multisig creator's primary key pays for proposal-bound calls.
    MultiSigCreator { address: AccountAddress },
}

impl PayingAccount {
    pub fn address(&self) -> &AccountAddress {
        match self {
            PayingAccount::Caller { address } => address,
            PayingAccount::Other { address } => address,
            PayingAccount::Subsidy { subsidizer, .. } => subsidizer,
            PayingAccount::MultiSigCreator { address } => address,
        }
    }

    pub fn role(&self) -> &'static str {
        match self {
            PayingAccount::Caller { .. } => "caller",
            PayingAccount::Other { .. } => "paying",
            PayingAccount::Subsidy { .. } => "subsidizer",
            PayingAccount::MultiSigCreator { .. } => "multisig creator",
        }
    }
}

/// Fees plus the freshly resolved payer.
#[derive(Debug, Clone)]
pub struct FeeEstimate {
    pub fees: FeeBreakdown,
    pub payer: PayingAccount,
    /// Free balance of the payer at estimation time.
    pub payer_balance: Balance,
}

/// Protocol fee: sum over operations of `coefficient x base_fee(kind)`,
/// with per-operation overrides and multipliers.
///
/// The coefficient is read once per estimate.
pub async fn protocol_fee(chain: &dyn ChainClient, operations: &[Operation]) -> Result<Balance> {
    let coefficient = chain.fee_coefficient().await?;
    let mut total: Balance = 0;
    for op in operations {
        let fee = match op.fee {
            Some(explicit) => explicit,
            None => coefficient.apply(chain.base_fee(op.tag).await?),
        };
        total += fee * op.fee_multiplier.unwrap_or(1) as Balance;
    }
    Ok(total)
}

/// Protocol + gas for the fully composed call.
pub async fn estimate_fees(
    chain: &dyn ChainClient,
    call: &ComposedCall,
    operations: &[Operation],
    signer: &AccountAddress,
) -> Result<FeeBreakdown> {
    let protocol = protocol_fee(chain, operations).await?;
    let gas = chain.estimate_fee(call, signer).await?;
    Ok(FeeBreakdown {
        protocol,
        gas,
        total: protocol + gas,
    })
}

/// Resolve who pays, in order: explicit override, active subsidy,
/// multisig creator, the signer itself.
pub async fn resolve_paying_account(
    chain: &dyn ChainClient,
    signer: &AccountAddress,
    paid_for_by: Option<&AccountAddress>,
    multisig: Option<&MultiSigInfo>,
) -> Result<PayingAccount> {
    if let Some(address) = paid_for_by {
        return Ok(PayingAccount::Other {
            address: address.clone(),
        });
    }
    if let Some(subsidy) = chain.subsidy_of(signer).await? {
        return Ok(PayingAccount::Subsidy {
            subsidizer: subsidy.subsidizer,
            allowance: subsidy.allowance,
        });
    }
    if let Some(info) = multisig {
        return Ok(PayingAccount::MultiSigCreator {
            address: info.creator.clone(),
        });
    }
    Ok(PayingAccount::Caller {
        address: signer.clone(),
    })
}

/// Assert the payer can cover `fees` for operations tagged `tags`.
pub async fn assert_solvency(
    chain: &dyn ChainClient,
    payer: &PayingAccount,
    fees: &FeeBreakdown,
    tags: &[TxTag],
) -> Result<()> {
    if let PayingAccount::Subsidy { allowance, .. } = payer {
        for tag in tags {
            if !tag.is_subsidizable() {
                return Err(Error::UnmetPrerequisite(format!(
                    "operation {} cannot be paid through a subsidy",
                    tag
                )));
            }
        }
        if *allowance < fees.total {
            return Err(Error::UnmetPrerequisite(format!(
                "subsidy allowance {} does not cover the required fees {}",
                allowance, fees.total
            )));
        }
    }

    let free = chain.free_balance(payer.address()).await?;
    if free < fees.total {
        return Err(Error::InsufficientBalance {
            role: payer.role(),
            address: payer.address().clone(),
            free,
            required: fees.total,
        });
    }
    Ok(())
}
