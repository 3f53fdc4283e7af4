//! Shared fixtures: a scripted chain plus a handful of small procedures
//! exercising the different authorization and fee shapes.

#![allow(dead_code)]

use async_trait::async_trait;
use ledger_client::mock::MockChain;
use ledger_types::{AccountAddress, AssetId, IdentityId, RequiredPermissions, Role, TxTag};
use serde_json::json;
use std::sync::Arc;
use tx_runtime::{
    Context, Operation, Procedure, ProcedureAuthorization, ProcedureSpec, Resolver, Result,
};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn context(chain: &MockChain) -> Context {
    Context::new(Arc::new(chain.clone()))
}

/// Register an identity whose primary key is `key`, with a comfortable
/// balance.
pub fn funded_identity(chain: &MockChain, key: &str, did: &str) -> AccountAddress {
    let address = AccountAddress::from(key);
    chain.register_identity(IdentityId::from(did), address.clone());
    chain.set_balance(address.clone(), 1_000_000);
    address
}

/// Attach a claim to an identity. No authorization requirements beyond
/// holding an identity; resolves to the block number of inclusion.
pub struct AddClaim;

#[async_trait]
impl Procedure for AddClaim {
    type Args = String;
    type Output = u64;
    type Storage = ();

    async fn load_storage(&self, _args: &String, _context: &Context) -> Result<()> {
        Ok(())
    }

    async fn authorization(
        &self,
        _args: &String,
        _storage: &(),
        _context: &Context,
    ) -> Result<ProcedureAuthorization> {
        Ok(ProcedureAuthorization::Allowed)
    }

    async fn body(
        &self,
        args: &String,
        _storage: &(),
        _context: &Context,
    ) -> Result<ProcedureSpec<u64>> {
        Ok(ProcedureSpec::single(
            Operation::new(TxTag::IdentityAddClaim, json!({ "claim": args })),
            Resolver::from_receipt(|receipt| Ok(receipt.block_number)),
        ))
    }
}

pub struct IssueArgs {
    pub asset: AssetId,
    pub amount: u64,
}

/// Issue tokens of an existing asset. Requires the asset-owner role and
/// issue permission on the signing key.
pub struct IssueAsset;

#[async_trait]
impl Procedure for IssueAsset {
    type Args = IssueArgs;
    type Output = u64;
    type Storage = ();

    async fn load_storage(&self, _args: &IssueArgs, _context: &Context) -> Result<()> {
        Ok(())
    }

    async fn authorization(
        &self,
        args: &IssueArgs,
        _storage: &(),
        _context: &Context,
    ) -> Result<ProcedureAuthorization> {
        Ok(ProcedureAuthorization::roles_and_permissions(
            [Role::AssetOwner {
                asset: args.asset.clone(),
            }],
            RequiredPermissions::transactions([TxTag::AssetIssue]).with_asset(args.asset.clone()),
        ))
    }

    async fn body(
        &self,
        args: &IssueArgs,
        _storage: &(),
        _context: &Context,
    ) -> Result<ProcedureSpec<u64>> {
        Ok(ProcedureSpec::single(
            Operation::new(
                TxTag::AssetIssue,
                json!({ "asset": args.asset, "amount": args.amount }),
            ),
            Resolver::Value(args.amount),
        ))
    }
}

/// Freeze an asset. Permission-gated only, so a caller who is not an
/// agent of the asset fails on the agent axis rather than on roles.
pub struct FreezeAsset;

#[async_trait]
impl Procedure for FreezeAsset {
    type Args = AssetId;
    type Output = ();
    type Storage = ();

    async fn load_storage(&self, _args: &AssetId, _context: &Context) -> Result<()> {
        Ok(())
    }

    async fn authorization(
        &self,
        args: &AssetId,
        _storage: &(),
        _context: &Context,
    ) -> Result<ProcedureAuthorization> {
        Ok(ProcedureAuthorization::permissions(
            RequiredPermissions::transactions([TxTag::AssetFreeze]).with_asset(args.clone()),
        ))
    }

    async fn body(
        &self,
        args: &AssetId,
        _storage: &(),
        _context: &Context,
    ) -> Result<ProcedureSpec<()>> {
        Ok(ProcedureSpec::single(
            Operation::new(TxTag::AssetFreeze, json!({ "asset": args })),
            Resolver::Value(()),
        ))
    }
}

pub struct LaunchArgs {
    pub asset: AssetId,
    pub amount: u64,
    pub critical_issue: bool,
}

/// Create an asset and issue the initial supply in one batch.
pub struct LaunchAsset;

#[async_trait]
impl Procedure for LaunchAsset {
    type Args = LaunchArgs;
    type Output = ();
    type Storage = ();

    async fn load_storage(&self, _args: &LaunchArgs, _context: &Context) -> Result<()> {
        Ok(())
    }

    async fn authorization(
        &self,
        _args: &LaunchArgs,
        _storage: &(),
        _context: &Context,
    ) -> Result<ProcedureAuthorization> {
        Ok(ProcedureAuthorization::Allowed)
    }

    async fn body(
        &self,
        args: &LaunchArgs,
        _storage: &(),
        _context: &Context,
    ) -> Result<ProcedureSpec<()>> {
        let create = Operation::new(TxTag::AssetCreate, json!({ "asset": args.asset }));
        let mut issue = Operation::new(
            TxTag::AssetIssue,
            json!({ "asset": args.asset, "amount": args.amount }),
        );
        if !args.critical_issue {
            issue = issue.non_critical();
        }
        Ok(ProcedureSpec::batch(vec![create, issue], Resolver::Value(())))
    }
}

/// Register a ticker with the fees billed to a sponsor account.
pub struct SponsoredRegister;

#[async_trait]
impl Procedure for SponsoredRegister {
    type Args = (AssetId, AccountAddress);
    type Output = ();
    type Storage = ();

    async fn load_storage(
        &self,
        _args: &(AssetId, AccountAddress),
        _context: &Context,
    ) -> Result<()> {
        Ok(())
    }

    async fn authorization(
        &self,
        _args: &(AssetId, AccountAddress),
        _storage: &(),
        _context: &Context,
    ) -> Result<ProcedureAuthorization> {
        Ok(ProcedureAuthorization::Allowed)
    }

    async fn body(
        &self,
        (asset, sponsor): &(AssetId, AccountAddress),
        _storage: &(),
        _context: &Context,
    ) -> Result<ProcedureSpec<()>> {
        Ok(ProcedureSpec::single(
            Operation::new(TxTag::AssetRegisterTicker, json!({ "asset": asset })),
            Resolver::Value(()),
        )
        .paid_by(sponsor.clone()))
    }
}

/// Declares permissions spanning two assets, which no procedure may do.
pub struct CrossAssetAudit;

#[async_trait]
impl Procedure for CrossAssetAudit {
    type Args = (AssetId, AssetId);
    type Output = ();
    type Storage = ();

    async fn load_storage(&self, _args: &(AssetId, AssetId), _context: &Context) -> Result<()> {
        Ok(())
    }

    async fn authorization(
        &self,
        (a, b): &(AssetId, AssetId),
        _storage: &(),
        _context: &Context,
    ) -> Result<ProcedureAuthorization> {
        Ok(ProcedureAuthorization::permissions(
            RequiredPermissions::transactions([TxTag::CompliancePause])
                .with_asset(a.clone())
                .with_asset(b.clone()),
        ))
    }

    async fn body(
        &self,
        _args: &(AssetId, AssetId),
        _storage: &(),
        _context: &Context,
    ) -> Result<ProcedureSpec<()>> {
        Ok(ProcedureSpec::single(
            Operation::new(TxTag::CompliancePause, json!({})),
            Resolver::Value(()),
        ))
    }
}
