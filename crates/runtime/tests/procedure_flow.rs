//! Procedure Preparation Integration Tests
//!
//! End-to-end preparation flows against the scripted chain:
//! - role and permission gating on each axis
//! - fee estimation with governance coefficient, overrides and gas
//! - payer resolution: caller, subsidizer and explicit sponsor
//! - batch compilation and atomicity
//! - nonce sources committed at preparation

mod common;

use common::*;
use ledger_client::mock::MockChain;
use ledger_types::{
    AccountAddress, AssetId, ComposedCall, ElementSet, IdentityId, Permissions, Role, TxTag,
};
use tx_runtime::{Error, NonceSource, PayingAccount, PrepareOptions, ProcedureExt};

fn owner_of(chain: &MockChain, key: &str, did: &str, asset: &AssetId) -> AccountAddress {
    let address = funded_identity(chain, key, did);
    chain.grant_role(
        IdentityId::from(did),
        Role::AssetOwner {
            asset: asset.clone(),
        },
    );
    address
}

#[tokio::test(start_paused = true)]
async fn asset_owner_passes_the_role_gate() -> anyhow::Result<()> {
    init_tracing();
    let chain = MockChain::new();
    let asset = AssetId::from("TICK");
    let signer = owner_of(&chain, "alice", "did:alice", &asset);

    let tx = IssueAsset
        .prepare(
            IssueArgs {
                asset: asset.clone(),
                amount: 500,
            },
            &context(&chain),
            PrepareOptions::new(signer),
        )
        .await?;

    let issued = tx.run().await?;
    assert_eq!(issued, 500);

    let (submitted, by, _) = chain.submitted().pop().unwrap();
    assert_eq!(by, AccountAddress::from("alice"));
    match submitted {
        ComposedCall::Call { tag, args } => {
            assert_eq!(tag, TxTag::AssetIssue);
            assert_eq!(args["amount"], 500);
        }
        other => panic!("expected a single call, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn non_owner_is_missing_the_role() {
    let chain = MockChain::new();
    let asset = AssetId::from("TICK");
    let signer = funded_identity(&chain, "bob", "did:bob");

    let err = IssueAsset
        .prepare(
            IssueArgs { asset: asset.clone(), amount: 1 },
            &context(&chain),
            PrepareOptions::new(signer),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::MissingRoles(roles) if roles == vec![Role::AssetOwner { asset }]));
}

#[tokio::test]
async fn frozen_secondary_key_is_refused() {
    let chain = MockChain::new();
    let asset = AssetId::from("TICK");
    owner_of(&chain, "alice", "did:alice", &asset);
    let secondary = AccountAddress::from("alice-2");
    chain.attach_key(secondary.clone(), "did:alice".into());
    chain.freeze_secondary_keys("did:alice".into());

    let err = IssueAsset
        .prepare(
            IssueArgs { asset, amount: 1 },
            &context(&chain),
            PrepareOptions::new(secondary.clone()),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::AccountFrozen(addr) if addr == secondary));
}

#[tokio::test]
async fn restricted_signing_key_fails_the_signer_axis() {
    let chain = MockChain::new();
    let asset = AssetId::from("TICK");
    owner_of(&chain, "alice", "did:alice", &asset);
    let secondary = AccountAddress::from("alice-2");
    chain.attach_key(secondary.clone(), "did:alice".into());
    let mut held = Permissions::full();
    held.transactions = ElementSet::these([TxTag::AssetFreeze]);
    chain.set_key_permissions(secondary.clone(), held);

    let err = IssueAsset
        .prepare(
            IssueArgs { asset, amount: 1 },
            &context(&chain),
            PrepareOptions::new(secondary),
        )
        .await
        .unwrap_err();
    match err {
        Error::MissingPermissions { axis, missing } => {
            assert_eq!(axis, "signer");
            assert_eq!(missing.transactions, Some(vec![TxTag::AssetIssue]));
        }
        other => panic!("expected MissingPermissions, got {other:?}"),
    }
}

#[tokio::test]
async fn non_agent_fails_the_agent_axis() {
    let chain = MockChain::new();
    let signer = funded_identity(&chain, "bob", "did:bob");

    let err = FreezeAsset
        .prepare(
            AssetId::from("TICK"),
            &context(&chain),
            PrepareOptions::new(signer),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::MissingPermissions { axis: "agent", .. }));
}

#[tokio::test]
async fn cross_asset_permission_declarations_raise() {
    let chain = MockChain::new();
    let signer = funded_identity(&chain, "alice", "did:alice");

    let err = CrossAssetAudit
        .prepare(
            (AssetId::from("AAA"), AssetId::from("BBB")),
            &context(&chain),
            PrepareOptions::new(signer),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::General(_)));
}

#[tokio::test]
async fn fees_combine_scaled_protocol_and_gas() -> anyhow::Result<()> {
    let chain = MockChain::new();
    let signer = funded_identity(&chain, "alice", "did:alice");
    chain.set_fee_coefficient(ledger_types::Ratio::new(7, 3));
    chain.set_base_fee(TxTag::AssetCreate, 250);
    chain.set_base_fee(TxTag::AssetIssue, 0);
    chain.set_gas_fee(100);

    let tx = LaunchAsset
        .prepare(
            LaunchArgs {
                asset: AssetId::from("TICK"),
                amount: 1_000,
                critical_issue: true,
            },
            &context(&chain),
            PrepareOptions::new(signer.clone()),
        )
        .await?;

    let estimate = tx.get_total_fees().await?;
    // round(7/3 * 250) + round(7/3 * 0) = 583
    assert_eq!(estimate.fees.protocol, 583);
    assert_eq!(estimate.fees.gas, 100);
    assert_eq!(estimate.fees.total, 683);
    assert!(matches!(estimate.payer, PayingAccount::Caller { address } if address == signer));
    assert_eq!(estimate.payer_balance, 1_000_000);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn subsidized_caller_is_paid_by_the_subsidizer() {
    let chain = MockChain::new();
    let signer = funded_identity(&chain, "alice", "did:alice");
    let subsidizer = AccountAddress::from("sub");
    chain.set_subsidy(signer.clone(), subsidizer.clone(), 10_000);
    chain.set_balance(subsidizer.clone(), 10_000);
    // The caller itself holds nothing.
    chain.set_balance(signer.clone(), 0);

    let tx = AddClaim
        .prepare("claim".into(), &context(&chain), PrepareOptions::new(signer))
        .await
        .unwrap();

    let estimate = tx.get_total_fees().await.unwrap();
    assert!(matches!(
        estimate.payer,
        PayingAccount::Subsidy { subsidizer: ref s, allowance: 10_000 } if *s == subsidizer
    ));

    tx.run().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn exhausted_subsidy_allowance_blocks_the_run() {
    let chain = MockChain::new();
    let signer = funded_identity(&chain, "alice", "did:alice");
    let subsidizer = AccountAddress::from("sub");
    chain.set_subsidy(signer.clone(), subsidizer.clone(), 10);
    chain.set_balance(subsidizer, 10_000);

    let tx = AddClaim
        .prepare("claim".into(), &context(&chain), PrepareOptions::new(signer))
        .await
        .unwrap();

    let err = tx.run().await.unwrap_err();
    assert!(matches!(err, Error::UnmetPrerequisite(_)));
    assert!(chain.submitted().is_empty());
}

#[tokio::test(start_paused = true)]
async fn an_explicit_sponsor_pays_instead_of_the_caller() {
    let chain = MockChain::new();
    let signer = funded_identity(&chain, "alice", "did:alice");
    let sponsor = AccountAddress::from("treasury");

    let tx = SponsoredRegister
        .prepare(
            (AssetId::from("TICK"), sponsor.clone()),
            &context(&chain),
            PrepareOptions::new(signer.clone()),
        )
        .await
        .unwrap();

    // The sponsor holds nothing yet; the caller's own balance is ignored.
    let err = tx.run().await.unwrap_err();
    match err {
        Error::InsufficientBalance { role, address, .. } => {
            assert_eq!(role, "paying");
            assert_eq!(address, sponsor);
        }
        other => panic!("expected InsufficientBalance, got {other:?}"),
    }

    chain.set_balance(sponsor.clone(), 1_000_000);
    let tx = SponsoredRegister
        .prepare(
            (AssetId::from("TICK"), sponsor),
            &context(&chain),
            PrepareOptions::new(signer),
        )
        .await
        .unwrap();
    tx.run().await.unwrap();
}

#[tokio::test]
async fn batch_atomicity_follows_operation_criticality() {
    let chain = MockChain::new();
    let signer = funded_identity(&chain, "alice", "did:alice");

    let all_critical = LaunchAsset
        .prepare(
            LaunchArgs {
                asset: AssetId::from("TICK"),
                amount: 1,
                critical_issue: true,
            },
            &context(&chain),
            PrepareOptions::new(signer.clone()),
        )
        .await
        .unwrap();
    assert!(matches!(
        all_critical.call(),
        ComposedCall::Batch { atomic: true, calls } if calls.len() == 2
    ));

    let with_optional = LaunchAsset
        .prepare(
            LaunchArgs {
                asset: AssetId::from("TICK"),
                amount: 1,
                critical_issue: false,
            },
            &context(&chain),
            PrepareOptions::new(signer),
        )
        .await
        .unwrap();
    assert!(matches!(
        with_optional.call(),
        ComposedCall::Batch { atomic: false, .. }
    ));
}

#[tokio::test(start_paused = true)]
async fn chain_nonces_advance_between_preparations() -> anyhow::Result<()> {
    let chain = MockChain::new();
    let signer = funded_identity(&chain, "alice", "did:alice");

    let first = AddClaim
        .prepare("a".into(), &context(&chain), PrepareOptions::new(signer.clone()))
        .await?;
    assert_eq!(first.nonce(), 0);
    first.run().await?;

    let second = AddClaim
        .prepare("b".into(), &context(&chain), PrepareOptions::new(signer.clone()))
        .await?;
    assert_eq!(second.nonce(), 1);

    // An explicit nonce bypasses the chain query entirely.
    let pinned = AddClaim
        .prepare(
            "c".into(),
            &context(&chain),
            PrepareOptions::new(signer).with_nonce(NonceSource::Literal(99)),
        )
        .await?;
    assert_eq!(pinned.nonce(), 99);
    Ok(())
}
