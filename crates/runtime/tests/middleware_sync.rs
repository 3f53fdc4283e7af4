//! Replica Sync Notification Integration Tests
//!
//! After a transaction finalizes, a detached watcher polls the read
//! replica until it catches up with the chain. These tests drive a full
//! run and assert:
//! - the one-shot notification once the replica reaches the target
//! - a middleware error after the retry budget is exhausted
//! - immediate delivery to listeners subscribing after the outcome
//! - delivery even when the run never reached the chain
//! - an error when no middleware is configured at all

mod common;

use common::*;
use ledger_client::mock::{MockChain, MockMiddleware, MockOutcome};
use ledger_types::AccountAddress;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::oneshot;
use tx_runtime::{Context, Error, PrepareOptions, ProcedureExt, Transaction};

fn replica_context(chain: &MockChain, replica: MockMiddleware) -> Context {
    Context::new(Arc::new(chain.clone())).with_middleware(Arc::new(replica))
}

async fn run_claim(context: &Context, chain: &MockChain) -> Transaction<u64> {
    let signer = funded_identity(chain, "alice", "did:alice");
    let tx = AddClaim
        .prepare("claim".into(), context, PrepareOptions::new(signer))
        .await
        .unwrap();
    tx.run().await.unwrap();
    tx
}

#[tokio::test(start_paused = true)]
async fn listener_fires_once_the_replica_catches_up() {
    init_tracing();
    let chain = MockChain::new();
    // The run seals one block and the watcher's height capture seals
    // another; climbing heights cover both.
    let context = replica_context(&chain, MockMiddleware::with_heights([1, 2, 3]));

    let tx = run_claim(&context, &chain).await;

    let (sender, receiver) = oneshot::channel();
    let mut sender = Some(sender);
    tx.on_processed_by_middleware(move |outcome| {
        let _ = sender.take().unwrap().send(outcome.cloned());
    })
    .unwrap();

    assert!(receiver.await.unwrap().is_none());
}

#[tokio::test(start_paused = true)]
async fn stalled_replica_reports_the_attempt_budget() {
    let chain = MockChain::new();
    let context = replica_context(&chain, MockMiddleware::with_heights([0]));

    let tx = run_claim(&context, &chain).await;

    let (sender, receiver) = oneshot::channel();
    let mut sender = Some(sender);
    tx.on_processed_by_middleware(move |outcome| {
        let _ = sender.take().unwrap().send(outcome.cloned());
    })
    .unwrap();

    match receiver.await.unwrap() {
        Some(Error::Middleware { attempts }) => assert_eq!(attempts, 6),
        other => panic!("expected a middleware error, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn unreachable_replica_is_retried_then_reported() {
    let chain = MockChain::new();
    let context = replica_context(&chain, MockMiddleware::failing());

    let tx = run_claim(&context, &chain).await;

    let (sender, receiver) = oneshot::channel();
    let mut sender = Some(sender);
    tx.on_processed_by_middleware(move |outcome| {
        let _ = sender.take().unwrap().send(outcome.cloned());
    })
    .unwrap();

    assert!(matches!(
        receiver.await.unwrap(),
        Some(Error::Middleware { attempts: 6 })
    ));
}

#[tokio::test(start_paused = true)]
async fn rejected_transactions_still_notify_the_listener() {
    let chain = MockChain::new();
    let context = replica_context(&chain, MockMiddleware::with_heights([1]));
    let signer = funded_identity(&chain, "alice", "did:alice");
    chain.queue_outcome(MockOutcome::RejectSigning);

    let tx = AddClaim
        .prepare("claim".into(), &context, PrepareOptions::new(signer))
        .await
        .unwrap();
    let err = tx.run().await.unwrap_err();
    assert!(matches!(err, Error::RejectedBySigner));

    // The notification fires whatever the outcome of the run.
    let (sender, receiver) = oneshot::channel();
    let mut sender = Some(sender);
    tx.on_processed_by_middleware(move |outcome| {
        let _ = sender.take().unwrap().send(outcome.cloned());
    })
    .unwrap();
    assert!(receiver.await.unwrap().is_none());
}

#[tokio::test(start_paused = true)]
async fn failed_solvency_checks_still_notify_the_listener() {
    let chain = MockChain::new();
    let context = replica_context(&chain, MockMiddleware::with_heights([1]));
    let signer = AccountAddress::from("pauper");
    chain.register_identity("did:pauper".into(), signer.clone());

    let tx = AddClaim
        .prepare("claim".into(), &context, PrepareOptions::new(signer))
        .await
        .unwrap();
    let err = tx.run().await.unwrap_err();
    assert!(matches!(err, Error::InsufficientBalance { .. }));

    let (sender, receiver) = oneshot::channel();
    let mut sender = Some(sender);
    tx.on_processed_by_middleware(move |outcome| {
        let _ = sender.take().unwrap().send(outcome.cloned());
    })
    .unwrap();
    assert!(receiver.await.unwrap().is_none());
}

#[tokio::test(start_paused = true)]
async fn late_subscribers_get_the_stored_outcome_immediately() {
    let chain = MockChain::new();
    let context = replica_context(&chain, MockMiddleware::with_heights([1, 2, 3]));

    let tx = run_claim(&context, &chain).await;

    // Wait for the sync outcome to settle.
    let (sender, receiver) = oneshot::channel();
    let mut sender = Some(sender);
    tx.on_processed_by_middleware(move |_| {
        let _ = sender.take().unwrap().send(());
    })
    .unwrap();
    receiver.await.unwrap();

    // A listener arriving afterwards fires synchronously.
    let fired = Arc::new(AtomicBool::new(false));
    {
        let fired = fired.clone();
        tx.on_processed_by_middleware(move |outcome| {
            assert!(outcome.is_none());
            fired.store(true, Ordering::SeqCst);
        })
        .unwrap();
    }
    assert!(fired.load(Ordering::SeqCst));
}

#[tokio::test]
async fn without_middleware_the_subscription_errors() {
    let chain = MockChain::new();
    let context = Context::new(Arc::new(chain.clone()));

    let tx = run_claim(&context, &chain).await;
    let err = tx.on_processed_by_middleware(|_| {}).unwrap_err();
    assert!(matches!(err, Error::General(_)));
}
