//! Submission Strategies - Push subscription or block polling
//!
//! Both strategies drive a signed call from broadcast to a finalized
//! receipt. The subscription path rides the client's progress stream and
//! fetches the including block concurrently, so the receipt is ready the
//! moment finalization lands. The polling path scans finalized blocks by
//! number until the hash shows up or the mortality window closes.
//!
//! Pure transport: an extrinsic that failed on-chain still yields a
//! receipt here. Interpreting the failure event is the caller's job. A
//! failure event is settled the moment the including block is read, so the
//! subscription path returns that receipt at inclusion instead of waiting
//! out finalization.

use crate::error::{Error, Result};
use futures::future::{BoxFuture, Fuse, FusedFuture, FutureExt};
use ledger_client::{ChainClient, SigningOptions, TxUpdate};
use ledger_types::{
    AccountAddress, BlockDetails, BlockHash, ChainEvent, ComposedCall, ExtrinsicEntry,
    Mortality, TxHash, TxReceipt,
};
use std::sync::Arc;
use std::time::Duration;

/// Sign, submit and wait for finalization, picking the strategy the
/// client supports. `on_broadcast` fires as soon as a hash is known.
pub(crate) async fn submit(
    chain: &Arc<dyn ChainClient>,
    call: &ComposedCall,
    signer: &AccountAddress,
    options: SigningOptions,
    poll_interval: Duration,
    on_broadcast: impl FnMut(TxHash),
) -> Result<TxReceipt> {
    if chain.supports_subscriptions() {
        submit_via_subscription(chain, call, signer, options, on_broadcast).await
    } else {
        submit_via_polling(chain, call, signer, options, poll_interval, on_broadcast).await
    }
}

fn receipt_from(block: &BlockDetails, entry: &ExtrinsicEntry) -> TxReceipt {
    TxReceipt {
        tx_hash: entry.tx_hash,
        block_hash: block.hash,
        block_number: block.number,
        tx_index: entry.index,
        events: entry.events.clone(),
    }
}

/// Owned future so the fetch can run inside `select!` across iterations.
fn fetch_block(
    chain: Arc<dyn ChainClient>,
    hash: BlockHash,
) -> BoxFuture<'static, Result<BlockDetails>> {
    async move {
        chain
            .block_by_hash(&hash)
            .await?
            .ok_or_else(|| Error::Unexpected(format!("block {} not found", hash)))
    }
    .boxed()
}

async fn submit_via_subscription(
    chain: &Arc<dyn ChainClient>,
    call: &ComposedCall,
    signer: &AccountAddress,
    options: SigningOptions,
    mut on_broadcast: impl FnMut(TxHash),
) -> Result<TxReceipt> {
    let mut sub = chain.sign_and_subscribe(call, signer, options).await?;

    let mut tx_hash: Option<TxHash> = None;
    let mut finalized: Option<BlockHash> = None;
    let mut fetched: Option<BlockDetails> = None;
    let mut block_fetch: Fuse<BoxFuture<'static, Result<BlockDetails>>> = Fuse::terminated();
    let mut stream_open = true;

    loop {
        if let (Some(hash), Some(block)) = (finalized, &fetched) {
            if block.hash == hash {
                let tx_hash = tx_hash
                    .ok_or_else(|| Error::Unexpected("finalized before broadcast".into()))?;
                let entry = block.find_extrinsic(&tx_hash).ok_or_else(|| {
                    Error::Unexpected(format!(
                        "transaction {} not found in finalized block {}",
                        tx_hash, hash
                    ))
                })?;
                return Ok(receipt_from(block, entry));
            }
            // Finalized under a different block than the one announced at
            // inclusion; fetch the finalized one instead.
            block_fetch = fetch_block(chain.clone(), hash).fuse();
            fetched = None;
        }

        if !stream_open && block_fetch.is_terminated() {
            return Err(Error::Aborted(
                "subscription ended before finalization".into(),
            ));
        }

        tokio::select! {
            update = sub.next(), if stream_open => match update {
                Some(TxUpdate::Broadcast { tx_hash: hash }) => {
                    tx_hash = Some(hash);
                    on_broadcast(hash);
                }
                Some(TxUpdate::InBlock { block_hash }) => {
                    // Start fetching now so the receipt is ready at
                    // finalization.
                    if block_fetch.is_terminated() && fetched.is_none() {
                        block_fetch = fetch_block(chain.clone(), block_hash).fuse();
                    }
                }
                Some(TxUpdate::Finalized { block_hash }) => {
                    finalized = Some(block_hash);
                    if block_fetch.is_terminated() && fetched.is_none() {
                        block_fetch = fetch_block(chain.clone(), block_hash).fuse();
                    }
                }
                Some(TxUpdate::Error { message }) => {
                    return Err(Error::Aborted(message));
                }
                None => stream_open = false,
            },
            details = &mut block_fetch, if !block_fetch.is_terminated() => {
                let details = details?;
                // A failed extrinsic is settled at inclusion; resolve right
                // away and let the drop unsubscribe.
                if let Some(hash) = tx_hash {
                    if let Some(entry) = details.find_extrinsic(&hash) {
                        let failed = entry
                            .events
                            .iter()
                            .any(|event| matches!(event, ChainEvent::ExtrinsicFailed { .. }));
                        if failed {
                            return Ok(receipt_from(&details, entry));
                        }
                    }
                }
                fetched = Some(details);
            }
        }
    }
}

async fn submit_via_polling(
    chain: &Arc<dyn ChainClient>,
    call: &ComposedCall,
    signer: &AccountAddress,
    options: SigningOptions,
    poll_interval: Duration,
    mut on_broadcast: impl FnMut(TxHash),
) -> Result<TxReceipt> {
    let start = chain.latest_block().await?;
    let tx_hash = chain.sign_and_send(call, signer, options).await?;
    tracing::debug!("broadcast {} at block {}", tx_hash, start.number);
    on_broadcast(tx_hash);

    // A mortal transaction is only valid through `start + lifetime`; once
    // that block is scanned without a match, it can no longer be included.
    let deadline = match options.mortality {
        Mortality::Immortal => None,
        Mortality::Mortal { lifetime } => Some(start.number + lifetime),
    };

    let mut next_to_scan = start.number + 1;
    loop {
        let tip = chain.latest_block().await?.number;
        while next_to_scan <= tip {
            if let Some(block) = chain.block_by_number(next_to_scan).await? {
                if let Some(entry) = block.find_extrinsic(&tx_hash) {
                    tracing::debug!("{} included in block {}", tx_hash, block.number);
                    return Ok(receipt_from(&block, entry));
                }
            }
            if deadline.is_some_and(|d| next_to_scan >= d) {
                return Err(Error::Aborted(format!(
                    "transaction {} not included before block {}",
                    tx_hash,
                    next_to_scan
                )));
            }
            next_to_scan += 1;
        }
        tokio::time::sleep(poll_interval).await;
    }
}
