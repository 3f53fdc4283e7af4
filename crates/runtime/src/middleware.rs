//! Middleware Sync Notifier - Best-effort replica catch-up watch
//!
//! After a transaction finishes (either way), a detached task captures the
//! chain height and polls the read replica until it has caught up or the
//! retry budget runs out. The only visible effect is a one-shot listener
//! notification; per-attempt errors are swallowed and retried.

use crate::error::Error;
use ledger_client::{ChainClient, MiddlewareClient};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

/// One-shot listener: `None` means the replica caught up.
pub type MiddlewareListener = Box<dyn FnOnce(Option<&Error>) + Send>;

/// Collects listeners and fires each exactly once with the sync outcome.
///
/// Listeners subscribing after completion fire immediately with the stored
/// outcome.
#[derive(Default)]
pub(crate) struct MiddlewareNotifier {
    listeners: Mutex<Vec<MiddlewareListener>>,
    outcome: Mutex<Option<Option<Error>>>,
}

impl MiddlewareNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, listener: MiddlewareListener) {
        let mut listeners = self.listeners.lock();
        let settled = self.outcome.lock().clone();
        match settled {
            Some(outcome) => {
                drop(listeners);
                listener(outcome.as_ref());
            }
            None => listeners.push(listener),
        }
    }

    fn complete(&self, outcome: Option<Error>) {
        let drained: Vec<MiddlewareListener> = {
            let mut listeners = self.listeners.lock();
            let mut settled = self.outcome.lock();
            if settled.is_some() {
                return;
            }
            *settled = Some(outcome.clone());
            listeners.drain(..).collect()
        };
        for listener in drained {
            listener(outcome.as_ref());
        }
    }
}

/// Poll the replica until it reaches the chain height captured now.
///
/// Runs detached from the transaction that spawned it; self-terminates
/// after `attempts` tries.
pub(crate) async fn watch_sync(
    chain: Arc<dyn ChainClient>,
    middleware: Arc<dyn MiddlewareClient>,
    notifier: Arc<MiddlewareNotifier>,
    attempts: u32,
    delay: Duration,
) {
    let target = match chain.latest_block().await {
        Ok(info) => info.number,
        Err(err) => {
            tracing::warn!("could not capture chain height for replica sync: {}", err);
            notifier.complete(Some(Error::Middleware { attempts: 0 }));
            return;
        }
    };

    for attempt in 1..=attempts {
        match middleware.latest_synced_block().await {
            Ok(height) if height >= target => {
                tracing::debug!("replica synced to {} (target {})", height, target);
                notifier.complete(None);
                return;
            }
            Ok(height) => {
                tracing::debug!(
                    "replica at {} of {} (attempt {}/{})",
                    height,
                    target,
                    attempt,
                    attempts
                );
            }
            Err(err) => {
                // Swallowed and retried; sync is best-effort.
                tracing::debug!("replica query failed on attempt {}: {}", attempt, err);
            }
        }
        if attempt < attempts {
            tokio::time::sleep(delay).await;
        }
    }

    tracing::warn!("replica did not sync to {} after {} attempts", target, attempts);
    notifier.complete(Some(Error::Middleware { attempts }));
}
