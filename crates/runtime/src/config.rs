//! Runtime Configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tunables for the transaction runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Interval between latest-block polls in the polling strategy.
    pub finality_poll_interval_ms: u64,
    /// Replica sync attempts before giving up.
    pub middleware_sync_attempts: u32,
    /// Delay between replica sync attempts.
    pub middleware_retry_delay_ms: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            finality_poll_interval_ms: 1_000,
            middleware_sync_attempts: 6,
            middleware_retry_delay_ms: 2_000,
        }
    }
}

impl RuntimeConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.finality_poll_interval_ms)
    }

    pub fn middleware_retry_delay(&self) -> Duration {
        Duration::from_millis(self.middleware_retry_delay_ms)
    }
}
