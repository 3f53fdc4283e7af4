//! Runtime Context
//!
//! A cheap-to-clone handle bundling the chain client, the optional read
//! replica and the runtime configuration. Passed explicitly to procedures
//! and transactions; there is no shared mutable context.

use crate::config::RuntimeConfig;
use ledger_client::{ChainClient, MiddlewareClient};
use std::sync::Arc;

/// Collaborators and configuration for one runtime instance.
#[derive(Clone)]
pub struct Context {
    chain: Arc<dyn ChainClient>,
    middleware: Option<Arc<dyn MiddlewareClient>>,
    config: Arc<RuntimeConfig>,
}

impl Context {
    pub fn new(chain: Arc<dyn ChainClient>) -> Self {
        Self {
            chain,
            middleware: None,
            config: Arc::new(RuntimeConfig::default()),
        }
    }

    /// Enable best-effort replica sync notifications.
    pub fn with_middleware(mut self, middleware: Arc<dyn MiddlewareClient>) -> Self {
        self.middleware = Some(middleware);
        self
    }

    pub fn with_config(mut self, config: RuntimeConfig) -> Self {
        self.config = Arc::new(config);
        self
    }

    pub fn chain(&self) -> &Arc<dyn ChainClient> {
        &self.chain
    }

    pub fn middleware(&self) -> Option<&Arc<dyn MiddlewareClient>> {
        self.middleware.as_ref()
    }

    pub fn middleware_enabled(&self) -> bool {
        self.middleware.is_some()
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }
}
