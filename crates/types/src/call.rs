//! Composed Calls - Signable call representations
//!
//! A `ComposedCall` is what the ledger client produces from an operation
//! tag plus arguments, and what gets signed and submitted. Batches share
//! one signature and one nonce.

use crate::tags::TxTag;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A signable call composed by the ledger client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ComposedCall {
    /// A single operation.
    Call { tag: TxTag, args: Value },
    /// Several operations submitted under one signature and nonce.
    /// An atomic batch rolls everything back if any operation fails.
    Batch {
        calls: Vec<ComposedCall>,
        atomic: bool,
    },
}

impl ComposedCall {
    /// Operation tags referenced by this call, batches flattened.
    pub fn tags(&self) -> Vec<TxTag> {
        match self {
            ComposedCall::Call { tag, .. } => vec![*tag],
            ComposedCall::Batch { calls, .. } => calls.iter().flat_map(|c| c.tags()).collect(),
        }
    }
}

/// Block window during which a submitted call remains valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mortality {
    /// Valid forever.
    Immortal,
    /// Valid for `lifetime` blocks after submission.
    Mortal { lifetime: u64 },
}

impl Default for Mortality {
    fn default() -> Self {
        // 64 blocks, the usual era window.
        Mortality::Mortal { lifetime: 64 }
    }
}
