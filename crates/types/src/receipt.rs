//! Blocks, Events and Receipts
//!
//! What the runtime sees back from the chain: block headers, per-extrinsic
//! event lists, and the finalized receipt a transaction resolves against.

use crate::ids::{AccountAddress, BlockHash, TxHash};
use crate::BlockNumber;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Decoded on-chain failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnChainError {
    /// Pallet / module that raised the error.
    pub module: String,
    /// Error name within the module.
    pub name: String,
    /// Documentation attached to the error definition.
    pub docs: String,
}

impl fmt::Display for OnChainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}: {}", self.module, self.name, self.docs)
    }
}

/// Event emitted while executing an extrinsic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ChainEvent {
    /// The extrinsic executed successfully.
    ExtrinsicSuccess,
    /// The extrinsic failed on-chain.
    ExtrinsicFailed { error: OnChainError },
    /// A multisig proposal was created.
    ProposalAdded {
        multisig: AccountAddress,
        proposal_id: u64,
    },
    /// Any other domain event.
    Other {
        pallet: String,
        name: String,
        data: Value,
    },
}

/// Latest-block header info.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockInfo {
    pub hash: BlockHash,
    pub number: BlockNumber,
}

/// An extrinsic included in a block, with its emitted events.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtrinsicEntry {
    pub tx_hash: TxHash,
    pub index: u32,
    pub events: Vec<ChainEvent>,
}

/// A finalized block with its extrinsics.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockDetails {
    pub hash: BlockHash,
    pub number: BlockNumber,
    pub extrinsics: Vec<ExtrinsicEntry>,
}

impl BlockDetails {
    /// Find the extrinsic with the given hash, if included in this block.
    pub fn find_extrinsic(&self, tx_hash: &TxHash) -> Option<&ExtrinsicEntry> {
        self.extrinsics.iter().find(|e| &e.tx_hash == tx_hash)
    }
}

/// Finalized receipt for a submitted transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct TxReceipt {
    pub tx_hash: TxHash,
    pub block_hash: BlockHash,
    pub block_number: BlockNumber,
    pub tx_index: u32,
    pub events: Vec<ChainEvent>,
}

impl TxReceipt {
    /// The decoded failure event, if the extrinsic failed on-chain.
    pub fn failure(&self) -> Option<&OnChainError> {
        self.events.iter().find_map(|event| match event {
            ChainEvent::ExtrinsicFailed { error } => Some(error),
            _ => None,
        })
    }

    /// The created multisig proposal, if one was emitted.
    pub fn proposal_added(&self) -> Option<(&AccountAddress, u64)> {
        self.events.iter().find_map(|event| match event {
            ChainEvent::ProposalAdded {
                multisig,
                proposal_id,
            } => Some((multisig, *proposal_id)),
            _ => None,
        })
    }
}
