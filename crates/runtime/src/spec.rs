//! Operation Specs - Declarative output of a procedure body
//!
//! A body returns either one operation or a batch, plus a resolver that
//! turns the finalized receipt into the domain result.

use crate::error::Result;
use ledger_types::{AccountAddress, Balance, TxReceipt, TxTag};
use serde_json::Value;

/// One declarative ledger operation.
#[derive(Debug, Clone)]
pub struct Operation {
    pub tag: TxTag,
    pub args: Value,
    /// Explicit protocol-fee override replacing the computed value.
    pub fee: Option<Balance>,
    /// Multiplies the per-operation protocol fee (e.g. per created item).
    pub fee_multiplier: Option<u32>,
    /// In a non-atomic batch, failure of a critical operation still fails
    /// the whole batch.
    pub is_critical: bool,
}

impl Operation {
    pub fn new(tag: TxTag, args: Value) -> Self {
        Self {
            tag,
            args,
            fee: None,
            fee_multiplier: None,
            is_critical: true,
        }
    }

    pub fn with_fee(mut self, fee: Balance) -> Self {
        self.fee = Some(fee);
        self
    }

    pub fn with_fee_multiplier(mut self, multiplier: u32) -> Self {
        self.fee_multiplier = Some(multiplier);
        self
    }

    pub fn non_critical(mut self) -> Self {
        self.is_critical = false;
        self
    }
}

/// One operation, or several sharing a signature and nonce.
#[derive(Debug, Clone)]
pub enum OperationSet {
    Single(Operation),
    Batch(Vec<Operation>),
}

impl OperationSet {
    pub fn operations(&self) -> &[Operation] {
        match self {
            OperationSet::Single(op) => std::slice::from_ref(op),
            OperationSet::Batch(ops) => ops,
        }
    }
}

/// How the domain result is produced once the transaction finalizes.
pub enum Resolver<R> {
    /// Known up front.
    Value(R),
    /// Computed from the finalized receipt.
    FromReceipt(Box<dyn FnOnce(&TxReceipt) -> Result<R> + Send>),
}

impl<R> Resolver<R> {
    pub fn from_receipt(f: impl FnOnce(&TxReceipt) -> Result<R> + Send + 'static) -> Self {
        Resolver::FromReceipt(Box::new(f))
    }

    /// Evaluate against the finalized receipt.
    pub fn resolve(self, receipt: &TxReceipt) -> Result<R> {
        match self {
            Resolver::Value(value) => Ok(value),
            Resolver::FromReceipt(f) => f(receipt),
        }
    }
}

/// Everything a procedure body hands back to the compiler.
pub struct ProcedureSpec<R> {
    pub operations: OperationSet,
    pub resolver: Resolver<R>,
    /// Fee-payer override: this account pays via its own primary key.
    pub paid_for_by: Option<AccountAddress>,
}

impl<R> ProcedureSpec<R> {
    pub fn single(operation: Operation, resolver: Resolver<R>) -> Self {
        Self {
            operations: OperationSet::Single(operation),
            resolver,
            paid_for_by: None,
        }
    }

    pub fn batch(operations: Vec<Operation>, resolver: Resolver<R>) -> Self {
        Self {
            operations: OperationSet::Batch(operations),
            resolver,
            paid_for_by: None,
        }
    }

    pub fn paid_by(mut self, account: AccountAddress) -> Self {
        self.paid_for_by = Some(account);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledger_types::{BlockHash, ChainEvent, TxHash};
    use serde_json::json;

    fn receipt() -> TxReceipt {
        TxReceipt {
            tx_hash: TxHash([1; 32]),
            block_hash: BlockHash([2; 32]),
            block_number: 3,
            tx_index: 0,
            events: vec![ChainEvent::ExtrinsicSuccess],
        }
    }

    #[test]
    fn literal_resolver_ignores_receipt() {
        let resolver = Resolver::Value(7u32);
        assert_eq!(resolver.resolve(&receipt()).unwrap(), 7);
    }

    #[test]
    fn computed_resolver_reads_receipt() {
        let resolver = Resolver::from_receipt(|r| Ok(r.block_number));
        assert_eq!(resolver.resolve(&receipt()).unwrap(), 3);
    }

    #[test]
    fn single_set_exposes_one_operation() {
        let spec = ProcedureSpec::single(
            Operation::new(TxTag::AssetIssue, json!({})),
            Resolver::Value(()),
        );
        assert_eq!(spec.operations.operations().len(), 1);
    }
}
