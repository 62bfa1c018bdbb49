//! Error types for the Arbor ledger.
use thiserror::Error;

/// Reasons a [`TransactionValidator`](crate::traits::TransactionValidator)
/// rejects a transaction.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransactionError {
    #[error("unknown UTXO: {0}")] UnknownUtxo(String),
    #[error("insufficient funds: have {have}, need {need}")] InsufficientFunds { have: u64, need: u64 },
    #[error("duplicate input: {0}")] DuplicateInput(String),
    #[error("empty inputs or outputs")] EmptyInputsOrOutputs,
    #[error("value overflow")] ValueOverflow,
    #[error("zero-value output at index {0}")] ZeroValueOutput(usize),
    #[error("coinbase transaction outside the coinbase slot")] UnexpectedCoinbase,
    #[error("serialization: {0}")] Serialization(String),
}

/// Reasons a candidate block is refused by the fork tree.
///
/// Every variant is an expected outcome of gossip (a peer may be malicious or
/// simply behind); none of them alters retained state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChainError {
    #[error("malformed block: {0}")] MalformedBlock(String),
    #[error("unknown parent: {0}")] UnknownParent(String),
    #[error("stale branch: height {height} is at or below retention floor {floor}")] StaleBranch { height: u64, floor: u64 },
    #[error("invalid transaction at index {index}: {source}")] InvalidTransaction { index: usize, source: TransactionError },
    #[error("duplicate block: {0}")] DuplicateBlock(String),
}

impl ChainError {
    /// Whether the caller may keep running after this rejection.
    ///
    /// Admission never fails fatally; the tree is untouched on every error.
    pub fn is_recoverable(&self) -> bool {
        true
    }

    /// Short machine-readable label, used as a structured log field.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MalformedBlock(_) => "malformed_block",
            Self::UnknownParent(_) => "unknown_parent",
            Self::StaleBranch { .. } => "stale_branch",
            Self::InvalidTransaction { .. } => "invalid_transaction",
            Self::DuplicateBlock(_) => "duplicate_block",
        }
    }
}

#[derive(Error, Debug)]
pub enum ArborError {
    #[error(transparent)] Transaction(#[from] TransactionError),
    #[error(transparent)] Chain(#[from] ChainError),
    #[error("config: {0}")] Config(String),
}
