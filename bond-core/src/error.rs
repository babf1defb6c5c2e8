use shared::BlockchainError;
use thiserror::Error;

/// Thin node-level wrapper around [`shared::BlockchainError`], adding the
/// handful of failure modes that only make sense above the ledger (peer
/// I/O, mempool bookkeeping).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BondError {
    #[error(transparent)]
    Ledger(#[from] BlockchainError),

    #[error("transaction already present in mempool or orphan pool")]
    DuplicateTransaction,

    #[error("mining was interrupted")]
    MiningInterrupted,
}

pub type BondResult<T> = std::result::Result<T, BondError>;
