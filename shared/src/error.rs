use thiserror::Error;

/// Crate-wide error taxonomy: codec failures, ledger validation failures,
/// and peer/network failures, per the spec's error-handling design.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BlockchainError {
    // --- codec errors ---
    #[error("decoded object does not re-encode to the same length")]
    CodecMismatch,
    #[error("unknown transaction or message type tag")]
    UnknownType,
    #[error("VLI-prefixed field is truncated")]
    TruncatedVli,

    // --- validation errors ---
    #[error("block id does not satisfy the proof-of-work target")]
    TargetNotMet,
    #[error("block's prev_hash does not match the chain tip")]
    PrevHashMismatch,
    #[error("referenced UTXO is missing")]
    MissingUtxo,
    #[error("signature does not verify against the recorded output address")]
    BadSignature,
    #[error("input already consumed by another transaction")]
    DoubleSpend,
    #[error("outputs exceed inputs plus block reward")]
    AmountOverflow,
    #[error("mining transaction height does not equal current height + 1")]
    BadMiningHeight,
    #[error("mining reward exceeds remaining total mining amount")]
    RewardTooLarge,
    #[error("pop_block found an output already consumed")]
    PoppedOutputAlreadyConsumed,

    // --- curve errors ---
    #[error("curve group order is not prime")]
    CurveOrderNotPrime,
    #[error("point is not on the curve")]
    NotOnCurve,
    #[error("value has no square root modulo p")]
    NoSquareRoot,

    // --- peer/network errors ---
    #[error("connection refused by peer")]
    ConnectionRefused,
    #[error("operation timed out")]
    Timeout,
    #[error("checksum does not match payload")]
    ChecksumMismatch,
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<crate::curve::CurveError> for BlockchainError {
    fn from(err: crate::curve::CurveError) -> Self {
        match err {
            crate::curve::CurveError::CurveOrderNotPrime => Self::CurveOrderNotPrime,
            crate::curve::CurveError::NotOnCurve => Self::NotOnCurve,
            crate::curve::CurveError::NoSquareRoot => Self::NoSquareRoot,
        }
    }
}

pub type Result<T> = std::result::Result<T, BlockchainError>;
