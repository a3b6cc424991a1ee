//! Consensus check/accept error taxonomies, grouped by validation stage.

use thiserror::Error;

/// Errors from stateless header validation (`Header::check`).
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum CheckHeaderError {
    /// The header hash exceeds its own `bits` target, or `bits` itself is
    /// malformed (overflow / sign bit / doesn't expand).
    #[error("header hash does not satisfy its proof-of-work target")]
    InvalidProofOfWork,
    /// The header's timestamp is further in the future than the local
    /// tolerance (historically two hours).
    #[error("header timestamp is too far in the future")]
    FuturisticTimestamp,
}

/// Errors from contextual header validation (`Header::accept`).
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AcceptHeaderError {
    /// The header's hash at this height contradicts a known checkpoint.
    #[error("header contradicts a known checkpoint")]
    CheckpointsFailed,
    /// The header's version is below the minimum required for the current
    /// soft-fork activation state.
    #[error("header version below minimum required")]
    InvalidBlockVersion,
    /// The header's timestamp does not exceed the median of the preceding
    /// eleven blocks.
    #[error("header timestamp not after median-time-past")]
    TimestampTooEarly,
    /// The header's `bits` field does not match the value the retargeting
    /// rule requires at this height.
    #[error("header bits does not match the required difficulty")]
    IncorrectProofOfWork,
}

/// Errors from stateless transaction validation (`Transaction::check`).
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum CheckTxError {
    /// A transaction with no inputs or no outputs.
    #[error("transaction has no inputs or no outputs")]
    EmptyTransaction,
    /// A non-coinbase transaction spends the null outpoint.
    #[error("non-coinbase transaction spends the null outpoint")]
    PreviousOutputNull,
    /// Total output value overflows or exceeds the maximum money supply.
    #[error("transaction output value overflows or exceeds the money supply")]
    SpendOverflow,
    /// A coinbase's scriptSig is shorter than 2 or longer than 100 bytes.
    #[error("coinbase scriptSig size outside [2, 100]")]
    InvalidCoinbaseScriptSize,
    /// A coinbase shape was found where the caller required a non-coinbase
    /// transaction.
    #[error("unexpected coinbase transaction")]
    CoinbaseTransaction,
    /// Two inputs of the same transaction reference the same outpoint.
    #[error("transaction spends the same outpoint twice")]
    TransactionInternalDoubleSpend,
    /// Serialized transaction size exceeds the protocol limit.
    #[error("transaction exceeds the maximum serialized size")]
    TransactionSizeLimit,
    /// Legacy (non-witness-discounted) sigop count exceeds the per-transaction cap.
    #[error("transaction exceeds the legacy sigop limit")]
    TransactionLegacySigopLimit,
}

/// Errors from contextual transaction validation (`Transaction::accept`).
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AcceptTxError {
    /// The transaction's locktime/sequence relative-lock has not matured.
    #[error("transaction is not yet final")]
    TransactionNonFinal,
    /// An input references an outpoint not found in the UTXO set.
    #[error("input references a missing previous output")]
    MissingPreviousOutput,
    /// An input references an outpoint already spent.
    #[error("input double-spends an already-spent output")]
    DoubleSpend,
    /// An input spends a coinbase output before it has matured.
    #[error("input spends an immature coinbase output")]
    CoinbaseMaturity,
    /// Total output value exceeds total input value.
    #[error("transaction spends more value than its inputs provide")]
    SpendExceedsValue,
    /// Total sigop count (including P2SH/witness-embedded) exceeds the cap.
    #[error("transaction exceeds the embedded sigop limit")]
    TransactionEmbeddedSigopLimit,
    /// A BIP68 relative-locktime sequence has not matured.
    #[error("input's relative locktime has not matured")]
    SequenceLocked,
}

/// Errors from stateless block validation (`Block::check`).
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum CheckBlockError {
    /// Serialized block size exceeds the protocol limit.
    #[error("block exceeds the maximum serialized size")]
    BlockSizeLimit,
    /// A block with no transactions.
    #[error("block has no transactions")]
    EmptyBlock,
    /// The first transaction is not a coinbase.
    #[error("block's first transaction is not a coinbase")]
    FirstNotCoinbase,
    /// More than one transaction is coinbase-shaped.
    #[error("block has more than one coinbase transaction")]
    ExtraCoinbases,
    /// Two transactions in the block are identical (txid collision).
    #[error("block contains a duplicate transaction")]
    InternalDuplicate,
    /// Two transactions in the block spend the same outpoint.
    #[error("block contains an internal double-spend")]
    BlockInternalDoubleSpend,
    /// A non-coinbase transaction spends an output created later in the
    /// same block.
    #[error("transaction spends an output from later in the same block")]
    ForwardReference,
    /// The computed merkle root does not match `header.merkle_root`.
    #[error("computed merkle root does not match the header")]
    MerkleMismatch,
    /// Total legacy sigop count across the block exceeds the cap.
    #[error("block exceeds the legacy sigop limit")]
    BlockLegacySigopLimit,
}

/// Errors from contextual block validation (`Block::accept`).
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AcceptBlockError {
    /// Some transaction in the block is not final at this height/MTP.
    #[error("block contains a non-final transaction")]
    BlockNonFinal,
    /// The coinbase's BIP34 height push does not match the block's actual height.
    #[error("coinbase height commitment does not match the block height")]
    CoinbaseHeightMismatch,
    /// The coinbase claims more value than subsidy plus fees allows.
    #[error("coinbase claims more value than subsidy plus fees")]
    CoinbaseValueLimit,
    /// Total sigop count (including witness-embedded) across the block
    /// exceeds the cap.
    #[error("block exceeds the embedded sigop limit")]
    BlockEmbeddedSigopLimit,
    /// The coinbase's witness commitment output does not match the
    /// witness merkle root.
    #[error("witness commitment does not match the witness merkle root")]
    InvalidWitnessCommitment,
    /// Total block weight (BIP141) exceeds the cap.
    #[error("block exceeds the maximum weight")]
    BlockWeightLimit,
}
