//! Wire-level framing errors.

use thiserror::Error;

/// Failures reading a frame off the wire.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WireError {
    /// The frame header did not carry this network's magic bytes.
    #[error("frame magic does not match the expected network")]
    WrongNetwork,
    /// `HASH256(payload)[:4]` did not match the header's checksum field.
    #[error("payload checksum mismatch")]
    ChecksumMismatch,
    /// The header declared a payload larger than the protocol allows.
    #[error("payload length exceeds the protocol message size limit")]
    PayloadTooLarge,
    /// A command-specific payload did not decode cleanly.
    #[error("malformed {0} payload")]
    Malformed(&'static str),
    /// The header named a command this crate has no schema for. Not fatal
    /// by itself — callers are expected to discard the payload and keep
    /// reading, per the shared channel invariant.
    #[error("unrecognized command {0:?}")]
    UnknownCommand(String),
}
