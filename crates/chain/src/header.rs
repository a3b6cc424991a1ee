//! Block headers: the 80-byte structure proof-of-work is mined against.

use crate::error::{AcceptHeaderError, CheckHeaderError};
use satoshi_core::compact::{satisfies_pow, CompactError};
use satoshi_core::{hashes::hash256, ByteReader, ByteWriter, Codec, Hash32};

/// An 80-byte block header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Header {
    /// Block version (also carries soft-fork signaling bits since BIP9).
    pub version: u32,
    /// Hash of the previous block's header.
    pub previous_block_hash: Hash32,
    /// Merkle root of the block's transactions, by txid.
    pub merkle_root: Hash32,
    /// Unix timestamp.
    pub timestamp: u32,
    /// Compact-encoded proof-of-work target.
    pub bits: u32,
    /// Proof-of-work nonce.
    pub nonce: u32,
}

/// Context [`Header::accept`] needs beyond the header's own bytes.
pub struct HeaderAcceptContext {
    /// Minimum header version currently required (soft-fork enforcement).
    pub minimum_block_version: u32,
    /// Median timestamp of the preceding eleven blocks.
    pub median_time_past: u32,
    /// The `bits` value the retargeting rule requires at this height.
    pub required_bits: u32,
    /// This header's height in the chain, for checkpoint matching.
    pub height: u32,
    /// Checkpoint hash required at `height`, if any.
    pub checkpoint: Option<Hash32>,
}

impl Header {
    /// Double-SHA-256 of the 80-byte serialization.
    pub fn hash(&self) -> Hash32 {
        hash256(&self.to_bytes())
    }

    /// Stateless checks: proof-of-work against the header's own `bits`, and
    /// the timestamp not being absurdly far in the future.
    pub fn check(&self, now: u32, futuristic_limit_seconds: u32) -> Result<(), CheckHeaderError> {
        match satisfies_pow(&self.hash().0, self.bits) {
            Ok(true) => {}
            Ok(false) | Err(CompactError::Overflow) | Err(CompactError::NegativeMantissa) => {
                return Err(CheckHeaderError::InvalidProofOfWork)
            }
        }
        if self.timestamp > now.saturating_add(futuristic_limit_seconds) {
            return Err(CheckHeaderError::FuturisticTimestamp);
        }
        Ok(())
    }

    /// Contextual checks: version signaling, median-time-past ordering,
    /// retargeted difficulty, and checkpoint agreement.
    pub fn accept(&self, context: &HeaderAcceptContext) -> Result<(), AcceptHeaderError> {
        if let Some(expected) = context.checkpoint {
            if self.hash() != expected {
                return Err(AcceptHeaderError::CheckpointsFailed);
            }
        }
        if self.version < context.minimum_block_version {
            return Err(AcceptHeaderError::InvalidBlockVersion);
        }
        if self.timestamp <= context.median_time_past {
            return Err(AcceptHeaderError::TimestampTooEarly);
        }
        if self.bits != context.required_bits {
            return Err(AcceptHeaderError::IncorrectProofOfWork);
        }
        Ok(())
    }
}

impl Codec for Header {
    fn decode(reader: &mut ByteReader<'_>) -> Option<Self> {
        let version = reader.read_u32_le();
        let previous_block_hash = Hash32::decode(reader)?;
        let merkle_root = Hash32::decode(reader)?;
        let timestamp = reader.read_u32_le();
        let bits = reader.read_u32_le();
        let nonce = reader.read_u32_le();
        if reader.failed() {
            None
        } else {
            Some(Self {
                version,
                previous_block_hash,
                merkle_root,
                timestamp,
                bits,
                nonce,
            })
        }
    }

    fn encode(&self, writer: &mut ByteWriter) {
        writer.write_u32_le(self.version);
        self.previous_block_hash.encode(writer);
        self.merkle_root.encode(writer);
        writer.write_u32_le(self.timestamp);
        writer.write_u32_le(self.bits);
        writer.write_u32_le(self.nonce);
    }

    fn encoded_len(&self) -> usize {
        80
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn genesis_header_hash() {
        let header = Header {
            version: 1,
            previous_block_hash: Hash32::zero(),
            merkle_root: Hash32::from_reversed_hex(
                "4a5e1e4baab89f3a32518a88c31bc87f618f76673e2cc77ab2127b7afdeda33",
            )
            .unwrap(),
            timestamp: 1_231_006_505,
            bits: 0x1d00_ffff,
            nonce: 2_083_236_893,
        };
        assert_eq!(
            header.hash().to_reversed_hex(),
            "000000000019d6689c085ae165831e934ff763ae46a2a6c172b3f1b60a8ce26"
        );
    }

    #[test]
    fn header_roundtrips_to_80_bytes() {
        let header = Header {
            version: 1,
            previous_block_hash: Hash32::zero(),
            merkle_root: Hash32::zero(),
            timestamp: 0,
            bits: 0x207f_ffff,
            nonce: 0,
        };
        let bytes = header.to_bytes();
        assert_eq!(bytes.len(), 80);
        assert_eq!(Header::from_bytes(&bytes).unwrap(), header);
    }

    #[test]
    fn check_rejects_futuristic_timestamp() {
        let header = Header {
            version: 1,
            previous_block_hash: Hash32::zero(),
            merkle_root: Hash32::zero(),
            timestamp: 10_000,
            bits: 0x207f_ffff,
            nonce: 0,
        };
        assert_eq!(
            header.check(100, 7200),
            Err(CheckHeaderError::FuturisticTimestamp)
        );
    }
}
