//! The 24-byte frame header every P2P message is wrapped in.

use crate::error::WireError;
use satoshi_core::hashes::checksum;
use satoshi_core::{ByteReader, ByteWriter, Codec};

/// Header size in bytes: 4 magic + 12 command + 4 length + 4 checksum.
pub const HEADER_LEN: usize = 24;
/// Width of the ASCII, NUL-padded command field.
pub const COMMAND_LEN: usize = 12;
/// Protocol-level payload size cap (32 MiB, matching Bitcoin Core's
/// `MAX_PROTOCOL_MESSAGE_LENGTH`).
pub const MAX_PAYLOAD_LEN: u32 = 32 * 1024 * 1024;

/// A decoded frame header, still carrying its own payload length/checksum
/// for the caller to validate once the payload itself is in hand.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameHeader {
    /// This network's magic bytes.
    pub magic: [u8; 4],
    /// Raw, NUL-padded command bytes.
    pub command: [u8; COMMAND_LEN],
    /// Declared payload length.
    pub payload_len: u32,
    /// First 4 bytes of `HASH256(payload)`.
    pub checksum: [u8; 4],
}

impl FrameHeader {
    /// Build a header for an outbound `command`/`payload` pair.
    pub fn new(magic: [u8; 4], command: &str, payload: &[u8]) -> Self {
        let mut command_bytes = [0u8; COMMAND_LEN];
        let name = command.as_bytes();
        let n = name.len().min(COMMAND_LEN);
        command_bytes[..n].copy_from_slice(&name[..n]);
        Self {
            magic,
            command: command_bytes,
            payload_len: payload.len() as u32,
            checksum: checksum(payload),
        }
    }

    /// The command name with its NUL padding trimmed.
    pub fn command_str(&self) -> &str {
        let end = self.command.iter().position(|&b| b == 0).unwrap_or(COMMAND_LEN);
        std::str::from_utf8(&self.command[..end]).unwrap_or("")
    }

    /// Validate that `payload` both fits the declared length bound and
    /// matches this header's checksum.
    pub fn verify_payload(&self, payload: &[u8]) -> Result<(), WireError> {
        if self.payload_len > MAX_PAYLOAD_LEN || payload.len() as u32 != self.payload_len {
            return Err(WireError::PayloadTooLarge);
        }
        if checksum(payload) != self.checksum {
            return Err(WireError::ChecksumMismatch);
        }
        Ok(())
    }
}

impl Codec for FrameHeader {
    fn decode(reader: &mut ByteReader<'_>) -> Option<Self> {
        let magic = reader.read_hash::<4>();
        let command = reader.read_hash::<COMMAND_LEN>();
        let payload_len = reader.read_u32_le();
        let checksum = reader.read_hash::<4>();
        if reader.failed() {
            None
        } else {
            Some(Self {
                magic,
                command,
                payload_len,
                checksum,
            })
        }
    }

    fn encode(&self, writer: &mut ByteWriter) {
        writer.write_bytes(&self.magic);
        writer.write_bytes(&self.command);
        writer.write_u32_le(self.payload_len);
        writer.write_bytes(&self.checksum);
    }

    fn encoded_len(&self) -> usize {
        HEADER_LEN
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn roundtrips() {
        let header = FrameHeader::new([0xF9, 0xBE, 0xB4, 0xD9], "ping", &[1, 2, 3, 4]);
        let bytes = header.to_bytes();
        assert_eq!(bytes.len(), HEADER_LEN);
        let back = FrameHeader::from_bytes(&bytes).unwrap();
        assert_eq!(back, header);
        assert_eq!(back.command_str(), "ping");
    }

    #[test]
    fn checksum_mismatch_is_detected() {
        let header = FrameHeader::new([0xF9, 0xBE, 0xB4, 0xD9], "ping", &[1, 2, 3, 4]);
        assert_eq!(header.verify_payload(&[1, 2, 3, 4]), Ok(()));
        assert_eq!(
            header.verify_payload(&[9, 9, 9, 9]),
            Err(WireError::ChecksumMismatch)
        );
    }
}
