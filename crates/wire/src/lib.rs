//! # Satoshi Wire
//!
//! The P2P wire protocol: the 24-byte frame header ([`frame::FrameHeader`])
//! every message travels inside, and the per-command payload schemas
//! ([`messages::Message`]) built on [`satoshi_chain`]'s transaction and
//! block codecs.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod frame;
pub mod messages;

pub use error::WireError;
pub use frame::FrameHeader;
pub use messages::Message;

use satoshi_core::Codec;

/// Serialize `message` into a complete frame (header + payload) for the
/// given network magic.
pub fn encode_frame(magic: [u8; 4], message: &Message) -> Vec<u8> {
    let payload = message.encode_payload();
    let header = FrameHeader::new(magic, message.command(), &payload);
    let mut out = header.to_bytes();
    out.extend_from_slice(&payload);
    out
}

/// Parse a complete frame's header and, if the command is recognized and
/// the checksum matches, its decoded message.
///
/// Returns `Ok(None)` for a well-formed frame whose command this crate
/// doesn't know how to decode — per the channel's shared invariant, the
/// caller discards the payload and keeps reading rather than treating this
/// as an error.
pub fn decode_frame(magic: [u8; 4], bytes: &[u8]) -> Result<Option<Message>, WireError> {
    if bytes.len() < frame::HEADER_LEN {
        return Err(WireError::Malformed("frame"));
    }
    let header = FrameHeader::from_bytes(&bytes[..frame::HEADER_LEN]).ok_or(WireError::Malformed("header"))?;
    if header.magic != magic {
        return Err(WireError::WrongNetwork);
    }
    let payload = &bytes[frame::HEADER_LEN..];
    header.verify_payload(payload)?;
    Ok(Message::decode(header.command_str(), payload))
}

#[cfg(test)]
mod test {
    use super::*;
    use messages::NonceMessage;

    const MAGIC: [u8; 4] = [0xF9, 0xBE, 0xB4, 0xD9];

    #[test]
    fn round_trips_a_full_frame() {
        let message = Message::Ping(NonceMessage { nonce: 99 });
        let bytes = encode_frame(MAGIC, &message);
        let decoded = decode_frame(MAGIC, &bytes).unwrap();
        assert_eq!(decoded, Some(message));
    }

    #[test]
    fn wrong_network_is_rejected() {
        let message = Message::Ping(NonceMessage { nonce: 99 });
        let bytes = encode_frame([0xFA, 0xBF, 0xB5, 0xDA], &message);
        assert_eq!(decode_frame(MAGIC, &bytes), Err(WireError::WrongNetwork));
    }

    #[test]
    fn unknown_command_is_not_an_error() {
        let header = FrameHeader::new(MAGIC, "notacommand", &[]);
        let mut bytes = header.to_bytes();
        bytes.extend_from_slice(&[]);
        assert_eq!(decode_frame(MAGIC, &bytes), Ok(None));
    }
}
