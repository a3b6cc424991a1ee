//! Outpoints: the `(txid, index)` pair identifying a spent output.

use satoshi_core::{ByteReader, ByteWriter, Codec, Hash32};

/// A reference to a previous transaction output. The all-zero/`0xFFFFFFFF`
/// sentinel is reserved for the single input of a coinbase transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Point {
    /// Hash of the transaction that created the referenced output.
    pub tx_hash: Hash32,
    /// Index of the output within that transaction.
    pub index: u32,
}

impl Point {
    /// Build an outpoint from its parts.
    pub fn new(tx_hash: Hash32, index: u32) -> Self {
        Self { tx_hash, index }
    }

    /// The null outpoint used by coinbase inputs.
    pub fn null() -> Self {
        Self {
            tx_hash: Hash32::zero(),
            index: 0xffff_ffff,
        }
    }

    /// True if this is the coinbase sentinel outpoint.
    pub fn is_null(&self) -> bool {
        self.tx_hash.is_zero() && self.index == 0xffff_ffff
    }
}

impl Default for Point {
    fn default() -> Self {
        Self::null()
    }
}

impl Codec for Point {
    fn decode(reader: &mut ByteReader<'_>) -> Option<Self> {
        let tx_hash = Hash32::decode(reader)?;
        let index = reader.read_u32_le();
        if reader.failed() {
            None
        } else {
            Some(Self { tx_hash, index })
        }
    }

    fn encode(&self, writer: &mut ByteWriter) {
        self.tx_hash.encode(writer);
        writer.write_u32_le(self.index);
    }

    fn encoded_len(&self) -> usize {
        36
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn null_point_roundtrips() {
        let p = Point::null();
        let bytes = p.to_bytes();
        assert_eq!(bytes.len(), 36);
        assert_eq!(Point::from_bytes(&bytes).unwrap(), p);
        assert!(p.is_null());
    }

    #[test]
    fn non_null_point_is_not_null() {
        let p = Point::new(Hash32([1u8; 32]), 0);
        assert!(!p.is_null());
    }
}
