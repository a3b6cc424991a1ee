//! Per-input witness stacks introduced by BIP141.

use satoshi_core::{ByteReader, ByteWriter, Codec};

/// An ordered list of stack items carried alongside a segwit input, outside
/// the legacy txid preimage.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Witness {
    /// The stack items, pushed in order.
    pub items: Vec<Vec<u8>>,
}

impl Witness {
    /// An empty witness, as carried by every input of a non-segwit transaction.
    pub fn empty() -> Self {
        Self { items: Vec::new() }
    }

    /// True if this input carries no witness data.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl From<Vec<Vec<u8>>> for Witness {
    fn from(items: Vec<Vec<u8>>) -> Self {
        Self { items }
    }
}

impl Codec for Witness {
    fn decode(reader: &mut ByteReader<'_>) -> Option<Self> {
        let count = reader.read_varint();
        let mut items = Vec::with_capacity(count.min(10_000) as usize);
        for _ in 0..count {
            items.push(reader.read_var_bytes());
            if reader.failed() {
                return None;
            }
        }
        Some(Self { items })
    }

    fn encode(&self, writer: &mut ByteWriter) {
        writer.write_varint(self.items.len() as u64);
        for item in &self.items {
            writer.write_var_bytes(item);
        }
    }

    fn encoded_len(&self) -> usize {
        satoshi_core::ser::varint_len(self.items.len() as u64)
            + self
                .items
                .iter()
                .map(|i| satoshi_core::ser::varint_len(i.len() as u64) + i.len())
                .sum::<usize>()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn empty_witness_is_one_byte() {
        let w = Witness::empty();
        assert_eq!(w.to_bytes(), vec![0x00]);
    }

    #[test]
    fn roundtrips_multi_item_witness() {
        let w = Witness::from(vec![vec![1, 2, 3], vec![], vec![0xff; 71]]);
        let bytes = w.to_bytes();
        assert_eq!(bytes.len(), w.encoded_len());
        assert_eq!(Witness::from_bytes(&bytes).unwrap(), w);
    }
}
