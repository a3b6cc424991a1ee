//! Transaction outputs.

use crate::script::Script;
use satoshi_core::{ByteReader, ByteWriter, Codec};

/// A transaction output: an amount and the script that must be satisfied to
/// spend it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Output {
    /// Value in satoshis.
    pub value: u64,
    /// The locking script.
    pub script: Script,
}

impl Output {
    /// Build an output from its parts.
    pub fn new(value: u64, script: Script) -> Self {
        Self { value, script }
    }
}

impl Codec for Output {
    fn decode(reader: &mut ByteReader<'_>) -> Option<Self> {
        let value = reader.read_u64_le();
        let script = Script::decode(reader)?;
        if reader.failed() {
            None
        } else {
            Some(Self { value, script })
        }
    }

    fn encode(&self, writer: &mut ByteWriter) {
        writer.write_u64_le(self.value);
        self.script.encode(writer);
    }

    fn encoded_len(&self) -> usize {
        8 + self.script.encoded_len()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn roundtrips() {
        let out = Output::new(5_000_000_000, Script::new(vec![0x76, 0xa9]));
        let bytes = out.to_bytes();
        assert_eq!(bytes.len(), out.encoded_len());
        assert_eq!(Output::from_bytes(&bytes).unwrap(), out);
    }
}
