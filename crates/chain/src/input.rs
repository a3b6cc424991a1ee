//! Transaction inputs.
//!
//! [`Input::decode`]/[`Input::encode`] cover only `previous_output ‖ script ‖
//! sequence` — the form shared by both the legacy and segwit transaction
//! serializations. Witness data is never part of an individual input's wire
//! record; [`crate::transaction::Transaction`] reads/writes the witness
//! vector as its own, input-count-aligned block and attaches each witness to
//! its input in memory.

use crate::{point::Point, script::Script, witness::Witness};
use satoshi_core::{ByteReader, ByteWriter, Codec};

/// A transaction input.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Input {
    /// The output being spent.
    pub previous_output: Point,
    /// The unlocking script (empty for a pure-witness spend).
    pub script: Script,
    /// The sequence field (RBF signaling / BIP68 relative locktime).
    pub sequence: u32,
    /// The witness stack, empty unless the containing transaction is
    /// segwit-marked.
    pub witness: Witness,
}

impl Input {
    /// Build an input from its parts, with an empty witness.
    pub fn new(previous_output: Point, script: Script, sequence: u32) -> Self {
        Self {
            previous_output,
            script,
            sequence,
            witness: Witness::empty(),
        }
    }

    /// A copy of this input with its unlocking script cleared, used to build
    /// the signing preimage.
    pub fn unsigned(&self) -> Self {
        Self {
            previous_output: self.previous_output,
            script: Script::empty(),
            sequence: self.sequence,
            witness: Witness::empty(),
        }
    }
}

impl Codec for Input {
    fn decode(reader: &mut ByteReader<'_>) -> Option<Self> {
        let previous_output = Point::decode(reader)?;
        let script = Script::decode(reader)?;
        let sequence = reader.read_u32_le();
        if reader.failed() {
            None
        } else {
            Some(Self {
                previous_output,
                script,
                sequence,
                witness: Witness::empty(),
            })
        }
    }

    fn encode(&self, writer: &mut ByteWriter) {
        self.previous_output.encode(writer);
        self.script.encode(writer);
        writer.write_u32_le(self.sequence);
    }

    fn encoded_len(&self) -> usize {
        self.previous_output.encoded_len() + self.script.encoded_len() + 4
    }
}

/// Sigops contributed by a P2SH redeem script embedded in `input`'s
/// scriptSig, given the script of the output it spends. Zero if that output
/// is not P2SH-shaped.
pub(crate) fn embedded_signature_operations(input: &Input, previous_output_script: &Script) -> usize {
    let bytes = previous_output_script.as_bytes();
    let is_p2sh = bytes.len() == 23 && bytes[0] == 0xa9 && bytes[1] == 0x14 && bytes[22] == 0x87;
    if !is_p2sh {
        return 0;
    }
    let Some(redeem_bytes) = input.script.operations().last().and_then(|op| op.data.clone()) else {
        return 0;
    };
    crate::transaction::count_legacy_sigops(&Script::new(redeem_bytes), true)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn roundtrips_without_witness() {
        let input = Input::new(Point::null(), Script::new(vec![0x51]), 0xffff_ffff);
        let bytes = input.to_bytes();
        assert_eq!(bytes.len(), input.encoded_len());
        let back = Input::from_bytes(&bytes).unwrap();
        assert_eq!(back.previous_output, input.previous_output);
        assert_eq!(back.script, input.script);
        assert_eq!(back.sequence, input.sequence);
        assert!(back.witness.is_empty());
    }
}
