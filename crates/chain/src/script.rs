//! Scripts: the raw byte stream carried on the wire, plus the parsed
//! operation-list view `satoshi-script` executes.

use satoshi_core::{ByteReader, ByteWriter, Codec};

/// A single parsed script operation.
///
/// `overflowed` is set when a push opcode declared a length that ran past
/// the remaining script bytes. Such an operation always fails execution; it
/// is the last operation produced by [`Script::operations`] since nothing
/// after it can be reliably delimited.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Operation {
    /// The opcode byte.
    pub opcode: u8,
    /// Push data, if this opcode pushes data (including empty pushes).
    pub data: Option<Vec<u8>>,
    /// Whether a declared push length ran past the end of the script.
    pub overflowed: bool,
}

/// A script: an ordered byte stream. Serialized form is the raw bytes as
/// received; [`Script::operations`] produces the parsed view on demand.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Script(pub Vec<u8>);

const OP_PUSHDATA1: u8 = 0x4c;
const OP_PUSHDATA2: u8 = 0x4d;
const OP_PUSHDATA4: u8 = 0x4e;

impl Script {
    /// Wrap raw script bytes.
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// An empty script.
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    /// The raw script bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Parse the script into its operation list. Parsing stops at the first
    /// overflowed push; the overflowed operation is the last one returned.
    pub fn operations(&self) -> Vec<Operation> {
        let bytes = &self.0;
        let mut ops = Vec::new();
        let mut i = 0usize;
        while i < bytes.len() {
            let opcode = bytes[i];
            i += 1;
            let (data, overflowed) = match opcode {
                0x00..=0x4b => take_push(bytes, &mut i, opcode as usize),
                OP_PUSHDATA1 => take_length_prefixed_push(bytes, &mut i, 1),
                OP_PUSHDATA2 => take_length_prefixed_push(bytes, &mut i, 2),
                OP_PUSHDATA4 => take_length_prefixed_push(bytes, &mut i, 4),
                _ => (None, false),
            };
            let done = overflowed;
            ops.push(Operation {
                opcode,
                data,
                overflowed,
            });
            if done {
                break;
            }
        }
        ops
    }
}

fn take_push(bytes: &[u8], i: &mut usize, n: usize) -> (Option<Vec<u8>>, bool) {
    if *i + n > bytes.len() {
        *i = bytes.len();
        return (None, true);
    }
    let data = bytes[*i..*i + n].to_vec();
    *i += n;
    (Some(data), false)
}

fn take_length_prefixed_push(
    bytes: &[u8],
    i: &mut usize,
    len_width: usize,
) -> (Option<Vec<u8>>, bool) {
    if *i + len_width > bytes.len() {
        *i = bytes.len();
        return (None, true);
    }
    let len = match len_width {
        1 => bytes[*i] as usize,
        2 => u16::from_le_bytes([bytes[*i], bytes[*i + 1]]) as usize,
        4 => u32::from_le_bytes([bytes[*i], bytes[*i + 1], bytes[*i + 2], bytes[*i + 3]]) as usize,
        _ => unreachable!(),
    };
    *i += len_width;
    take_push(bytes, i, len)
}

impl From<Vec<u8>> for Script {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl Codec for Script {
    fn decode(reader: &mut ByteReader<'_>) -> Option<Self> {
        let bytes = reader.read_var_bytes();
        if reader.failed() {
            None
        } else {
            Some(Self(bytes))
        }
    }

    fn encode(&self, writer: &mut ByteWriter) {
        writer.write_var_bytes(&self.0);
    }

    fn encoded_len(&self) -> usize {
        satoshi_core::ser::varint_len(self.0.len() as u64) + self.0.len()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parses_direct_pushes() {
        let script = Script::new(vec![0x01, 0xAB, 0x02, 0xCD, 0xEF]);
        let ops = script.operations();
        assert_eq!(ops.len(), 2);
        assert_eq!(ops[0].data, Some(vec![0xAB]));
        assert_eq!(ops[1].data, Some(vec![0xCD, 0xEF]));
        assert!(!ops[0].overflowed && !ops[1].overflowed);
    }

    #[test]
    fn op_0_pushes_empty_data() {
        let script = Script::new(vec![0x00]);
        let ops = script.operations();
        assert_eq!(ops[0].data, Some(vec![]));
    }

    #[test]
    fn truncated_push_overflows() {
        let script = Script::new(vec![0x05, 0x01, 0x02]);
        let ops = script.operations();
        assert_eq!(ops.len(), 1);
        assert!(ops[0].overflowed);
        assert!(ops[0].data.is_none());
    }

    #[test]
    fn pushdata1_reads_declared_length() {
        let mut bytes = vec![OP_PUSHDATA1, 3];
        bytes.extend_from_slice(&[1, 2, 3]);
        let ops = Script::new(bytes).operations();
        assert_eq!(ops[0].data, Some(vec![1, 2, 3]));
    }

    #[test]
    fn non_push_opcode_carries_no_data() {
        let script = Script::new(vec![0x76]); // OP_DUP
        let ops = script.operations();
        assert_eq!(ops[0].data, None);
        assert!(!ops[0].overflowed);
    }
}
