//! Witness and taproot program classification: recognizing the scriptPubKey
//! shapes BIP141/BIP341 give special execution rules, and peeling a
//! taproot control block apart.

use crate::error::ScriptError;
use satoshi_chain::{Script, Witness};
use satoshi_core::hashes::tagged_hash;
use satoshi_core::Hash32;

/// A parsed `scriptPubKey` witness program: version and the committed
/// program bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WitnessProgram {
    /// Witness version, `0..=16`.
    pub version: u8,
    /// The committed program (20 or 32 bytes for version 0; 32 bytes for
    /// version 1/taproot; otherwise whatever future versions define).
    pub program: Vec<u8>,
}

impl WitnessProgram {
    /// Recognize `OP_n <2..=40 byte push>` as a witness program. `n` must be
    /// `OP_0` or `OP_1..OP_16`; a non-push or differently-shaped script is
    /// not a witness program at all (legacy execution applies instead).
    pub fn parse(script: &Script) -> Option<Self> {
        let bytes = script.as_bytes();
        if !(4..=42).contains(&bytes.len()) {
            return None;
        }
        let version = match bytes[0] {
            0x00 => 0,
            op @ 0x51..=0x60 => op - 0x50,
            _ => return None,
        };
        let push_len = bytes[1] as usize;
        if bytes.len() != 2 + push_len || !(2..=40).contains(&push_len) {
            return None;
        }
        Some(Self {
            version,
            program: bytes[2..].to_vec(),
        })
    }
}

/// Taproot control block, parsed per BIP341.
#[derive(Debug, Clone)]
pub struct ControlBlock {
    /// Low bit: script-path output key parity. High nibble: leaf version.
    pub leaf_version: u8,
    /// Whether the output key has odd Y parity.
    pub parity: bool,
    /// The internal public key (x-only, 32 bytes).
    pub internal_key: [u8; 32],
    /// Merkle path from the executed leaf up to the taproot output.
    pub merkle_path: Vec<[u8; 32]>,
}

impl ControlBlock {
    /// Parse a control block. Length must be `33 + 32*m` for `0 <= m <= 128`.
    pub fn parse(bytes: &[u8]) -> Result<Self, ScriptError> {
        if bytes.len() < 33 || (bytes.len() - 33) % 32 != 0 || bytes.len() > 33 + 128 * 32 {
            return Err(ScriptError::InvalidWitness);
        }
        let leaf_version = bytes[0] & 0xfe;
        let parity = bytes[0] & 0x01 != 0;
        let mut internal_key = [0u8; 32];
        internal_key.copy_from_slice(&bytes[1..33]);
        let merkle_path = bytes[33..]
            .chunks_exact(32)
            .map(|chunk| {
                let mut node = [0u8; 32];
                node.copy_from_slice(chunk);
                node
            })
            .collect();
        Ok(Self {
            leaf_version,
            parity,
            internal_key,
            merkle_path,
        })
    }
}

/// `tapleaf_hash = TaggedHash("TapLeaf", leaf_version || compact_size(script) || script)`.
pub fn tapleaf_hash(leaf_version: u8, script: &Script) -> Hash32 {
    let mut buf = vec![leaf_version];
    let bytes = script.as_bytes();
    let mut w = satoshi_core::ByteWriter::new();
    w.write_var_bytes(bytes);
    buf.extend_from_slice(w.as_slice());
    Hash32(tagged_hash("TapLeaf", &buf))
}

/// `TapBranch` parent of two (order-normalized) child hashes.
pub fn tapbranch_hash(a: &Hash32, b: &Hash32) -> Hash32 {
    let (lo, hi) = if a.0 <= b.0 { (a, b) } else { (b, a) };
    let mut buf = Vec::with_capacity(64);
    buf.extend_from_slice(&lo.0);
    buf.extend_from_slice(&hi.0);
    Hash32(tagged_hash("TapBranch", &buf))
}

/// Fold a control block's merkle path from the executed leaf up to the
/// taproot merkle root committed by the internal key.
pub fn merkle_root_from_path(leaf: Hash32, path: &[[u8; 32]]) -> Hash32 {
    path.iter()
        .fold(leaf, |acc, node| tapbranch_hash(&acc, &Hash32(*node)))
}

/// `t = TaggedHash("TapTweak", internal_key || merkle_root)`, used both to
/// verify the output key and to offset a key-path signature's public key.
pub fn tap_tweak(internal_key: &[u8; 32], merkle_root: Option<Hash32>) -> [u8; 32] {
    let mut buf = internal_key.to_vec();
    if let Some(root) = merkle_root {
        buf.extend_from_slice(&root.0);
    }
    tagged_hash("TapTweak", &buf)
}

/// Strip a BIP341 annex (a final witness item starting with `0x50`) from
/// the witness stack if present, returning the remaining items and the
/// annex bytes separately. An annex requires at least two witness items: a
/// single-item witness whose one item happens to start with `0x50` is a
/// key-path spend carrying that item as its signature, not an annex-only
/// witness with nothing left to verify.
pub fn split_annex(witness: &Witness) -> (&[Vec<u8>], Option<&[u8]>) {
    match witness.items.split_last() {
        Some((last, rest)) if !rest.is_empty() && last.first() == Some(&0x50) => {
            (rest, Some(last.as_slice()))
        }
        _ => (&witness.items, None),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn recognizes_p2wpkh() {
        let mut bytes = vec![0x00, 20];
        bytes.extend_from_slice(&[0u8; 20]);
        let program = WitnessProgram::parse(&Script::new(bytes)).unwrap();
        assert_eq!(program.version, 0);
        assert_eq!(program.program.len(), 20);
    }

    #[test]
    fn recognizes_taproot_output() {
        let mut bytes = vec![0x51, 32];
        bytes.extend_from_slice(&[0xab; 32]);
        let program = WitnessProgram::parse(&Script::new(bytes)).unwrap();
        assert_eq!(program.version, 1);
    }

    #[test]
    fn rejects_non_push_shape() {
        assert!(WitnessProgram::parse(&Script::new(vec![0x51, 0xac])).is_none());
    }

    #[test]
    fn control_block_length_is_validated() {
        assert!(ControlBlock::parse(&[0u8; 32]).is_err());
        assert!(ControlBlock::parse(&[0u8; 33]).is_ok());
        assert!(ControlBlock::parse(&[0u8; 65]).is_ok());
    }

    #[test]
    fn annex_split_detects_marker() {
        let w = Witness::from(vec![vec![1, 2], vec![0x50, 9]]);
        let (rest, annex) = split_annex(&w);
        assert_eq!(rest.len(), 1);
        assert_eq!(annex, Some([0x50, 9].as_slice()));
    }

    #[test]
    fn single_item_witness_is_not_mistaken_for_an_annex() {
        let w = Witness::from(vec![vec![0x50, 1, 2, 3]]);
        let (rest, annex) = split_annex(&w);
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0], vec![0x50, 1, 2, 3]);
        assert_eq!(annex, None);
    }
}
