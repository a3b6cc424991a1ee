//! Signature hash computation for all four algorithms a script program can
//! call for: legacy (pre-BIP141), BIP143 (segwit v0), and the two BIP341/342
//! taproot variants (key path and tapscript).
//!
//! [`SighashCache`] memoizes the transaction-wide hashes each algorithm
//! folds into its per-input message, the way `rust-bitcoin`'s own
//! `SighashCache` does, so signing or verifying every input of an
//! N-input transaction costs O(N) hashing rather than O(N^2).

use satoshi_chain::{Input, Output, Script, Transaction};
use satoshi_core::hashes::{hash256, sha256, tagged_hash};
use satoshi_core::{ByteWriter, Codec, Hash32};
use std::cell::OnceCell;

/// `SIGHASH_ALL`: commit to every input and every output.
pub const SIGHASH_ALL: u32 = 0x01;
/// `SIGHASH_NONE`: commit to no outputs at all.
pub const SIGHASH_NONE: u32 = 0x02;
/// `SIGHASH_SINGLE`: commit only to the output at the same index as this input.
pub const SIGHASH_SINGLE: u32 = 0x03;
/// Modifier: commit only to this one input, not the whole input set.
pub const SIGHASH_ANYONECANPAY: u32 = 0x80;
/// Taproot-only: behaves like `SIGHASH_ALL` but is encoded as a zero byte.
pub const SIGHASH_DEFAULT: u8 = 0x00;

fn base_type(hash_type: u32) -> u32 {
    hash_type & 0x1f
}

fn is_anyone_can_pay(hash_type: u32) -> bool {
    hash_type & SIGHASH_ANYONECANPAY != 0
}

/// `HASH256` of a single `0x01` byte followed by 31 zero bytes: the sentinel
/// legacy sighash returns when asked to sign against an out-of-range input.
fn invalid_index_sentinel() -> Hash32 {
    let mut bytes = [0u8; 32];
    bytes[0] = 1;
    Hash32(bytes)
}

/// Per-transaction memoized hashes feeding the BIP143 and BIP341 sighash
/// algorithms. Built once per transaction and reused across all of its
/// inputs.
pub struct SighashCache<'a> {
    tx: &'a Transaction,
    prevouts: &'a [Output],
    segwit_prevouts: OnceCell<Hash32>,
    segwit_sequences: OnceCell<Hash32>,
    segwit_outputs: OnceCell<Hash32>,
    taproot_prevouts: OnceCell<[u8; 32]>,
    taproot_amounts: OnceCell<[u8; 32]>,
    taproot_scripts: OnceCell<[u8; 32]>,
    taproot_sequences: OnceCell<[u8; 32]>,
    taproot_outputs: OnceCell<[u8; 32]>,
}

impl<'a> SighashCache<'a> {
    /// `prevouts[i]` must be the output spent by `tx.inputs[i]`.
    pub fn new(tx: &'a Transaction, prevouts: &'a [Output]) -> Self {
        Self {
            tx,
            prevouts,
            segwit_prevouts: OnceCell::new(),
            segwit_sequences: OnceCell::new(),
            segwit_outputs: OnceCell::new(),
            taproot_prevouts: OnceCell::new(),
            taproot_amounts: OnceCell::new(),
            taproot_scripts: OnceCell::new(),
            taproot_sequences: OnceCell::new(),
            taproot_outputs: OnceCell::new(),
        }
    }

    fn segwit_hash_prevouts(&self) -> Hash32 {
        *self.segwit_prevouts.get_or_init(|| {
            let mut w = ByteWriter::new();
            for input in &self.tx.inputs {
                input.previous_output.encode(&mut w);
            }
            hash256(w.as_slice())
        })
    }

    fn segwit_hash_sequences(&self) -> Hash32 {
        *self.segwit_sequences.get_or_init(|| {
            let mut w = ByteWriter::new();
            for input in &self.tx.inputs {
                w.write_u32_le(input.sequence);
            }
            hash256(w.as_slice())
        })
    }

    fn segwit_hash_outputs(&self) -> Hash32 {
        *self.segwit_outputs.get_or_init(|| {
            let mut w = ByteWriter::new();
            for output in &self.tx.outputs {
                output.encode(&mut w);
            }
            hash256(w.as_slice())
        })
    }

    fn taproot_sha_prevouts(&self) -> [u8; 32] {
        *self.taproot_prevouts.get_or_init(|| {
            let mut w = ByteWriter::new();
            for input in &self.tx.inputs {
                input.previous_output.encode(&mut w);
            }
            sha256(w.as_slice())
        })
    }

    fn taproot_sha_amounts(&self) -> [u8; 32] {
        *self.taproot_amounts.get_or_init(|| {
            let mut w = ByteWriter::new();
            for out in self.prevouts {
                w.write_u64_le(out.value);
            }
            sha256(w.as_slice())
        })
    }

    fn taproot_sha_scripts(&self) -> [u8; 32] {
        *self.taproot_scripts.get_or_init(|| {
            let mut w = ByteWriter::new();
            for out in self.prevouts {
                out.script.encode(&mut w);
            }
            sha256(w.as_slice())
        })
    }

    fn taproot_sha_sequences(&self) -> [u8; 32] {
        *self.taproot_sequences.get_or_init(|| {
            let mut w = ByteWriter::new();
            for input in &self.tx.inputs {
                w.write_u32_le(input.sequence);
            }
            sha256(w.as_slice())
        })
    }

    fn taproot_sha_outputs(&self) -> [u8; 32] {
        *self.taproot_outputs.get_or_init(|| {
            let mut w = ByteWriter::new();
            for out in &self.tx.outputs {
                out.encode(&mut w);
            }
            sha256(w.as_slice())
        })
    }

    /// Pre-SegWit sighash: a modified transaction serialization per the
    /// base type and `ANYONECANPAY` flag, double-SHA-256'd.
    pub fn legacy(&self, input_index: usize, script_code: &Script, hash_type: u32) -> Hash32 {
        if input_index >= self.tx.inputs.len() {
            return invalid_index_sentinel();
        }
        let anyone_can_pay = is_anyone_can_pay(hash_type);
        let base = base_type(hash_type);
        if base == SIGHASH_SINGLE && input_index >= self.tx.outputs.len() {
            return invalid_index_sentinel();
        }

        let mut w = ByteWriter::new();
        w.write_u32_le(self.tx.version);

        let indices: Vec<usize> = if anyone_can_pay {
            vec![input_index]
        } else {
            (0..self.tx.inputs.len()).collect()
        };
        w.write_varint(indices.len() as u64);
        for &i in &indices {
            let input: &Input = &self.tx.inputs[i];
            input.previous_output.encode(&mut w);
            if i == input_index {
                script_code.encode(&mut w);
            } else {
                Script::empty().encode(&mut w);
            }
            let sequence = if i != input_index && !anyone_can_pay && (base == SIGHASH_NONE || base == SIGHASH_SINGLE) {
                0
            } else {
                input.sequence
            };
            w.write_u32_le(sequence);
        }

        match base {
            SIGHASH_NONE => w.write_varint(0),
            SIGHASH_SINGLE => {
                w.write_varint(input_index as u64 + 1);
                for out in &self.tx.outputs[..input_index] {
                    let _ = out;
                    w.write_u64_le(u64::MAX);
                    Script::empty().encode(&mut w);
                }
                self.tx.outputs[input_index].encode(&mut w);
            }
            _ => {
                w.write_varint(self.tx.outputs.len() as u64);
                for out in &self.tx.outputs {
                    out.encode(&mut w);
                }
            }
        }

        w.write_u32_le(self.tx.locktime);
        w.write_u32_le(hash_type);
        hash256(w.as_slice())
    }

    /// BIP143 segwit v0 sighash.
    pub fn segwit_v0(
        &self,
        input_index: usize,
        script_code: &Script,
        value: u64,
        hash_type: u32,
    ) -> Hash32 {
        let anyone_can_pay = is_anyone_can_pay(hash_type);
        let base = base_type(hash_type);
        let input = &self.tx.inputs[input_index];

        let hash_prevouts = if anyone_can_pay {
            Hash32::zero()
        } else {
            self.segwit_hash_prevouts()
        };
        let hash_sequence = if anyone_can_pay || base == SIGHASH_SINGLE || base == SIGHASH_NONE {
            Hash32::zero()
        } else {
            self.segwit_hash_sequences()
        };
        let hash_outputs = if base == SIGHASH_ALL {
            self.segwit_hash_outputs()
        } else if base == SIGHASH_SINGLE && input_index < self.tx.outputs.len() {
            let mut w = ByteWriter::new();
            self.tx.outputs[input_index].encode(&mut w);
            hash256(w.as_slice())
        } else {
            Hash32::zero()
        };

        let mut w = ByteWriter::new();
        w.write_u32_le(self.tx.version);
        w.write_bytes(&hash_prevouts.0);
        w.write_bytes(&hash_sequence.0);
        input.previous_output.encode(&mut w);
        script_code.encode(&mut w);
        w.write_u64_le(value);
        w.write_u32_le(input.sequence);
        w.write_bytes(&hash_outputs.0);
        w.write_u32_le(self.tx.locktime);
        w.write_u32_le(hash_type);
        hash256(w.as_slice())
    }

    /// BIP341 taproot key-path sighash. `extension` is `Some` for tapscript
    /// spends (BIP342), carrying the tapleaf hash and code-separator
    /// position; `None` for a direct key-path spend.
    pub fn taproot(
        &self,
        input_index: usize,
        hash_type: u8,
        annex: Option<&[u8]>,
        extension: Option<TapscriptExtension>,
    ) -> Hash32 {
        let hash_type_u32 = hash_type as u32;
        let anyone_can_pay = hash_type & 0x80 != 0;
        let base = hash_type & 0x7f;

        let mut msg = Vec::new();
        msg.push(0u8); // epoch
        msg.push(hash_type);
        msg.extend_from_slice(&self.tx.version.to_le_bytes());
        msg.extend_from_slice(&self.tx.locktime.to_le_bytes());

        if !anyone_can_pay {
            msg.extend_from_slice(&self.taproot_sha_prevouts());
            msg.extend_from_slice(&self.taproot_sha_amounts());
            msg.extend_from_slice(&self.taproot_sha_scripts());
            msg.extend_from_slice(&self.taproot_sha_sequences());
        }
        if base == SIGHASH_ALL as u8 || base == SIGHASH_DEFAULT {
            msg.extend_from_slice(&self.taproot_sha_outputs());
        }

        let ext_flag: u8 = if extension.is_some() { 1 } else { 0 };
        let annex_present = annex.is_some();
        let spend_type = (ext_flag << 1) | (annex_present as u8);
        msg.push(spend_type);

        if anyone_can_pay {
            let input = &self.tx.inputs[input_index];
            let prevout = &self.prevouts[input_index];
            let mut w = ByteWriter::new();
            input.previous_output.encode(&mut w);
            msg.extend_from_slice(w.as_slice());
            msg.extend_from_slice(&prevout.value.to_le_bytes());
            let mut sw = ByteWriter::new();
            prevout.script.encode(&mut sw);
            msg.extend_from_slice(sw.as_slice());
            msg.extend_from_slice(&input.sequence.to_le_bytes());
        } else {
            msg.extend_from_slice(&(input_index as u32).to_le_bytes());
        }

        if let Some(annex) = annex {
            let mut w = ByteWriter::new();
            w.write_var_bytes(annex);
            msg.extend_from_slice(&sha256(w.as_slice()));
        }

        if base == SIGHASH_SINGLE as u8 {
            let out = &self.tx.outputs[input_index];
            let mut w = ByteWriter::new();
            out.encode(&mut w);
            msg.extend_from_slice(&sha256(w.as_slice()));
        }

        if let Some(ext) = extension {
            msg.extend_from_slice(&ext.tapleaf_hash.0);
            msg.push(ext.key_version);
            msg.extend_from_slice(&ext.codeseparator_position.to_le_bytes());
        }

        let _ = hash_type_u32;
        Hash32(tagged_hash("TapSighash", &msg))
    }
}

/// The extra message fields BIP342 folds into a tapscript spend's sighash
/// beyond the BIP341 key-path base.
#[derive(Clone, Copy)]
pub struct TapscriptExtension {
    /// `tapleaf_hash` of the script being executed.
    pub tapleaf_hash: Hash32,
    /// Always `0` for the current tapscript version.
    pub key_version: u8,
    /// Position of the last executed `OP_CODESEPARATOR`, or `0xffffffff`.
    pub codeseparator_position: u32,
}

#[cfg(test)]
mod test {
    use super::*;
    use satoshi_chain::{Input, Point};

    fn sample_tx() -> (Transaction, Vec<Output>) {
        let prevout = Output::new(100_000, Script::new(vec![0x51]));
        let tx = Transaction {
            version: 2,
            inputs: vec![Input::new(Point::new(Hash32::zero(), 0), Script::empty(), 0xffff_ffff)],
            outputs: vec![Output::new(90_000, Script::new(vec![0x51]))],
            locktime: 0,
        };
        (tx, vec![prevout])
    }

    #[test]
    fn legacy_sighash_is_deterministic() {
        let (tx, _) = sample_tx();
        let cache = SighashCache::new(&tx, &[]);
        let a = cache.legacy(0, &Script::new(vec![0x51]), SIGHASH_ALL);
        let b = cache.legacy(0, &Script::new(vec![0x51]), SIGHASH_ALL);
        assert_eq!(a, b);
    }

    #[test]
    fn legacy_sighash_out_of_range_input_is_sentinel() {
        let (tx, _) = sample_tx();
        let cache = SighashCache::new(&tx, &[]);
        assert_eq!(cache.legacy(5, &Script::empty(), SIGHASH_ALL), invalid_index_sentinel());
    }

    #[test]
    fn different_hash_types_diverge() {
        let (tx, _) = sample_tx();
        let cache = SighashCache::new(&tx, &[]);
        let all = cache.legacy(0, &Script::new(vec![0x51]), SIGHASH_ALL);
        let none = cache.legacy(0, &Script::new(vec![0x51]), SIGHASH_NONE);
        assert_ne!(all, none);
    }

    #[test]
    fn taproot_key_path_sighash_is_deterministic() {
        let (tx, prevouts) = sample_tx();
        let cache = SighashCache::new(&tx, &prevouts);
        let a = cache.taproot(0, SIGHASH_DEFAULT, None, None);
        let b = cache.taproot(0, SIGHASH_DEFAULT, None, None);
        assert_eq!(a, b);
    }
}
