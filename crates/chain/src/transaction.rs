//! Transactions: the legacy and segwit serialization forms, txid/wtxid, and
//! the check/accept validation surface.

use crate::error::{AcceptTxError, CheckTxError};
use crate::input::Input;
use crate::output::Output;
use crate::script::Script;
use satoshi_core::{hashes::hash256, ByteReader, ByteWriter, Codec, Hash32};

const SEGWIT_MARKER: u8 = 0x00;
const SEGWIT_FLAG: u8 = 0x01;
const MAX_MONEY: u64 = 21_000_000 * 100_000_000;
const MAX_TRANSACTION_SIZE: usize = 1_000_000;
const MAX_TX_LEGACY_SIGOPS: usize = 2_000;

/// A Bitcoin transaction.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Transaction {
    /// Transaction version.
    pub version: u32,
    /// Spent outpoints and their unlocking data.
    pub inputs: Vec<Input>,
    /// Created outputs.
    pub outputs: Vec<Output>,
    /// Locktime (height or Unix time, per BIP113 threshold).
    pub locktime: u32,
}

impl Transaction {
    /// True iff the witness of any input is non-empty; determines which of
    /// the two wire serializations is used.
    pub fn is_segwit(&self) -> bool {
        self.inputs.iter().any(|i| !i.witness.is_empty())
    }

    /// A transaction is coinbase iff it has exactly one input whose
    /// previous output is the null outpoint.
    pub fn is_coinbase(&self) -> bool {
        self.inputs.len() == 1 && self.inputs[0].previous_output.is_null()
    }

    /// BIP113 finality: a transaction is final once its locktime has passed
    /// (by height or median-time-past, per the `LOCKTIME_THRESHOLD`
    /// boundary), or immediately if every input disables relative locking.
    pub fn is_final(&self, height: u32, median_time_past: u32) -> bool {
        const LOCKTIME_THRESHOLD: u32 = 500_000_000;
        if self.locktime == 0 {
            return true;
        }
        if self.inputs.iter().all(|i| i.sequence == 0xffff_ffff) {
            return true;
        }
        if self.locktime < LOCKTIME_THRESHOLD {
            (height as u64) >= self.locktime as u64
        } else {
            (median_time_past as u64) >= self.locktime as u64
        }
    }

    /// Legacy (pre-segwit) serialization: inputs without witness, no
    /// marker/flag. This is also the preimage for the `txid`.
    fn encode_legacy(&self, writer: &mut ByteWriter) {
        writer.write_u32_le(self.version);
        writer.write_varint(self.inputs.len() as u64);
        for input in &self.inputs {
            input.encode(writer);
        }
        writer.write_varint(self.outputs.len() as u64);
        for output in &self.outputs {
            output.encode(writer);
        }
        writer.write_u32_le(self.locktime);
    }

    fn legacy_len(&self) -> usize {
        4 + satoshi_core::ser::varint_len(self.inputs.len() as u64)
            + self.inputs.iter().map(Input::encoded_len).sum::<usize>()
            + satoshi_core::ser::varint_len(self.outputs.len() as u64)
            + self.outputs.iter().map(Output::encoded_len).sum::<usize>()
            + 4
    }

    /// Double-SHA-256 of the legacy serialization.
    pub fn txid(&self) -> Hash32 {
        let mut w = ByteWriter::new();
        self.encode_legacy(&mut w);
        hash256(&w.into_bytes())
    }

    /// Double-SHA-256 of the segwit serialization (equals `txid` when the
    /// transaction carries no witnesses).
    pub fn wtxid(&self) -> Hash32 {
        hash256(&self.to_bytes())
    }

    /// Count of legacy (non-witness-discounted) sigops contributed directly
    /// by this transaction's own input and output scripts — the "base" count
    /// named in the data model. Embedded P2SH/witness sigops require the
    /// spent output's script and are counted separately per input by
    /// [`Input::embedded_signature_operations`](crate::input::Input).
    pub fn base_signature_operations(&self) -> usize {
        let mut n = 0;
        for input in &self.inputs {
            n += count_legacy_sigops(&input.script, false);
        }
        for output in &self.outputs {
            n += count_legacy_sigops(&output.script, false);
        }
        n
    }

    /// Stateless checks: structure and limits that do not require chain
    /// context. `allow_coinbase` should be `false` when validating a
    /// standalone (e.g. mempool-relayed) transaction.
    pub fn check(&self, allow_coinbase: bool) -> Result<(), CheckTxError> {
        if self.inputs.is_empty() || self.outputs.is_empty() {
            return Err(CheckTxError::EmptyTransaction);
        }
        if !allow_coinbase && self.is_coinbase() {
            return Err(CheckTxError::CoinbaseTransaction);
        }
        if self.is_coinbase() {
            let script_len = self.inputs[0].script.as_bytes().len();
            if !(2..=100).contains(&script_len) {
                return Err(CheckTxError::InvalidCoinbaseScriptSize);
            }
        } else {
            for input in &self.inputs {
                if input.previous_output.is_null() {
                    return Err(CheckTxError::PreviousOutputNull);
                }
            }
        }

        let mut seen = std::collections::HashSet::new();
        for input in &self.inputs {
            if !seen.insert(input.previous_output) {
                return Err(CheckTxError::TransactionInternalDoubleSpend);
            }
        }

        let mut total: u64 = 0;
        for output in &self.outputs {
            total = total
                .checked_add(output.value)
                .ok_or(CheckTxError::SpendOverflow)?;
            if total > MAX_MONEY {
                return Err(CheckTxError::SpendOverflow);
            }
        }

        if self.legacy_len() > MAX_TRANSACTION_SIZE {
            return Err(CheckTxError::TransactionSizeLimit);
        }

        if self.base_signature_operations() > MAX_TX_LEGACY_SIGOPS {
            return Err(CheckTxError::TransactionLegacySigopLimit);
        }

        Ok(())
    }

    /// Contextual checks requiring the spent outputs and chain position.
    pub fn accept(&self, context: &TxAcceptContext<'_>) -> Result<(), AcceptTxError> {
        if !self.is_final(context.height, context.median_time_past) {
            return Err(AcceptTxError::TransactionNonFinal);
        }

        if self.is_coinbase() {
            return Ok(());
        }

        if context.spent_outputs.len() != self.inputs.len() {
            return Err(AcceptTxError::MissingPreviousOutput);
        }

        let mut total_in: u64 = 0;
        for (input, spent) in self.inputs.iter().zip(context.spent_outputs.iter()) {
            let spent = spent.as_ref().ok_or(AcceptTxError::MissingPreviousOutput)?;
            if spent.already_spent {
                return Err(AcceptTxError::DoubleSpend);
            }
            if spent.is_coinbase && spent.confirmations < context.coinbase_maturity {
                return Err(AcceptTxError::CoinbaseMaturity);
            }
            if self.version >= 2 && input.sequence & 0x8000_0000 == 0 {
                let locked_blocks = input.sequence & 0x0000_ffff;
                if (input.sequence & 0x0040_0000) == 0 && spent.confirmations < locked_blocks {
                    return Err(AcceptTxError::SequenceLocked);
                }
            }
            total_in = total_in
                .checked_add(spent.output.value)
                .ok_or(AcceptTxError::SpendExceedsValue)?;
        }

        let total_out: u64 = self.outputs.iter().map(|o| o.value).sum();
        if total_out > total_in {
            return Err(AcceptTxError::SpendExceedsValue);
        }

        let mut sigops = self.base_signature_operations();
        for (input, spent) in self.inputs.iter().zip(context.spent_outputs.iter()) {
            let spent = spent.as_ref().unwrap();
            sigops += crate::input::embedded_signature_operations(input, &spent.output.script);
        }
        if sigops > context.max_embedded_sigops {
            return Err(AcceptTxError::TransactionEmbeddedSigopLimit);
        }

        Ok(())
    }
}

/// Count legacy sigops in `script`. `accurate_multisig` enables the
/// preceding-small-int-push refinement for `OP_CHECKMULTISIG[VERIFY]`, used
/// when counting a P2SH redeem script rather than a raw scriptSig/scriptPubKey.
pub(crate) fn count_legacy_sigops(script: &Script, accurate_multisig: bool) -> usize {
    const OP_CHECKSIG: u8 = 0xac;
    const OP_CHECKSIGVERIFY: u8 = 0xad;
    const OP_CHECKMULTISIG: u8 = 0xae;
    const OP_CHECKMULTISIGVERIFY: u8 = 0xaf;
    const OP_1: u8 = 0x51;
    const OP_16: u8 = 0x60;

    let mut n = 0;
    let mut last_opcode: Option<u8> = None;
    for op in script.operations() {
        match op.opcode {
            OP_CHECKSIG | OP_CHECKSIGVERIFY => n += 1,
            OP_CHECKMULTISIG | OP_CHECKMULTISIGVERIFY => {
                if accurate_multisig {
                    match last_opcode {
                        Some(prev) if (OP_1..=OP_16).contains(&prev) => {
                            n += (prev - OP_1 + 1) as usize
                        }
                        _ => n += 20,
                    }
                } else {
                    n += 20;
                }
            }
            _ => {}
        }
        last_opcode = Some(op.opcode);
    }
    n
}

/// A previously confirmed output being spent, plus the bookkeeping
/// [`Transaction::accept`] needs to check maturity, relative locktime, and
/// double-spend.
#[derive(Clone, Debug)]
pub struct SpentOutput {
    /// The output itself.
    pub output: Output,
    /// Number of confirmations the creating transaction has, at the
    /// candidate height.
    pub confirmations: u32,
    /// Whether the creating transaction was a coinbase.
    pub is_coinbase: bool,
    /// Whether this output has already been spent elsewhere.
    pub already_spent: bool,
}

/// Context threaded into [`Transaction::accept`].
pub struct TxAcceptContext<'a> {
    /// Candidate height the transaction would be confirmed at.
    pub height: u32,
    /// Median time past at that height.
    pub median_time_past: u32,
    /// Spent outputs, aligned index-for-index with `inputs`.
    pub spent_outputs: &'a [Option<SpentOutput>],
    /// Number of confirmations a coinbase output must have before it may be spent.
    pub coinbase_maturity: u32,
    /// Maximum sigops (base plus P2SH-embedded) this transaction may contribute.
    pub max_embedded_sigops: usize,
}

impl Codec for Transaction {
    fn decode(reader: &mut ByteReader<'_>) -> Option<Self> {
        let version = reader.read_u32_le();

        // The first byte after `version` is ambiguous: a legacy transaction
        // starts it with the input-count varint, a segwit one with a 0x00
        // marker. Per BIP144, a leading zero can only be the marker (the
        // legacy input count is never validly encoded as a zero-valued
        // single byte preceding a real count), so branch on it.
        let first_byte = reader.read_u8();
        let segwit = first_byte == SEGWIT_MARKER;
        let input_count = if segwit {
            if reader.read_u8() != SEGWIT_FLAG {
                return None;
            }
            reader.read_varint()
        } else {
            decode_varint_from_first_byte(first_byte, reader)
        };

        let mut inputs = Vec::with_capacity(input_count.min(100_000) as usize);
        for _ in 0..input_count {
            inputs.push(Input::decode(reader)?);
        }

        let output_count = reader.read_varint();
        let mut outputs = Vec::with_capacity(output_count.min(100_000) as usize);
        for _ in 0..output_count {
            outputs.push(Output::decode(reader)?);
        }

        if segwit {
            for input in inputs.iter_mut() {
                input.witness = crate::witness::Witness::decode(reader)?;
            }
        }

        let locktime = reader.read_u32_le();

        if reader.failed() {
            None
        } else {
            Some(Self {
                version,
                inputs,
                outputs,
                locktime,
            })
        }
    }

    fn encode(&self, writer: &mut ByteWriter) {
        writer.write_u32_le(self.version);
        let segwit = self.is_segwit();
        if segwit {
            writer.write_u8(SEGWIT_MARKER);
            writer.write_u8(SEGWIT_FLAG);
        }
        writer.write_varint(self.inputs.len() as u64);
        for input in &self.inputs {
            input.encode(writer);
        }
        writer.write_varint(self.outputs.len() as u64);
        for output in &self.outputs {
            output.encode(writer);
        }
        if segwit {
            for input in &self.inputs {
                input.witness.encode(writer);
            }
        }
        writer.write_u32_le(self.locktime);
    }

    fn encoded_len(&self) -> usize {
        let mut w = ByteWriter::new();
        self.encode(&mut w);
        w.into_bytes().len()
    }
}

/// The varint read helper only ever reads a fresh prefix byte; since a
/// transaction's marker/flag probe already consumed what might have been
/// that prefix byte, reinterpret it here instead of reading another one.
fn decode_varint_from_first_byte(prefix: u8, reader: &mut ByteReader<'_>) -> u64 {
    match prefix {
        0xfd => reader.read_u16_le() as u64,
        0xfe => reader.read_u32_le() as u64,
        0xff => reader.read_u64_le(),
        n => n as u64,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::point::Point;

    fn coinbase(sequence: u32) -> Input {
        Input::new(Point::null(), Script::new(vec![0x51, 0x51]), sequence)
    }

    #[test]
    fn legacy_txid_equals_wtxid_without_witness() {
        let tx = Transaction {
            version: 1,
            inputs: vec![coinbase(0xffff_ffff)],
            outputs: vec![Output::new(50_0000_0000, Script::new(vec![0x51]))],
            locktime: 0,
        };
        assert_eq!(tx.txid(), tx.wtxid());
        assert!(tx.is_coinbase());
    }

    #[test]
    fn segwit_roundtrip_preserves_witness() {
        let mut tx = Transaction {
            version: 2,
            inputs: vec![Input::new(
                Point::new(Hash32([7u8; 32]), 0),
                Script::empty(),
                0xffff_fffe,
            )],
            outputs: vec![Output::new(1000, Script::new(vec![0x00, 0x14]))],
            locktime: 0,
        };
        tx.inputs[0].witness = crate::witness::Witness::from(vec![vec![1, 2, 3]]);

        let bytes = tx.to_bytes();
        let back = Transaction::from_bytes(&bytes).unwrap();
        assert_eq!(back, tx);
        assert_ne!(back.txid(), back.wtxid());
    }

    #[test]
    fn empty_transaction_is_rejected() {
        let tx = Transaction::default();
        assert_eq!(tx.check(true), Err(CheckTxError::EmptyTransaction));
    }

    #[test]
    fn coinbase_outside_block_context_is_rejected() {
        let tx = Transaction {
            version: 1,
            inputs: vec![coinbase(0xffff_ffff)],
            outputs: vec![Output::new(1, Script::empty())],
            locktime: 0,
        };
        assert_eq!(tx.check(false), Err(CheckTxError::CoinbaseTransaction));
        assert!(tx.check(true).is_ok());
    }

    #[test]
    fn internal_double_spend_is_rejected() {
        let prevout = Point::new(Hash32([1u8; 32]), 0);
        let tx = Transaction {
            version: 1,
            inputs: vec![
                Input::new(prevout, Script::empty(), 0),
                Input::new(prevout, Script::empty(), 0),
            ],
            outputs: vec![Output::new(1, Script::empty())],
            locktime: 0,
        };
        assert_eq!(
            tx.check(true),
            Err(CheckTxError::TransactionInternalDoubleSpend)
        );
    }

    #[test]
    fn is_final_respects_locktime_and_sequence() {
        let mut tx = Transaction {
            version: 2,
            inputs: vec![Input::new(
                Point::new(Hash32([1u8; 32]), 0),
                Script::empty(),
                0xffff_fffe,
            )],
            outputs: vec![Output::new(1, Script::empty())],
            locktime: 500,
        };
        assert!(!tx.is_final(100, 0));
        assert!(tx.is_final(500, 0));
        tx.inputs[0].sequence = 0xffff_ffff;
        assert!(tx.is_final(0, 0));
    }
}
