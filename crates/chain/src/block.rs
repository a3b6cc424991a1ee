//! Blocks: a header plus its transactions, merkle-rooted together.

use crate::error::{AcceptBlockError, CheckBlockError};
use crate::header::Header;
use crate::output::Output;
use crate::transaction::Transaction;
use satoshi_core::{
    hashes::{hash256, merkle_root},
    ByteReader, ByteWriter, Codec, Hash32,
};

const MAX_BLOCK_SIZE: usize = 1_000_000;
const MAX_BLOCK_WEIGHT: usize = 4_000_000;
const MAX_BLOCK_LEGACY_SIGOPS: usize = 20_000;
/// Block-wide cap on base plus P2SH/witness-embedded sigops.
const MAX_BLOCK_EMBEDDED_SIGOPS: usize = 80_000;
const WITNESS_COMMITMENT_HEADER: [u8; 4] = [0xaa, 0x21, 0xa9, 0xed];

/// A block: a header and the transactions it commits to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Block {
    /// The block header.
    pub header: Header,
    /// The block's transactions; `transactions[0]` must be coinbase.
    pub transactions: Vec<Transaction>,
}

/// Context [`Block::accept`] needs beyond the block's own bytes.
pub struct BlockAcceptContext<'a> {
    /// This block's height.
    pub height: u32,
    /// Median time past at this height, for transaction finality.
    pub median_time_past: u32,
    /// Sum of (inputs - outputs) across all non-coinbase transactions,
    /// computed by the caller against the UTXO set.
    pub total_fees: u64,
    /// Halving-schedule base subsidy in satoshis (50 BTC on mainnet).
    pub base_subsidy: u64,
    /// Height interval between subsidy halvings (210,000 on mainnet).
    pub halving_interval: u32,
    /// Previous outputs spent by each transaction's inputs, aligned
    /// index-for-index with `transactions` and, within each entry, with
    /// that transaction's own `inputs`. The coinbase's entry is never
    /// consulted and may be empty.
    pub prevouts: &'a [Vec<Option<Output>>],
}

impl Block {
    /// Merkle root of the block's transactions by txid.
    pub fn computed_merkle_root(&self) -> Hash32 {
        let txids: Vec<Hash32> = self.transactions.iter().map(Transaction::txid).collect();
        merkle_root(&txids)
    }

    /// Merkle root of the block's transactions by wtxid, with the
    /// coinbase's wtxid replaced by an all-zero hash per BIP141.
    pub fn witness_merkle_root(&self) -> Hash32 {
        let wtxids: Vec<Hash32> = self
            .transactions
            .iter()
            .enumerate()
            .map(|(i, tx)| if i == 0 { Hash32::zero() } else { tx.wtxid() })
            .collect();
        merkle_root(&wtxids)
    }

    /// The commitment hash a coinbase witness-commitment output must carry,
    /// given this block's transactions and the coinbase's witness reserved
    /// value. `None` if the coinbase has no witness data to derive one from.
    pub fn expected_witness_commitment(&self) -> Option<Hash32> {
        let reserved = self
            .transactions
            .first()?
            .inputs
            .first()?
            .witness
            .items
            .first()?;
        if reserved.len() != 32 {
            return None;
        }
        let mut buf = Vec::with_capacity(64);
        buf.extend_from_slice(&self.witness_merkle_root().0);
        buf.extend_from_slice(reserved);
        Some(hash256(&buf))
    }

    /// The witness commitment actually carried in the coinbase's outputs
    /// (the last matching `OP_RETURN 0x24 <0xaa21a9ed> <32 bytes>` output,
    /// per Bitcoin Core's tie-break rule), if any.
    pub fn carried_witness_commitment(&self) -> Option<Hash32> {
        let coinbase = self.transactions.first()?;
        coinbase.outputs.iter().rev().find_map(|output| {
            let b = output.script.as_bytes();
            if b.len() >= 38 && b[0] == 0x6a && b[1] == 0x24 && b[2..6] == WITNESS_COMMITMENT_HEADER {
                let mut hash = [0u8; 32];
                hash.copy_from_slice(&b[6..38]);
                Some(Hash32(hash))
            } else {
                None
            }
        })
    }

    /// BIP141 weight: `base_size * 3 + total_size`.
    pub fn weight(&self) -> usize {
        let total_size = self.encoded_len();
        let base_size: usize = 80
            + satoshi_core::ser::varint_len(self.transactions.len() as u64)
            + self
                .transactions
                .iter()
                .map(legacy_encoded_len)
                .sum::<usize>();
        base_size * 3 + total_size
    }

    /// Stateless checks: size, shape (exactly one leading coinbase, no
    /// duplicates or internal conflicts), and the merkle commitment.
    pub fn check(&self) -> Result<(), CheckBlockError> {
        if self.encoded_len() > MAX_BLOCK_SIZE {
            return Err(CheckBlockError::BlockSizeLimit);
        }
        if self.transactions.is_empty() {
            return Err(CheckBlockError::EmptyBlock);
        }
        if !self.transactions[0].is_coinbase() {
            return Err(CheckBlockError::FirstNotCoinbase);
        }
        if self.transactions[1..].iter().any(Transaction::is_coinbase) {
            return Err(CheckBlockError::ExtraCoinbases);
        }

        let mut seen_txids = std::collections::HashSet::new();
        let mut seen_outpoints = std::collections::HashSet::new();
        let mut created_outpoints = std::collections::HashSet::new();
        for (i, tx) in self.transactions.iter().enumerate() {
            if !seen_txids.insert(tx.txid()) {
                return Err(CheckBlockError::InternalDuplicate);
            }
            for j in 0..tx.outputs.len() {
                created_outpoints.insert(crate::point::Point::new(tx.txid(), j as u32));
            }
            if i == 0 {
                continue;
            }
            for input in &tx.inputs {
                if !seen_outpoints.insert(input.previous_output) {
                    return Err(CheckBlockError::BlockInternalDoubleSpend);
                }
                if created_outpoints.contains(&input.previous_output) {
                    return Err(CheckBlockError::ForwardReference);
                }
            }
        }

        if self.computed_merkle_root() != self.header.merkle_root {
            return Err(CheckBlockError::MerkleMismatch);
        }

        let legacy_sigops: usize = self
            .transactions
            .iter()
            .map(Transaction::base_signature_operations)
            .sum();
        if legacy_sigops > MAX_BLOCK_LEGACY_SIGOPS {
            return Err(CheckBlockError::BlockLegacySigopLimit);
        }

        Ok(())
    }

    /// Contextual checks: transaction finality, BIP34 height commitment,
    /// subsidy, witness commitment, and weight.
    pub fn accept(&self, context: &BlockAcceptContext) -> Result<(), AcceptBlockError> {
        if self
            .transactions
            .iter()
            .any(|tx| !tx.is_final(context.height, context.median_time_past))
        {
            return Err(AcceptBlockError::BlockNonFinal);
        }

        if self.header.version >= 2 {
            let coinbase_script = self.transactions[0].inputs[0].script.as_bytes();
            let committed_height = coinbase_script
                .first()
                .copied()
                .and_then(|len| coinbase_script.get(1..1 + len as usize))
                .and_then(decode_minimal_script_num);
            if committed_height != Some(context.height as i64) {
                return Err(AcceptBlockError::CoinbaseHeightMismatch);
            }
        }

        let halvings = context.height / context.halving_interval.max(1);
        let subsidy = if halvings >= 64 {
            0
        } else {
            context.base_subsidy >> halvings
        };
        let coinbase_out: u64 = self.transactions[0].outputs.iter().map(|o| o.value).sum();
        if coinbase_out > subsidy.saturating_add(context.total_fees) {
            return Err(AcceptBlockError::CoinbaseValueLimit);
        }

        if self.transactions.iter().any(Transaction::is_segwit) {
            match (
                self.expected_witness_commitment(),
                self.carried_witness_commitment(),
            ) {
                (Some(expected), Some(carried)) if expected == carried => {}
                _ => return Err(AcceptBlockError::InvalidWitnessCommitment),
            }
        }

        if self.weight() > MAX_BLOCK_WEIGHT {
            return Err(AcceptBlockError::BlockWeightLimit);
        }

        let mut embedded_sigops = 0usize;
        for (tx, spent) in self.transactions.iter().zip(context.prevouts.iter()) {
            embedded_sigops += tx.base_signature_operations();
            for (input, prevout) in tx.inputs.iter().zip(spent.iter()) {
                if let Some(prevout) = prevout {
                    embedded_sigops += crate::input::embedded_signature_operations(input, &prevout.script);
                }
            }
        }
        if embedded_sigops > MAX_BLOCK_EMBEDDED_SIGOPS {
            return Err(AcceptBlockError::BlockEmbeddedSigopLimit);
        }

        Ok(())
    }
}

fn legacy_encoded_len(tx: &Transaction) -> usize {
    let mut legacy = tx.clone();
    for input in legacy.inputs.iter_mut() {
        input.witness = crate::witness::Witness::empty();
    }
    4 + satoshi_core::ser::varint_len(legacy.inputs.len() as u64)
        + legacy.inputs.iter().map(Codec::encoded_len).sum::<usize>()
        + satoshi_core::ser::varint_len(legacy.outputs.len() as u64)
        + legacy.outputs.iter().map(Codec::encoded_len).sum::<usize>()
        + 4
}

fn decode_minimal_script_num(bytes: &[u8]) -> Option<i64> {
    if bytes.is_empty() {
        return Some(0);
    }
    let mut result: i64 = 0;
    for (i, byte) in bytes.iter().enumerate() {
        result |= (*byte as i64) << (8 * i);
    }
    let last = *bytes.last().unwrap();
    if last & 0x80 != 0 {
        result &= !(0x80i64 << (8 * (bytes.len() - 1)));
        result = -result;
    }
    Some(result)
}

impl Codec for Block {
    fn decode(reader: &mut ByteReader<'_>) -> Option<Self> {
        let header = Header::decode(reader)?;
        let count = reader.read_varint();
        let mut transactions = Vec::with_capacity(count.min(1_000_000) as usize);
        for _ in 0..count {
            transactions.push(Transaction::decode(reader)?);
        }
        if reader.failed() {
            None
        } else {
            Some(Self {
                header,
                transactions,
            })
        }
    }

    fn encode(&self, writer: &mut ByteWriter) {
        self.header.encode(writer);
        writer.write_varint(self.transactions.len() as u64);
        for tx in &self.transactions {
            tx.encode(writer);
        }
    }

    fn encoded_len(&self) -> usize {
        80 + satoshi_core::ser::varint_len(self.transactions.len() as u64)
            + self
                .transactions
                .iter()
                .map(Transaction::encoded_len)
                .sum::<usize>()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{input::Input, output::Output, point::Point, script::Script};

    fn sample_block() -> Block {
        let coinbase = Transaction {
            version: 1,
            inputs: vec![Input::new(Point::null(), Script::new(vec![0x51]), 0xffff_ffff)],
            outputs: vec![Output::new(50_0000_0000, Script::new(vec![0x51]))],
            locktime: 0,
        };
        let merkle = merkle_root(&[coinbase.txid()]);
        Block {
            header: Header {
                version: 1,
                previous_block_hash: Hash32::zero(),
                merkle_root: merkle,
                timestamp: 100,
                bits: 0x207f_ffff,
                nonce: 0,
            },
            transactions: vec![coinbase],
        }
    }

    #[test]
    fn merkle_matches_for_well_formed_block() {
        let block = sample_block();
        assert!(block.check().is_ok());
    }

    #[test]
    fn mismatched_merkle_is_rejected() {
        let mut block = sample_block();
        block.header.merkle_root = Hash32([0xffu8; 32]);
        assert_eq!(block.check(), Err(CheckBlockError::MerkleMismatch));
    }

    #[test]
    fn second_coinbase_is_rejected() {
        let mut block = sample_block();
        let extra = block.transactions[0].clone();
        block.transactions.push(extra);
        assert_eq!(block.check(), Err(CheckBlockError::ExtraCoinbases));
    }

    #[test]
    fn roundtrips_through_codec() {
        let block = sample_block();
        let bytes = block.to_bytes();
        assert_eq!(bytes.len(), block.encoded_len());
        assert_eq!(Block::from_bytes(&bytes).unwrap(), block);
    }
}
