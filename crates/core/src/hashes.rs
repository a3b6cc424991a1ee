//! Hash primitives: block-oriented SHA-256, SHA-1, RIPEMD-160, streaming
//! accumulators, and the derived Bitcoin hash functions (HASH160, HASH256,
//! checksum, merkle folding).
//!
//! The streaming accumulator wraps the RustCrypto `Digest` implementations
//! (`sha2`, `sha1`, `ripemd`) rather than re-deriving FIPS 180 padding by
//! hand: `Digest::update`/`Digest::finalize` already give us the exact
//! one-shot/streaming contract the spec describes, we just give it the
//! `write`/`flush` names and the overflow-invalidation behavior Bitcoin's
//! wire-level consumers expect.

use crate::ser::{ByteReader, ByteWriter, Codec};
use digest::Digest;
use std::fmt;

/// Maximum number of bytes a single accumulator run may be fed, matching
/// the protocol length limit implied by the 64-bit bit-count terminator
/// these digests use internally. Exceeding it invalidates the accumulator.
const MAX_ACCUMULATOR_INPUT: u64 = u64::MAX / 8;

/// A streaming hash accumulator over a RustCrypto [`Digest`] implementation.
/// `write` may be called any number of times; `flush` consumes the
/// accumulator and returns the digest.
pub struct Accumulator<D: Digest> {
    inner: D,
    written: u64,
    overflowed: bool,
}

impl<D: Digest> Accumulator<D> {
    /// A fresh accumulator with no bytes written.
    pub fn new() -> Self {
        Self {
            inner: D::new(),
            written: 0,
            overflowed: false,
        }
    }

    /// Feed more bytes into the accumulator.
    pub fn write(&mut self, bytes: &[u8]) {
        if self.overflowed {
            return;
        }
        self.written += bytes.len() as u64;
        if self.written > MAX_ACCUMULATOR_INPUT {
            self.overflowed = true;
            return;
        }
        self.inner.update(bytes);
    }

    /// True if a single accumulator has been asked to hash more data than
    /// the protocol length limit allows.
    pub fn overflowed(&self) -> bool {
        self.overflowed
    }

    /// Finalize the accumulator into its digest. Returns `None` if the
    /// accumulator overflowed at some point during writing.
    pub fn flush(self) -> Option<generic_array::GenericArray<u8, D::OutputSize>> {
        if self.overflowed {
            None
        } else {
            Some(self.inner.finalize())
        }
    }
}

impl<D: Digest> Default for Accumulator<D> {
    fn default() -> Self {
        Self::new()
    }
}

/// One-shot SHA-256.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let out = sha2::Sha256::digest(data);
    let mut buf = [0u8; 32];
    buf.copy_from_slice(&out);
    buf
}

/// One-shot SHA-1. Retained only for legacy script opcodes (`OP_SHA1`);
/// not used in any current consensus hash chain.
pub fn sha1(data: &[u8]) -> [u8; 20] {
    let out = sha1::Sha1::digest(data);
    let mut buf = [0u8; 20];
    buf.copy_from_slice(&out);
    buf
}

/// One-shot RIPEMD-160.
pub fn ripemd160(data: &[u8]) -> [u8; 20] {
    let out = ripemd::Ripemd160::digest(data);
    let mut buf = [0u8; 20];
    buf.copy_from_slice(&out);
    buf
}

/// `HASH256(x) = SHA256(SHA256(x))`. The double hash used for txids, block
/// hashes, and the merkle tree.
pub fn hash256(data: &[u8]) -> Hash32 {
    Hash32(sha256(&sha256(data)))
}

/// `HASH160(x) = RIPEMD160(SHA256(x))`. Used for P2PKH/P2WPKH/P2SH script
/// hashes and address fingerprints.
pub fn hash160(data: &[u8]) -> Hash20 {
    Hash20(ripemd160(&sha256(data)))
}

/// Bitcoin wire checksum: the first four bytes of `HASH256(payload)`.
pub fn checksum(payload: &[u8]) -> [u8; 4] {
    let h = hash256(payload);
    let mut out = [0u8; 4];
    out.copy_from_slice(&h.0[0..4]);
    out
}

/// BIP340/341/342 tagged hash:
/// `SHA256(SHA256(tag) ‖ SHA256(tag) ‖ msg)`.
pub fn tagged_hash(tag: &str, msg: &[u8]) -> [u8; 32] {
    let tag_hash = sha256(tag.as_bytes());
    let mut acc = Accumulator::<sha2::Sha256>::new();
    acc.write(&tag_hash);
    acc.write(&tag_hash);
    acc.write(msg);
    let digest = acc.flush().unwrap();
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}

macro_rules! fixed_hash {
    ($name:ident, $len:expr, $doc:expr) => {
        #[doc = $doc]
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
        pub struct $name(pub [u8; $len]);

        impl $name {
            /// Number of bytes in this hash.
            pub const LEN: usize = $len;

            /// All-zero hash.
            pub fn zero() -> Self {
                Self([0u8; $len])
            }

            /// True if every byte is zero.
            pub fn is_zero(&self) -> bool {
                self.0 == [0u8; $len]
            }

            /// Borrow the underlying bytes.
            pub fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }

            /// Display form per the historical Satoshi convention: hex of
            /// the byte-reversed hash.
            pub fn to_reversed_hex(&self) -> String {
                let mut reversed = self.0;
                reversed.reverse();
                hex::encode(reversed)
            }

            /// Parse the reversed-hex display form back into a hash.
            pub fn from_reversed_hex(s: &str) -> Option<Self> {
                let mut bytes = hex::decode(s).ok()?;
                if bytes.len() != $len {
                    return None;
                }
                bytes.reverse();
                let mut out = [0u8; $len];
                out.copy_from_slice(&bytes);
                Some(Self(out))
            }
        }

        impl From<[u8; $len]> for $name {
            fn from(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                &self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.to_reversed_hex())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.to_reversed_hex())
            }
        }
    };
}

macro_rules! fixed_hash_codec {
    ($name:ident, $len:expr) => {
        impl Codec for $name {
            fn decode(reader: &mut ByteReader<'_>) -> Option<Self> {
                let bytes = reader.read_hash::<$len>();
                if reader.failed() {
                    None
                } else {
                    Some(Self(bytes))
                }
            }

            fn encode(&self, writer: &mut ByteWriter) {
                writer.write_bytes(&self.0);
            }

            fn encoded_len(&self) -> usize {
                $len
            }
        }
    };
}

fixed_hash!(Hash32, 32, "A 32-byte double-SHA-256 style digest.");
fixed_hash!(Hash20, 20, "A 20-byte short hash (HASH160/RIPEMD160 output).");
fixed_hash!(Hash6, 6, "A 6-byte mini hash, used by some compact identifiers.");

fixed_hash_codec!(Hash32, 32);
fixed_hash_codec!(Hash20, 20);
fixed_hash_codec!(Hash6, 6);

impl From<generic_array::GenericArray<u8, generic_array::typenum::U32>> for Hash32 {
    fn from(arr: generic_array::GenericArray<u8, generic_array::typenum::U32>) -> Self {
        let mut out = [0u8; 32];
        out.copy_from_slice(&arr);
        Self(out)
    }
}

/// Fold a vector of 32-byte leaves into a single merkle root, pairwise
/// double-SHA-256, duplicating the last leaf when a level has odd length.
/// This is the legacy Satoshi merkle construction and carries the known
/// CVE-2012-2459 duplication ambiguity; callers that need to reject
/// ambiguous trees must do so themselves (e.g. by detecting an odd internal
/// node count whose last two leaves are equal).
pub fn merkle_root(leaves: &[Hash32]) -> Hash32 {
    if leaves.is_empty() {
        return Hash32::zero();
    }
    let mut level: Vec<Hash32> = leaves.to_vec();
    while level.len() > 1 {
        if level.len() % 2 == 1 {
            let last = *level.last().unwrap();
            level.push(last);
        }
        level = level
            .chunks_exact(2)
            .map(|pair| {
                let mut buf = Vec::with_capacity(64);
                buf.extend_from_slice(&pair[0].0);
                buf.extend_from_slice(&pair[1].0);
                hash256(&buf)
            })
            .collect();
    }
    level[0]
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn hash256_of_empty() {
        let h = hash256(b"");
        assert_eq!(
            h.to_reversed_hex(),
            "5df6e0e2761359d30a8275058e299fcc0381534545f55cf43e41983f5d4c945"
        );
    }

    #[test]
    fn hash160_of_empty() {
        let h = hash160(b"");
        assert_eq!(hex::encode(h.0), "b472a266d0bd89c13706a4132ccfb16f7c3b9fcb");
    }

    #[test]
    fn merkle_single_leaf() {
        let leaf = hash256(b"a");
        assert_eq!(merkle_root(&[leaf]), leaf);
    }

    #[test]
    fn merkle_two_leaves() {
        let a = hash256(b"a");
        let b = hash256(b"b");
        let mut buf = Vec::new();
        buf.extend_from_slice(&a.0);
        buf.extend_from_slice(&b.0);
        assert_eq!(merkle_root(&[a, b]), hash256(&buf));
    }

    #[test]
    fn merkle_three_equals_duplicated_four() {
        let a = hash256(b"a");
        let b = hash256(b"b");
        let c = hash256(b"c");
        assert_eq!(merkle_root(&[a, b, c]), merkle_root(&[a, b, c, c]));
    }

    #[test]
    fn accumulator_matches_one_shot() {
        let mut acc = Accumulator::<sha2::Sha256>::new();
        acc.write(b"hello ");
        acc.write(b"world");
        let digest: [u8; 32] = acc.flush().unwrap().into();
        assert_eq!(digest, sha256(b"hello world"));
    }
}
