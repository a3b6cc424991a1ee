//! # Satoshi Core
//!
//! `satoshi-core` contains the leaf-level primitives shared by every other
//! crate in this workspace: the Bitcoin wire byte codec (`ser`), the hash
//! functions consensus relies on (`hashes`), compact-target expansion
//! (`compact`), and the immutable per-network parameter bundle (`params`).
//!
//! ## Crate layout
//!
//! ### `ser`
//!
//! [`ByteReader`]/[`ByteWriter`] give sticky-failure primitive reads and
//! writes over a byte slice/sink, plus the Bitcoin varint and
//! length-prefixed byte string encodings. The [`Codec`] trait is the
//! serialization contract every data-model and wire-message type in this
//! workspace implements.
//!
//! ### `hashes`
//!
//! One-shot and streaming ([`Accumulator`]) SHA-256/SHA-1/RIPEMD-160, the
//! derived HASH160/HASH256/checksum functions, BIP340-style tagged hashes,
//! and merkle-root folding.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(unused_extern_crates)]

pub mod compact;
pub mod hashes;
pub mod params;
pub mod ser;

pub use hashes::{Accumulator, Hash20, Hash32, Hash6};
pub use params::{NetworkId, NetworkParams};
pub use ser::{ByteReader, ByteWriter, Codec};
