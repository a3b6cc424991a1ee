//! Satoshi EC — secp256k1 key handling, ECDSA/Schnorr signature verification,
//! and Borromean ring signatures.
//!
//! This crate intentionally does not touch base58/bech32 address encoding or
//! BIP32 key derivation; it covers only the curve arithmetic consensus rules
//! need.

pub mod error;
pub mod keys;
pub mod ring;

pub use error::EcError;
pub use ring::{Ring, RingSignature};
