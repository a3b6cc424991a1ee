//! Errors raised by secp256k1 key, signature, and ring-signature operations.

use thiserror::Error;

/// Errors from the EC primitive layer.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EcError {
    /// A 32-byte scalar was zero or not reduced modulo the curve order.
    #[error("scalar out of range [1, n-1]")]
    InvalidScalar,
    /// A public key byte string was not a valid compressed or uncompressed
    /// SEC1 point.
    #[error("invalid public key encoding")]
    InvalidPublicKey,
    /// A DER-encoded ECDSA signature failed to parse (or failed BIP66
    /// strict-DER validation when requested).
    #[error("invalid DER signature encoding")]
    InvalidSignatureEncoding,
    /// A ring in a Borromean ring signature was empty.
    #[error("borromean ring signature contains an empty ring")]
    EmptyRing,
    /// None of the supplied secrets matched any key in one of the rings.
    #[error("no known secret key for a ring")]
    UnknownRingSecret,
    /// A computed point during ring signing/verification was the identity.
    #[error("ring signature arithmetic produced the point at infinity")]
    IdentityPoint,
}
