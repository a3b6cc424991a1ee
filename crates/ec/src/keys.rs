//! Thin wrapper over `k256` for secp256k1 key derivation and ECDSA/Schnorr
//! signature verification, grounded on the teacher's `coins-bip32` use of
//! `k256` as its curve backend.

use crate::error::EcError;
use k256::ecdsa::signature::hazmat::PrehashVerifier;
use k256::ecdsa::{Signature as EcdsaSignature, VerifyingKey};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::schnorr::{signature::Verifier as SchnorrVerifier, Signature as SchnorrSignature, VerifyingKey as SchnorrVerifyingKey};
use k256::{PublicKey, Scalar, SecretKey};

/// Parse a 32-byte scalar as a private key. Valid range is `[1, n-1]`.
pub fn parse_secret(secret: &[u8; 32]) -> Result<SecretKey, EcError> {
    SecretKey::from_slice(secret).map_err(|_| EcError::InvalidScalar)
}

/// Derive the public key for a private key, in compressed (33-byte) or
/// uncompressed (65-byte) SEC1 form.
pub fn secret_to_public(secret: &[u8; 32], compressed: bool) -> Result<Vec<u8>, EcError> {
    let sk = parse_secret(secret)?;
    let pk = sk.public_key();
    Ok(pk.to_encoded_point(compressed).as_bytes().to_vec())
}

/// Parse a 33-byte compressed or 65-byte uncompressed SEC1 public key.
pub fn parse_public(bytes: &[u8]) -> Result<PublicKey, EcError> {
    PublicKey::from_sec1_bytes(bytes).map_err(|_| EcError::InvalidPublicKey)
}

/// Verify a DER-encoded ECDSA signature against a 32-byte message digest and
/// a SEC1-encoded public key.
///
/// `k256::ecdsa::Signature::from_der` only accepts canonical DER, so this
/// already enforces BIP66 strictness; there is no lenient variant since
/// every caller in this system needs strict parsing (BIP66 strict-DER has
/// been mandatory on mainnet for every block this system validates).
pub fn verify_ecdsa_der(pubkey: &[u8], hash: &[u8; 32], signature_der: &[u8]) -> bool {
    let Ok(pk) = parse_public(pubkey) else {
        return false;
    };
    let Ok(sig) = EcdsaSignature::from_der(signature_der) else {
        return false;
    };
    let vk = VerifyingKey::from(&pk);
    vk.verify_prehash(hash, &sig).is_ok()
}

/// Verify a 64-byte compact ECDSA signature (`r || s`).
pub fn verify_ecdsa_compact(pubkey: &[u8], hash: &[u8; 32], signature: &[u8; 64]) -> bool {
    let Ok(pk) = parse_public(pubkey) else {
        return false;
    };
    let Ok(sig) = EcdsaSignature::from_slice(signature) else {
        return false;
    };
    let vk = VerifyingKey::from(&pk);
    vk.verify_prehash(hash, &sig).is_ok()
}

/// BIP146 low-S check: is the `s` component of a DER-encoded signature at
/// most half the curve order?
pub fn is_low_s(signature_der: &[u8]) -> bool {
    match EcdsaSignature::from_der(signature_der) {
        Ok(sig) => sig.normalize_s().is_none(),
        Err(_) => false,
    }
}

/// Verify a 64-byte BIP340 Schnorr signature against a 32-byte x-only
/// public key and 32-byte message, for taproot key-path and tapscript
/// `OP_CHECKSIG`.
pub fn verify_schnorr(pubkey32: &[u8; 32], msg32: &[u8; 32], sig64: &[u8; 64]) -> bool {
    let Ok(vk) = SchnorrVerifyingKey::from_bytes(pubkey32) else {
        return false;
    };
    let Ok(sig) = SchnorrSignature::try_from(sig64.as_slice()) else {
        return false;
    };
    vk.verify(msg32, &sig).is_ok()
}

/// Add two secp256k1 points. Returns `None` if either input is not a valid
/// point or the result is the point at infinity.
pub fn point_add(a: &[u8], b: &[u8]) -> Option<Vec<u8>> {
    let pa = parse_public(a).ok()?;
    let pb = parse_public(b).ok()?;
    let sum = (pa.to_projective() + pb.to_projective()).to_affine();
    if is_identity(&sum) {
        return None;
    }
    Some(sum.to_encoded_point(true).as_bytes().to_vec())
}

fn is_identity(point: &k256::AffinePoint) -> bool {
    use k256::elliptic_curve::group::prime::PrimeCurveAffine;
    point.is_identity().into()
}

/// Multiply a point (the generator, if `point` is `None`) by a scalar.
/// Returns `None` for a zero or out-of-range scalar, or an identity result.
pub fn point_multiply(point: Option<&[u8]>, scalar: &[u8; 32]) -> Option<Vec<u8>> {
    let s = scalar_from_bytes(scalar)?;
    let base = match point {
        Some(bytes) => parse_public(bytes).ok()?.to_projective(),
        None => k256::ProjectivePoint::GENERATOR,
    };
    let result = (base * s).to_affine();
    if is_identity(&result) {
        return None;
    }
    Some(result.to_encoded_point(true).as_bytes().to_vec())
}

/// Add two scalars modulo the curve order. Returns `None` if either input is
/// out of range or the sum is zero.
pub fn scalar_add(a: &[u8; 32], b: &[u8; 32]) -> Option<[u8; 32]> {
    let sa = scalar_from_bytes(a)?;
    let sb = scalar_from_bytes(b)?;
    let sum = sa + sb;
    let bytes: [u8; 32] = sum.to_bytes().into();
    if bytes == [0u8; 32] {
        None
    } else {
        Some(bytes)
    }
}

/// Parse a scalar from its canonical 32-byte big-endian representation.
/// Returns `None` if the bytes are not a member of `[0, n-1]`.
pub(crate) fn scalar_from_bytes(bytes: &[u8; 32]) -> Option<Scalar> {
    let ct = Scalar::from_repr((*bytes).into());
    Option::from(ct)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn secret_to_public_compressed_is_33_bytes() {
        let secret = [1u8; 32];
        let pubkey = secret_to_public(&secret, true).unwrap();
        assert_eq!(pubkey.len(), 33);
    }

    #[test]
    fn zero_secret_is_rejected() {
        assert!(parse_secret(&[0u8; 32]).is_err());
    }

    #[test]
    fn schnorr_roundtrip() {
        use k256::schnorr::SigningKey;
        let sk = SigningKey::from_bytes(&[7u8; 32]).unwrap();
        let vk = sk.verifying_key();
        let msg = [9u8; 32];
        let sig = sk.try_sign(&msg).unwrap();
        let pubkey_bytes = vk.to_bytes();
        let mut pk32 = [0u8; 32];
        pk32.copy_from_slice(&pubkey_bytes);
        let mut sig64 = [0u8; 64];
        sig64.copy_from_slice(sig.to_bytes().as_slice());
        assert!(verify_schnorr(&pk32, &msg, &sig64));
    }
}
