//! Borromean ring signatures over secp256k1, used by stealth/confidential
//! payloads. Grounded directly on libbitcoin's `src/math/ring_signature.cpp`:
//! `sign`/`verify` share the `borromean_hash`/`calculate_R`/`calculate_s`
//! recurrence defined there.

use crate::error::EcError;
use k256::elliptic_curve::group::prime::PrimeCurveAffine;
use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::{AffinePoint, ProjectivePoint, Scalar};
use satoshi_core::hashes::{sha256, Hash32};
use std::collections::HashMap;

/// A public key ring: every member is a 33-byte compressed secp256k1 point.
pub type Ring = Vec<Vec<u8>>;

/// A Borromean ring signature over one or more [`Ring`]s.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RingSignature {
    /// The overall challenge `e0`.
    pub challenge: Hash32,
    /// Per-ring, per-member response scalars.
    pub proofs: Vec<Vec<[u8; 32]>>,
}

fn parse_point(bytes: &[u8]) -> Option<ProjectivePoint> {
    let affine: Option<AffinePoint> =
        Option::from(AffinePoint::from_encoded_point(&k256::EncodedPoint::from_bytes(bytes).ok()?));
    affine.map(ProjectivePoint::from)
}

fn point_bytes(point: &ProjectivePoint) -> Option<Vec<u8>> {
    let affine = point.to_affine();
    if bool::from(affine.is_identity()) {
        return None;
    }
    Some(affine.to_encoded_point(true).as_bytes().to_vec())
}

fn scalar_from_digest(digest: [u8; 32]) -> Option<Scalar> {
    Option::from(Scalar::from_repr(digest.into()))
}

/// `e_{i,j} = H(R || M || be32(i) || be32(j))`, reduced onto the scalar
/// field. Returns `None` in the (cryptographically negligible) case the
/// digest is not a valid scalar.
fn borromean_hash(message: &Hash32, r: &[u8], i: u32, j: u32) -> Option<Scalar> {
    let mut data = Vec::with_capacity(r.len() + 32 + 8);
    data.extend_from_slice(r);
    data.extend_from_slice(&message.0);
    data.extend_from_slice(&i.to_be_bytes());
    data.extend_from_slice(&j.to_be_bytes());
    scalar_from_digest(sha256(&data))
}

/// `R = sG + eP`.
fn calculate_r(s: Scalar, e: Scalar, ring_key: &[u8]) -> Option<Vec<u8>> {
    let p = parse_point(ring_key)?;
    let r = ProjectivePoint::GENERATOR * s + p * e;
    point_bytes(&r)
}

/// `s = k - ex`.
fn calculate_s(k: Scalar, e: Scalar, secret: Scalar) -> Scalar {
    k - e * secret
}

fn scalar32(scalar: &Scalar) -> [u8; 32] {
    let bytes: [u8; 32] = scalar.to_bytes().into();
    bytes
}

/// Sign `digest` across `rings`, given the secret keys known to the signer
/// and a fresh random salt `k_i` per ring. Exactly one `secrets` entry must
/// correspond to a public key in every ring, or signing fails.
pub fn sign(
    secrets: &[[u8; 32]],
    rings: &[Ring],
    digest: &Hash32,
    salts: &[[u8; 32]],
) -> Result<RingSignature, EcError> {
    if rings.is_empty() || salts.len() != rings.len() {
        return Err(EcError::EmptyRing);
    }

    let mut secret_map: HashMap<Vec<u8>, Scalar> = HashMap::new();
    for secret in secrets {
        let scalar = crate::keys::scalar_from_bytes(secret).ok_or(EcError::InvalidScalar)?;
        let pubkey = crate::keys::secret_to_public(secret, true)?;
        secret_map.insert(pubkey, scalar);
    }
    if secret_map.is_empty() {
        return Err(EcError::UnknownRingSecret);
    }

    let mut known_indexes = Vec::with_capacity(rings.len());
    let mut proofs: Vec<Vec<[u8; 32]>> = Vec::with_capacity(rings.len());
    for ring in rings {
        if ring.is_empty() {
            return Err(EcError::EmptyRing);
        }
        let known_index = ring
            .iter()
            .position(|key| secret_map.contains_key(key))
            .ok_or(EcError::UnknownRingSecret)?;
        known_indexes.push(known_index);
        proofs.push(
            (0..ring.len())
                .map(|_| scalar32(&random_scalar()))
                .collect(),
        );
    }

    // Step 1: walk each ring from just past the known index to its end,
    // accumulating the final R value that feeds the overall challenge.
    let mut e0_data = Vec::new();
    for (i, ring) in rings.iter().enumerate() {
        let known_index = known_indexes[i];
        let mut r_ij = crate::keys::secret_to_public(&salts[i], true)?;

        for j in (known_index + 1)..ring.len() {
            let s = scalar_from_digest_bytes(proofs[i][j])?;
            let e_ij = borromean_hash(digest, &r_ij, i as u32, j as u32).ok_or(EcError::IdentityPoint)?;
            r_ij = calculate_r(s, e_ij, &ring[j]).ok_or(EcError::IdentityPoint)?;
        }
        e0_data.extend_from_slice(&r_ij);
    }
    e0_data.extend_from_slice(&digest.0);
    let challenge = Hash32(sha256(&e0_data));

    // Step 2: close each ring at its known index.
    for (i, ring) in rings.iter().enumerate() {
        let known_index = known_indexes[i];
        let mut e_ij = borromean_hash(digest, &challenge.0, i as u32, 0).ok_or(EcError::IdentityPoint)?;

        for j in 0..known_index {
            let s = scalar_from_digest_bytes(proofs[i][j])?;
            let r_ij = calculate_r(s, e_ij, &ring[j]).ok_or(EcError::IdentityPoint)?;
            e_ij = borromean_hash(digest, &r_ij, i as u32, (j + 1) as u32).ok_or(EcError::IdentityPoint)?;
        }

        let known_pubkey = &ring[known_index];
        let secret = *secret_map.get(known_pubkey).ok_or(EcError::UnknownRingSecret)?;
        let salt = crate::keys::scalar_from_bytes(&salts[i]).ok_or(EcError::InvalidScalar)?;
        proofs[i][known_index] = scalar32(&calculate_s(salt, e_ij, secret));
    }

    Ok(RingSignature { challenge, proofs })
}

/// Verify a [`RingSignature`] against `rings` and `digest`.
pub fn verify(rings: &[Ring], digest: &Hash32, signature: &RingSignature) -> bool {
    if rings.len() != signature.proofs.len() {
        return false;
    }

    let mut e0_data = Vec::new();
    for (i, ring) in rings.iter().enumerate() {
        if ring.is_empty() || signature.proofs[i].len() != ring.len() {
            return false;
        }
        let Some(mut e_ij) = borromean_hash(digest, &signature.challenge.0, i as u32, 0) else {
            return false;
        };
        let mut r_ij = Vec::new();
        for (j, ring_key) in ring.iter().enumerate() {
            let Some(s) = scalar_from_digest_bytes(signature.proofs[i][j]).ok() else {
                return false;
            };
            let Some(r) = calculate_r(s, e_ij, ring_key) else {
                return false;
            };
            r_ij = r;
            let Some(next_e) = borromean_hash(digest, &r_ij, i as u32, (j + 1) as u32) else {
                return false;
            };
            e_ij = next_e;
        }
        e0_data.extend_from_slice(&r_ij);
    }
    e0_data.extend_from_slice(&digest.0);

    sha256(&e0_data) == signature.challenge.0
}

fn scalar_from_digest_bytes(bytes: [u8; 32]) -> Result<Scalar, EcError> {
    crate::keys::scalar_from_bytes(&bytes).ok_or(EcError::InvalidScalar)
}

fn random_scalar() -> Scalar {
    use rand::RngCore;
    let mut rng = rand::rngs::OsRng;
    loop {
        let mut bytes = [0u8; 32];
        rng.fill_bytes(&mut bytes);
        if let Some(s) = crate::keys::scalar_from_bytes(&bytes) {
            if bool::from(<Scalar as k256::elliptic_curve::ops::Invert>::invert(&s).is_some()) {
                return s;
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn secret(byte: u8) -> [u8; 32] {
        let mut s = [0u8; 32];
        s[31] = byte;
        s
    }

    #[test]
    fn single_ring_roundtrip() {
        let secrets = [secret(1)];
        let pub1 = crate::keys::secret_to_public(&secret(1), true).unwrap();
        let pub2 = crate::keys::secret_to_public(&secret(2), true).unwrap();
        let ring = vec![pub1, pub2];
        let digest = Hash32(sha256(b"ring test message"));
        let salts = [secret(42)];

        let sig = sign(&secrets, &[ring.clone()], &digest, &salts).unwrap();
        assert!(verify(&[ring], &digest, &sig));
    }

    #[test]
    fn tampered_challenge_fails() {
        let secrets = [secret(3)];
        let pub1 = crate::keys::secret_to_public(&secret(3), true).unwrap();
        let pub2 = crate::keys::secret_to_public(&secret(4), true).unwrap();
        let ring = vec![pub1, pub2];
        let digest = Hash32(sha256(b"another message"));
        let salts = [secret(7)];

        let mut sig = sign(&secrets, &[ring.clone()], &digest, &salts).unwrap();
        sig.challenge.0[0] ^= 0xff;
        assert!(!verify(&[ring], &digest, &sig));
    }

    #[test]
    fn tampered_proof_fails() {
        let secrets = [secret(5)];
        let pub1 = crate::keys::secret_to_public(&secret(5), true).unwrap();
        let pub2 = crate::keys::secret_to_public(&secret(6), true).unwrap();
        let ring = vec![pub1, pub2];
        let digest = Hash32(sha256(b"a third message"));
        let salts = [secret(8)];

        let mut sig = sign(&secrets, &[ring.clone()], &digest, &salts).unwrap();
        sig.proofs[0][0][0] ^= 0xff;
        assert!(!verify(&[ring], &digest, &sig));
    }

    #[test]
    fn empty_ring_is_rejected() {
        let digest = Hash32(sha256(b"x"));
        assert_eq!(
            sign(&[secret(1)], &[vec![]], &digest, &[secret(2)]),
            Err(EcError::EmptyRing)
        );
    }
}
