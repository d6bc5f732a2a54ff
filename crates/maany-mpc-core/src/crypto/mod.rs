//! Narrow façade over the cryptographic primitives
//!
//! Curve arithmetic comes from `k256`, Paillier from the `paillier` crate.
//! Everything the protocol drivers need is funneled through here so the
//! encodings stay in one place.

pub mod paillier;

use k256::elliptic_curve::bigint::U256;
use k256::elliptic_curve::ops::Reduce;
use k256::elliptic_curve::sec1::{FromEncodedPoint, ToEncodedPoint};
use k256::elliptic_curve::Group;
use k256::{AffinePoint, EncodedPoint, ProjectivePoint, Scalar};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

/// SEC1 compressed encoding (33 bytes for secp256k1)
pub fn encode_point(point: &ProjectivePoint) -> Vec<u8> {
    point.to_affine().to_encoded_point(true).as_bytes().to_vec()
}

/// Decode a SEC1-encoded point; identity and off-curve inputs are rejected
pub fn decode_point(bytes: &[u8]) -> Result<ProjectivePoint> {
    let encoded = EncodedPoint::from_bytes(bytes)
        .map_err(|e| Error::Crypto(format!("invalid point encoding: {e}")))?;
    let affine = Option::<AffinePoint>::from(AffinePoint::from_encoded_point(&encoded))
        .ok_or_else(|| Error::Crypto("point is not on the curve".into()))?;
    let point = ProjectivePoint::from(affine);
    if bool::from(point.is_identity()) {
        return Err(Error::Crypto("point at infinity".into()));
    }
    Ok(point)
}

/// Big-endian 32-byte scalar encoding
pub fn encode_scalar(scalar: &Scalar) -> [u8; 32] {
    scalar.to_bytes().into()
}

/// Interpret 32 bytes as a scalar, reducing mod the curve order
pub fn scalar_from_bytes(bytes: &[u8; 32]) -> Scalar {
    <Scalar as Reduce<U256>>::reduce_bytes(&(*bytes).into())
}

/// SHA-256 over the concatenation of `parts`
pub fn sha256(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}
