//! Local share handle and its deterministic binary codec
//!
//! A keypair is one party's half of a jointly generated key: the joint
//! public point `Q`, this party's secret scalar share, the Paillier
//! ciphertext binding the device share, and the party's Paillier material.
//! Only the device side carries the Paillier primes.

use curv::arithmetic::Converter;
use curv::BigInt;
use k256::elliptic_curve::Field;
use k256::{ProjectivePoint, Scalar};
use zeroize::Zeroizing;

use crate::codec::{Reader, Writer};
use crate::crypto::paillier::PaillierMaterial;
use crate::crypto::{decode_point, encode_point, encode_scalar, scalar_from_bytes};
use crate::error::{Error, Result};
use crate::types::{Curve, KeyId, Scheme, ShareKind};

/// Framing constants of the exported blob
const KEY_BLOB_MAGIC: u32 = 0x4D50_434B; // "MPCK"
const KEY_BLOB_VERSION: u32 = 1;

/// One party's local share of a joint key
pub struct Keypair {
    kind: ShareKind,
    scheme: Scheme,
    curve: Curve,
    key_id: KeyId,
    q: ProjectivePoint,
    x_share: Scalar,
    c_key: BigInt,
    paillier: PaillierMaterial,
}

impl Clone for Keypair {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            scheme: self.scheme,
            curve: self.curve,
            key_id: self.key_id,
            q: self.q,
            x_share: self.x_share,
            c_key: self.c_key.clone(),
            paillier: self.paillier.clone(),
        }
    }
}

impl Drop for Keypair {
    fn drop(&mut self) {
        // best-effort scrub of the secret scalar; the Paillier primes are
        // dropped with their buffers
        self.x_share = Scalar::ZERO;
        self.paillier.secret = None;
    }
}

impl Keypair {
    pub(crate) fn new(
        kind: ShareKind,
        scheme: Scheme,
        curve: Curve,
        key_id: KeyId,
        q: ProjectivePoint,
        x_share: Scalar,
        c_key: BigInt,
        paillier: PaillierMaterial,
    ) -> Self {
        Self {
            kind,
            scheme,
            curve,
            key_id,
            q,
            x_share,
            c_key,
            paillier,
        }
    }

    pub fn kind(&self) -> ShareKind {
        self.kind
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    pub fn curve(&self) -> Curve {
        self.curve
    }

    pub fn key_id(&self) -> &KeyId {
        &self.key_id
    }

    /// Joint public key, SEC1 compressed (33 bytes on secp256k1).
    /// Identical on both parties after a successful DKG or refresh.
    pub fn public_key(&self) -> Vec<u8> {
        encode_point(&self.q)
    }

    pub(crate) fn q(&self) -> &ProjectivePoint {
        &self.q
    }

    pub(crate) fn x_share(&self) -> &Scalar {
        &self.x_share
    }

    pub(crate) fn c_key(&self) -> &BigInt {
        &self.c_key
    }

    pub(crate) fn paillier(&self) -> &PaillierMaterial {
        &self.paillier
    }

    /// Serialize into the framed binary format
    pub fn to_bytes(&self) -> Result<Zeroizing<Vec<u8>>> {
        let mut w = Writer::new();
        w.put_u32(KEY_BLOB_MAGIC);
        w.put_u32(KEY_BLOB_VERSION);
        w.put_u32(self.scheme.code());
        w.put_u32(self.kind.code());
        w.put_fixed(self.key_id.as_bytes());
        w.put_u32(self.curve.code());
        w.put_bytes(&encode_point(&self.q));
        w.put_bytes(&encode_scalar(&self.x_share));
        w.put_bytes(&self.c_key.to_bytes());
        match &self.paillier.secret {
            Some(secret) => {
                w.put_u8(1);
                w.put_bytes(&self.paillier.ek.n.to_bytes());
                w.put_bytes(&secret.p.to_bytes());
                w.put_bytes(&secret.q.to_bytes());
            }
            None => {
                w.put_u8(0);
                w.put_bytes(&self.paillier.ek.n.to_bytes());
            }
        }
        Ok(Zeroizing::new(w.into_bytes()))
    }

    /// Parse a previously exported blob
    pub fn from_bytes(blob: &[u8]) -> Result<Self> {
        let mut r = Reader::new(blob);
        let magic = r.u32()?;
        let version = r.u32()?;
        if magic != KEY_BLOB_MAGIC || version != KEY_BLOB_VERSION {
            return Err(Error::InvalidArgument(
                "unsupported key blob magic or version".into(),
            ));
        }
        let scheme = Scheme::from_code(r.u32()?)?;
        let kind = ShareKind::from_code(r.u32()?)?;
        let mut key_id = KeyId::default();
        key_id.0.copy_from_slice(r.fixed(32)?);
        let curve = Curve::from_code(r.u32()?)?;

        let q = decode_point(r.bytes()?)?;
        let x_bytes = r.bytes()?;
        let x_arr: [u8; 32] = x_bytes
            .try_into()
            .map_err(|_| Error::InvalidArgument("bad share scalar length".into()))?;
        let x_share = scalar_from_bytes(&x_arr);
        let c_key = BigInt::from_bytes(r.bytes()?);

        let has_dk = r.u8()?;
        let paillier = match has_dk {
            1 => {
                let n = BigInt::from_bytes(r.bytes()?);
                let p = BigInt::from_bytes(r.bytes()?);
                let q_prime = BigInt::from_bytes(r.bytes()?);
                let material = PaillierMaterial::from_primes(p, q_prime)?;
                if material.ek.n != n {
                    return Err(Error::InvalidArgument(
                        "paillier modulus does not match primes".into(),
                    ));
                }
                material
            }
            0 => PaillierMaterial::from_modulus(BigInt::from_bytes(r.bytes()?))
                .map_err(|_| Error::InvalidArgument("paillier modulus too small".into()))?,
            _ => return Err(Error::InvalidArgument("bad paillier flag".into())),
        };
        r.finish()?;

        // the decryption key travels with the device share and only there
        let device_has_dk = paillier.secret.is_some();
        match kind {
            ShareKind::Device if !device_has_dk => {
                return Err(Error::InvalidArgument(
                    "device share without paillier secret".into(),
                ))
            }
            ShareKind::Server if device_has_dk => {
                return Err(Error::InvalidArgument(
                    "server share carrying paillier secret".into(),
                ))
            }
            _ => {}
        }
        paillier.check_ciphertext(&c_key).map_err(|_| {
            Error::InvalidArgument("key ciphertext outside paillier range".into())
        })?;

        Ok(Self {
            kind,
            scheme,
            curve,
            key_id,
            q,
            x_share,
            c_key,
            paillier,
        })
    }
}

impl std::fmt::Debug for Keypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keypair")
            .field("kind", &self.kind)
            .field("scheme", &self.scheme)
            .field("curve", &self.curve)
            .field("public_key", &hex::encode(self.public_key()))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k256::elliptic_curve::Field;
    use rand::rngs::OsRng;
    use std::sync::OnceLock;

    fn device_material() -> &'static PaillierMaterial {
        static MATERIAL: OnceLock<PaillierMaterial> = OnceLock::new();
        MATERIAL.get_or_init(PaillierMaterial::generate)
    }

    fn sample_keypair(kind: ShareKind) -> Keypair {
        let x = Scalar::random(&mut OsRng);
        let q = ProjectivePoint::GENERATOR * Scalar::random(&mut OsRng);
        let material = device_material().clone();
        let c_key = material.encrypt(&crate::crypto::paillier::scalar_to_bigint(&x));
        let material = match kind {
            ShareKind::Device => material,
            ShareKind::Server => {
                PaillierMaterial::from_modulus(material.modulus().clone()).unwrap()
            }
        };
        Keypair::new(
            kind,
            Scheme::Ecdsa2p,
            Curve::Secp256k1,
            KeyId([7u8; 32]),
            q,
            x,
            c_key,
            material,
        )
    }

    #[test]
    fn export_import_round_trip() {
        for kind in [ShareKind::Device, ShareKind::Server] {
            let kp = sample_keypair(kind);
            let blob = kp.to_bytes().unwrap();
            let restored = Keypair::from_bytes(&blob).unwrap();
            assert_eq!(restored.kind(), kp.kind());
            assert_eq!(restored.scheme(), kp.scheme());
            assert_eq!(restored.curve(), kp.curve());
            assert_eq!(restored.key_id(), kp.key_id());
            assert_eq!(restored.public_key(), kp.public_key());
            assert_eq!(restored.x_share(), kp.x_share());
            assert_eq!(restored.c_key(), kp.c_key());
        }
    }

    #[test]
    fn bad_magic_is_rejected() {
        let kp = sample_keypair(ShareKind::Server);
        let mut blob = kp.to_bytes().unwrap().to_vec();
        blob[0] ^= 0xFF;
        let err = Keypair::from_bytes(&blob).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn bad_version_is_rejected() {
        let kp = sample_keypair(ShareKind::Server);
        let mut blob = kp.to_bytes().unwrap().to_vec();
        blob[4] = 9;
        assert!(Keypair::from_bytes(&blob).is_err());
    }

    #[test]
    fn unknown_enum_codes_are_rejected() {
        let kp = sample_keypair(ShareKind::Server);
        let mut blob = kp.to_bytes().unwrap().to_vec();
        blob[8] = 77; // scheme field
        assert!(Keypair::from_bytes(&blob).is_err());
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let kp = sample_keypair(ShareKind::Server);
        let mut blob = kp.to_bytes().unwrap().to_vec();
        blob.push(0);
        assert!(Keypair::from_bytes(&blob).is_err());
    }

    #[test]
    fn corrupted_point_is_rejected() {
        let kp = sample_keypair(ShareKind::Server);
        let mut blob = kp.to_bytes().unwrap().to_vec();
        // SEC1 tag of Q: 4 header words + key_id + curve word + length prefix
        blob[56] = 0x09;
        assert!(Keypair::from_bytes(&blob).is_err());
    }
}
