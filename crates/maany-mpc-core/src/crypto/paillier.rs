//! Paillier adapter
//!
//! Wraps the `paillier` crate behind the handful of calls the protocol
//! drivers make: keypair generation, encryption of a curve scalar,
//! homomorphic add / plaintext-mul, and decryption back into a scalar.

use std::sync::OnceLock;

use curv::arithmetic::{BitManipulation, Converter, Zero};
use curv::BigInt;
use k256::elliptic_curve::Field;
use k256::Scalar;
use paillier::{
    Add, Decrypt, DecryptionKey, Encrypt, EncryptionKey, KeyGeneration, Keypair, Mul, Paillier,
    RawCiphertext, RawPlaintext,
};

use super::{encode_scalar, scalar_from_bytes};
use crate::error::{Error, Result};

/// Modulus size for freshly generated keys
pub const MODULUS_BITS: usize = 2048;

/// Minimum accepted modulus size for a peer-supplied encryption key.
/// Two 1024-bit primes always multiply to at least this.
pub const MIN_MODULUS_BITS: usize = 2046;

/// One party's Paillier material. Only the device ever holds the primes.
#[derive(Clone, Debug)]
pub struct PaillierMaterial {
    pub ek: EncryptionKey,
    pub secret: Option<PaillierSecret>,
}

/// The prime factorization backing a decryption key
#[derive(Clone, Debug)]
pub struct PaillierSecret {
    pub p: BigInt,
    pub q: BigInt,
    pub dk: DecryptionKey,
}

impl PaillierMaterial {
    /// Generate a fresh 2048-bit keypair
    pub fn generate() -> Self {
        let keypair = Paillier::keypair_with_modulus_size(MODULUS_BITS);
        let (ek, dk) = keypair.keys();
        Self {
            ek,
            secret: Some(PaillierSecret {
                p: keypair.p,
                q: keypair.q,
                dk,
            }),
        }
    }

    /// Public-only material from a modulus, as received from the peer
    pub fn from_modulus(n: BigInt) -> Result<Self> {
        if n.bit_length() < MIN_MODULUS_BITS {
            return Err(Error::Crypto("paillier modulus too small".into()));
        }
        let nn = &n * &n;
        Ok(Self {
            ek: EncryptionKey { n, nn },
            secret: None,
        })
    }

    /// Rebuild full material from the stored primes
    pub fn from_primes(p: BigInt, q: BigInt) -> Result<Self> {
        let keypair = Keypair { p, q };
        let (ek, dk) = keypair.keys();
        if ek.n.bit_length() < MIN_MODULUS_BITS {
            return Err(Error::InvalidArgument("paillier primes too small".into()));
        }
        Ok(Self {
            ek,
            secret: Some(PaillierSecret {
                p: keypair.p,
                q: keypair.q,
                dk,
            }),
        })
    }

    pub fn modulus(&self) -> &BigInt {
        &self.ek.n
    }

    /// A ciphertext is only meaningful in the range (0, n²)
    pub fn check_ciphertext(&self, c: &BigInt) -> Result<()> {
        if c <= &BigInt::zero() || c >= &self.ek.nn {
            return Err(Error::Crypto("paillier ciphertext out of range".into()));
        }
        Ok(())
    }

    pub fn encrypt(&self, plaintext: &BigInt) -> BigInt {
        Paillier::encrypt(&self.ek, RawPlaintext::from(plaintext.clone()))
            .0
            .into_owned()
    }

    pub fn add(&self, c1: &BigInt, c2: &BigInt) -> BigInt {
        Paillier::add(
            &self.ek,
            RawCiphertext::from(c1.clone()),
            RawCiphertext::from(c2.clone()),
        )
        .0
        .into_owned()
    }

    pub fn mul_plaintext(&self, c: &BigInt, m: &BigInt) -> BigInt {
        Paillier::mul(
            &self.ek,
            RawCiphertext::from(c.clone()),
            RawPlaintext::from(m.clone()),
        )
        .0
        .into_owned()
    }

    /// Decrypt; fails on public-only material
    pub fn decrypt(&self, c: &BigInt) -> Result<BigInt> {
        let secret = self
            .secret
            .as_ref()
            .ok_or_else(|| Error::ProtocolState("no paillier decryption key".into()))?;
        Ok(Paillier::decrypt(&secret.dk, RawCiphertext::from(c.clone()))
            .0
            .into_owned())
    }
}

/// Order of the secp256k1 scalar field as a big integer
pub fn curve_order() -> &'static BigInt {
    static ORDER: OnceLock<BigInt> = OnceLock::new();
    ORDER.get_or_init(|| BigInt::from_bytes(&encode_scalar(&(-Scalar::ONE))) + BigInt::from(1u32))
}

pub fn scalar_to_bigint(scalar: &Scalar) -> BigInt {
    BigInt::from_bytes(&encode_scalar(scalar))
}

/// Reduce an arbitrary non-negative integer into the scalar field
pub fn bigint_to_scalar(value: &BigInt) -> Scalar {
    let reduced = value % curve_order();
    let bytes = reduced.to_bytes();
    let mut buf = [0u8; 32];
    let offset = 32 - bytes.len();
    buf[offset..].copy_from_slice(&bytes);
    scalar_from_bytes(&buf)
}
