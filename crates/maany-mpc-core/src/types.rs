//! Core types shared across the engine

use crate::error::{Error, Result};

/// Which side of the two-party protocol a local share belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShareKind {
    /// The party that initiates every flow and receives the signature
    Device,
    /// The responding party
    Server,
}

impl ShareKind {
    pub fn code(self) -> u32 {
        match self {
            ShareKind::Device => 0,
            ShareKind::Server => 1,
        }
    }

    pub fn from_code(code: u32) -> Result<Self> {
        match code {
            0 => Ok(ShareKind::Device),
            1 => Ok(ShareKind::Server),
            other => Err(Error::InvalidArgument(format!(
                "unknown share kind {other}"
            ))),
        }
    }
}

/// Elliptic curve of a local share
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Curve {
    Secp256k1,
    /// Reserved
    Ed25519,
}

impl Curve {
    pub fn code(self) -> u32 {
        match self {
            Curve::Secp256k1 => 0,
            Curve::Ed25519 => 1,
        }
    }

    pub fn from_code(code: u32) -> Result<Self> {
        match code {
            0 => Ok(Curve::Secp256k1),
            1 => Ok(Curve::Ed25519),
            other => Err(Error::InvalidArgument(format!("unknown curve {other}"))),
        }
    }
}

/// Signature scheme of a local share
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    /// 2-of-2 ECDSA
    Ecdsa2p,
    /// Reserved: t-of-n ECDSA
    EcdsaTn,
    /// Reserved
    Schnorr2p,
}

impl Scheme {
    pub fn code(self) -> u32 {
        match self {
            Scheme::Ecdsa2p => 0,
            Scheme::EcdsaTn => 1,
            Scheme::Schnorr2p => 2,
        }
    }

    pub fn from_code(code: u32) -> Result<Self> {
        match code {
            0 => Ok(Scheme::Ecdsa2p),
            1 => Ok(Scheme::EcdsaTn),
            2 => Ok(Scheme::Schnorr2p),
            other => Err(Error::InvalidArgument(format!("unknown scheme {other}"))),
        }
    }
}

/// Requested encoding of a finalized signature
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigFormat {
    /// Canonical ASN.1 DER
    Der,
    /// Fixed-width big-endian r ‖ s (64 bytes on secp256k1)
    RawRs,
}

impl SigFormat {
    pub fn code(self) -> u32 {
        match self {
            SigFormat::Der => 0,
            SigFormat::RawRs => 1,
        }
    }

    pub fn from_code(code: u32) -> Result<Self> {
        match code {
            0 => Ok(SigFormat::Der),
            1 => Ok(SigFormat::RawRs),
            other => Err(Error::InvalidArgument(format!(
                "unknown signature format {other}"
            ))),
        }
    }
}

/// Result of advancing a session by one step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepState {
    /// The session needs more input or has output pending
    Continue,
    /// The protocol routine has returned successfully
    Done,
}

impl StepState {
    pub fn code(self) -> u32 {
        match self {
            StepState::Continue => 0,
            StepState::Done => 1,
        }
    }
}

/// Application-supplied 32-byte key identifier; all-zero when unset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KeyId(pub [u8; 32]);

impl KeyId {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn is_unset(&self) -> bool {
        self.0 == [0u8; 32]
    }
}

/// Options for creating a DKG session
#[derive(Debug, Clone)]
pub struct DkgOptions {
    pub curve: Curve,
    pub scheme: Scheme,
    pub kind: ShareKind,
    /// Optional identifier baked into the resulting share's metadata
    pub key_id: KeyId,
    /// Optional session identifier bound into the transcript; empty = unbound
    pub session_id: Vec<u8>,
}

/// Options for creating a signing session
#[derive(Debug, Clone)]
pub struct SignOptions {
    pub scheme: Scheme,
    /// Optional session identifier bound into the transcript; empty = unbound
    pub session_id: Vec<u8>,
    /// Optional additional associated data bound into the transcript
    pub extra_aad: Vec<u8>,
}

impl Default for SignOptions {
    fn default() -> Self {
        Self {
            scheme: Scheme::Ecdsa2p,
            session_id: Vec::new(),
            extra_aad: Vec::new(),
        }
    }
}

/// Options for creating a refresh session
#[derive(Debug, Clone, Default)]
pub struct RefreshOptions {
    /// Optional session identifier bound into the transcript; empty = unbound
    pub session_id: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enum_codes_round_trip() {
        assert_eq!(ShareKind::from_code(0).unwrap(), ShareKind::Device);
        assert_eq!(ShareKind::from_code(1).unwrap(), ShareKind::Server);
        assert!(ShareKind::from_code(2).is_err());

        assert_eq!(Curve::from_code(0).unwrap(), Curve::Secp256k1);
        assert_eq!(Curve::from_code(1).unwrap(), Curve::Ed25519);
        assert!(Curve::from_code(9).is_err());

        assert_eq!(Scheme::from_code(2).unwrap(), Scheme::Schnorr2p);
        assert!(Scheme::from_code(3).is_err());

        assert_eq!(SigFormat::from_code(1).unwrap(), SigFormat::RawRs);
        assert!(SigFormat::from_code(2).is_err());
    }

    #[test]
    fn key_id_default_is_unset() {
        assert!(KeyId::default().is_unset());
        assert!(!KeyId([1u8; 32]).is_unset());
    }
}
