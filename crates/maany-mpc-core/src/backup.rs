//! Threshold-encrypted share backup
//!
//! An exported local share is sealed under a fresh data-encryption key with
//! AES-256-GCM; the DEK is then Shamir-split so that any `t` of `n`
//! custodians can restore. All backup metadata rides in the AEAD associated
//! data, so a ciphertext cannot be combined with shares or metadata from a
//! different backup.

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Nonce};
use tracing::{debug, instrument};
use zeroize::Zeroizing;

use crate::codec::{Reader, Writer};
use crate::context::Context;
use crate::crypto::{encode_scalar, scalar_from_bytes};
use crate::error::{Error, Result};
use crate::keypair::Keypair;
use crate::shamir::{self, Share};
use crate::types::{Curve, KeyId, Scheme, ShareKind};

const BACKUP_MAGIC: u32 = 0x4D50_4342; // "MPCB"
const BACKUP_VERSION: u32 = 1;

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;
/// index(u16) ‖ scalar(32)
const SHARE_LEN: usize = 34;

/// Sealed backup of one local share plus the metadata bound into its
/// associated data
#[derive(Debug, Clone)]
pub struct BackupCiphertext {
    pub kind: ShareKind,
    pub curve: Curve,
    pub scheme: Scheme,
    pub key_id: KeyId,
    pub threshold: u16,
    pub share_count: u16,
    pub label: Vec<u8>,
    /// nonce ‖ tag ‖ ciphertext
    pub blob: Vec<u8>,
}

/// One opaque custodian share of the data-encryption key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupShare(Vec<u8>);

impl BackupShare {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    fn to_share(&self) -> Result<Share> {
        if self.0.len() != SHARE_LEN {
            return Err(Error::InvalidArgument(format!(
                "backup share must be {SHARE_LEN} bytes, got {}",
                self.0.len()
            )));
        }
        let index = u16::from_le_bytes([self.0[0], self.0[1]]);
        if index == 0 {
            return Err(Error::InvalidArgument("backup share index zero".into()));
        }
        let mut value = [0u8; 32];
        value.copy_from_slice(&self.0[2..]);
        Ok(Share {
            index,
            value: scalar_from_bytes(&value),
        })
    }

    fn from_share(share: &Share) -> Self {
        let mut bytes = Vec::with_capacity(SHARE_LEN);
        bytes.extend_from_slice(&share.index.to_le_bytes());
        bytes.extend_from_slice(&encode_scalar(&share.value));
        Self(bytes)
    }
}

impl BackupCiphertext {
    /// Canonical associated data: label ‖ key_id ‖ kind ‖ curve ‖ scheme ‖ t ‖ n
    fn associated_data(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.put_bytes(&self.label);
        w.put_fixed(self.key_id.as_bytes());
        w.put_u32(self.kind.code());
        w.put_u32(self.curve.code());
        w.put_u32(self.scheme.code());
        w.put_u16(self.threshold);
        w.put_u16(self.share_count);
        w.into_bytes()
    }

    /// Framed encoding, for carrying the ciphertext across a flat API
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.put_u32(BACKUP_MAGIC);
        w.put_u32(BACKUP_VERSION);
        w.put_u32(self.kind.code());
        w.put_u32(self.curve.code());
        w.put_u32(self.scheme.code());
        w.put_fixed(self.key_id.as_bytes());
        w.put_u16(self.threshold);
        w.put_u16(self.share_count);
        w.put_bytes(&self.label);
        w.put_bytes(&self.blob);
        w.into_bytes()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut r = Reader::new(bytes);
        let magic = r.u32()?;
        let version = r.u32()?;
        if magic != BACKUP_MAGIC || version != BACKUP_VERSION {
            return Err(Error::InvalidArgument(
                "unsupported backup magic or version".into(),
            ));
        }
        let kind = ShareKind::from_code(r.u32()?)?;
        let curve = Curve::from_code(r.u32()?)?;
        let scheme = Scheme::from_code(r.u32()?)?;
        let mut key_id = KeyId::default();
        key_id.0.copy_from_slice(r.fixed(32)?);
        let threshold = r.u16()?;
        let share_count = r.u16()?;
        let label = r.bytes()?.to_vec();
        let blob = r.bytes()?.to_vec();
        r.finish()?;
        if threshold == 0 || threshold > share_count {
            return Err(Error::InvalidArgument("invalid backup threshold".into()));
        }
        Ok(Self {
            kind,
            curve,
            scheme,
            key_id,
            threshold,
            share_count,
            label,
            blob,
        })
    }
}

/// Seal `keypair` into a ciphertext plus `share_count` custodian shares,
/// any `threshold` of which suffice to restore
#[instrument(skip(ctx, keypair, label))]
pub fn create(
    ctx: &Context,
    keypair: &Keypair,
    threshold: u16,
    share_count: u16,
    label: &[u8],
) -> Result<(BackupCiphertext, Vec<BackupShare>)> {
    if threshold == 0 || share_count == 0 || threshold > share_count {
        return Err(Error::InvalidArgument(format!(
            "invalid backup parameters: {threshold}-of-{share_count}"
        )));
    }

    let plaintext = keypair.to_bytes()?;

    // the DEK is sampled as a scalar so its Shamir shares live in the same
    // field as everything else in this crate
    let dek = ctx.random_scalar()?;
    let dek_bytes = Zeroizing::new(encode_scalar(&dek));

    let mut ciphertext = BackupCiphertext {
        kind: keypair.kind(),
        curve: keypair.curve(),
        scheme: keypair.scheme(),
        key_id: *keypair.key_id(),
        threshold,
        share_count,
        label: label.to_vec(),
        blob: Vec::new(),
    };

    let mut nonce = [0u8; NONCE_LEN];
    ctx.fill_random(&mut nonce)?;

    let cipher = Aes256Gcm::new_from_slice(dek_bytes.as_ref())
        .map_err(|e| Error::Crypto(format!("aead key setup: {e}")))?;
    let sealed = cipher
        .encrypt(
            Nonce::from_slice(&nonce),
            Payload {
                msg: &plaintext,
                aad: &ciphertext.associated_data(),
            },
        )
        .map_err(|_| Error::Crypto("backup encryption failed".into()))?;

    // aes-gcm appends the tag; the stored layout is nonce ‖ tag ‖ ciphertext
    let split_at = sealed.len() - TAG_LEN;
    let mut blob = Vec::with_capacity(NONCE_LEN + sealed.len());
    blob.extend_from_slice(&nonce);
    blob.extend_from_slice(&sealed[split_at..]);
    blob.extend_from_slice(&sealed[..split_at]);
    ciphertext.blob = blob;

    let shares = shamir::split(ctx, &dek, threshold, share_count)?
        .iter()
        .map(BackupShare::from_share)
        .collect();

    debug!("backup sealed");
    Ok((ciphertext, shares))
}

/// Restore a keypair from a ciphertext and at least `threshold` shares
#[instrument(skip_all)]
pub fn restore(
    _ctx: &Context,
    ciphertext: &BackupCiphertext,
    shares: &[BackupShare],
) -> Result<Keypair> {
    if shares.len() < ciphertext.threshold as usize {
        return Err(Error::InvalidArgument(format!(
            "{} shares provided, {} required",
            shares.len(),
            ciphertext.threshold
        )));
    }
    if ciphertext.blob.len() < NONCE_LEN + TAG_LEN {
        return Err(Error::InvalidArgument("backup blob too short".into()));
    }

    let decoded: Vec<Share> = shares
        .iter()
        .take(ciphertext.threshold as usize)
        .map(BackupShare::to_share)
        .collect::<Result<_>>()?;
    let dek = shamir::reconstruct(&decoded)?;
    let dek_bytes = Zeroizing::new(encode_scalar(&dek));

    let (nonce, rest) = ciphertext.blob.split_at(NONCE_LEN);
    let (tag, body) = rest.split_at(TAG_LEN);
    let mut sealed = Vec::with_capacity(rest.len());
    sealed.extend_from_slice(body);
    sealed.extend_from_slice(tag);

    let cipher = Aes256Gcm::new_from_slice(dek_bytes.as_ref())
        .map_err(|e| Error::Crypto(format!("aead key setup: {e}")))?;
    let plaintext = Zeroizing::new(
        cipher
            .decrypt(
                Nonce::from_slice(nonce),
                Payload {
                    msg: &sealed,
                    aad: &ciphertext.associated_data(),
                },
            )
            .map_err(|_| Error::Crypto("backup authentication failed".into()))?,
    );

    let keypair = Keypair::from_bytes(&plaintext)?;
    debug!("backup restored");
    Ok(keypair)
}
