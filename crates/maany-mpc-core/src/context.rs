//! Process-wide context
//!
//! The context owns the injected callbacks (RNG, host logger) and is the
//! factory for every session and keypair operation. Handles keep a clone of
//! the context, so its lifetime always contains theirs.

use std::fmt;
use std::sync::Arc;

use k256::elliptic_curve::Field;
use k256::Scalar;
use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::Zeroizing;

use crate::backup::{self, BackupCiphertext, BackupShare};
use crate::crypto;
use crate::error::{Error, Result};
use crate::keygen::{self, DkgSession};
use crate::keypair::Keypair;
use crate::sign::{self, SignSession};
use crate::types::{DkgOptions, RefreshOptions, SignOptions};

/// ABI version of the engine
pub const VERSION: (u32, u32, u32) = (1, 0, 0);

/// Severity for the optional host logger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Error = 0,
    Warn = 1,
    Info = 2,
    Debug = 3,
}

/// Injected randomness source: fill the buffer, return 0 on success
pub type RngCallback = Arc<dyn Fn(&mut [u8]) -> i32 + Send + Sync>;

/// Host log sink
pub type LogCallback = Arc<dyn Fn(LogLevel, &str) + Send + Sync>;

/// Optional injections applied at context creation
#[derive(Default, Clone)]
pub struct InitOptions {
    pub rng: Option<RngCallback>,
    pub logger: Option<LogCallback>,
}

pub(crate) struct ContextInner {
    rng: Option<RngCallback>,
    logger: Option<LogCallback>,
}

/// Process-wide handle issuing sessions and keypairs
#[derive(Clone)]
pub struct Context {
    inner: Arc<ContextInner>,
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("injected_rng", &self.inner.rng.is_some())
            .field("injected_logger", &self.inner.logger.is_some())
            .finish()
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new(InitOptions::default())
    }
}

impl Context {
    pub fn new(opts: InitOptions) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                rng: opts.rng,
                logger: opts.logger,
            }),
        }
    }

    /// Fill `out` from the injected RNG, or the OS RNG when none was given
    pub fn fill_random(&self, out: &mut [u8]) -> Result<()> {
        match &self.inner.rng {
            Some(cb) => {
                let rc = cb(out);
                if rc != 0 {
                    return Err(Error::Rng(format!("injected rng returned {rc}")));
                }
                Ok(())
            }
            None => {
                OsRng
                    .try_fill_bytes(out)
                    .map_err(|e| Error::Rng(format!("os rng: {e}")))?;
                Ok(())
            }
        }
    }

    pub(crate) fn random_scalar(&self) -> Result<Scalar> {
        let mut bytes = Zeroizing::new([0u8; 32]);
        self.fill_random(bytes.as_mut())?;
        Ok(crypto::scalar_from_bytes(&bytes))
    }

    /// A uniformly random scalar that is guaranteed invertible
    pub(crate) fn random_nonzero_scalar(&self) -> Result<Scalar> {
        loop {
            let scalar = self.random_scalar()?;
            if !bool::from(scalar.is_zero()) {
                return Ok(scalar);
            }
        }
    }

    pub(crate) fn log(&self, level: LogLevel, msg: &str) {
        if let Some(logger) = &self.inner.logger {
            logger(level, msg);
        }
    }

    /// Create a DKG session; drive it with `step`, then `finalize`
    pub fn dkg(&self, opts: DkgOptions) -> Result<DkgSession> {
        keygen::spawn_dkg(self.clone(), opts)
    }

    /// Create a refresh session over an existing share; same driving
    /// contract as DKG, finalize yields the re-randomized share
    pub fn refresh(&self, keypair: &Keypair, opts: RefreshOptions) -> Result<DkgSession> {
        keygen::spawn_refresh(self.clone(), keypair.clone(), opts)
    }

    /// Create a signing session; `set_message` must be called before the
    /// worker can progress past its first wait
    pub fn sign(&self, keypair: &Keypair, opts: SignOptions) -> Result<SignSession> {
        sign::spawn_sign(self.clone(), keypair.clone(), opts)
    }

    /// Serialize a local share into the framed binary format
    pub fn export_keypair(&self, keypair: &Keypair) -> Result<Zeroizing<Vec<u8>>> {
        keypair.to_bytes()
    }

    /// Import a previously exported share
    pub fn import_keypair(&self, blob: &[u8]) -> Result<Keypair> {
        Keypair::from_bytes(blob)
    }

    /// Threshold-encrypt an exported share; see [`backup`]
    pub fn backup_create(
        &self,
        keypair: &Keypair,
        threshold: u16,
        share_count: u16,
        label: &[u8],
    ) -> Result<(BackupCiphertext, Vec<BackupShare>)> {
        backup::create(self, keypair, threshold, share_count, label)
    }

    /// Recover a share from a backup ciphertext and enough shares
    pub fn backup_restore(
        &self,
        ciphertext: &BackupCiphertext,
        shares: &[BackupShare],
    ) -> Result<Keypair> {
        backup::restore(self, ciphertext, shares)
    }
}
