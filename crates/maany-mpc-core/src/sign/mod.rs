//! Threshold signing sessions
//!
//! A signing session is created over an existing local share, fed the
//! message exactly once, pumped with `step`, and finalized into DER or
//! raw r ‖ s bytes. Only the device share yields a signature; the server
//! side completes without one.

mod dsg;
mod messages;

pub use dsg::run_dsg;
pub use messages::*;

use zeroize::Zeroizing;

use crate::context::{Context, LogLevel};
use crate::error::{Error, Result};
use crate::keypair::Keypair;
use crate::session::Session;
use crate::types::{Curve, Scheme, SigFormat, SignOptions, StepState};

/// Terminal state of a signing worker
pub enum SignOutcome {
    /// Device side: the finished signature in both supported encodings
    Signature {
        der: Zeroizing<Vec<u8>>,
        raw: Zeroizing<Vec<u8>>,
    },
    /// Server side: the protocol completed but no signature is released
    CoSigned,
}

/// A signing session in flight
pub struct SignSession {
    inner: Session<SignOutcome>,
}

impl SignSession {
    /// Provide the message to sign. Must be called exactly once with a
    /// non-empty byte string; the worker waits for it before round 1.
    pub fn set_message(&self, message: &[u8]) -> Result<()> {
        if message.is_empty() {
            return Err(Error::InvalidArgument("sign message is empty".into()));
        }
        self.inner.set_message(message)
    }

    /// Advance the protocol with an optional inbound peer message
    pub fn step(&mut self, inbound: Option<&[u8]>) -> Result<(StepState, Option<Vec<u8>>)> {
        self.inner.step(inbound)
    }

    /// Retrieve the signature in the requested format. Idempotent; fails
    /// with ProtocolState on the server side of the protocol.
    pub fn finalize(&self, format: SigFormat) -> Result<Vec<u8>> {
        self.inner.with_result(|outcome| match outcome {
            SignOutcome::Signature { der, raw } => Ok(match format {
                SigFormat::Der => der.to_vec(),
                SigFormat::RawRs => raw.to_vec(),
            }),
            SignOutcome::CoSigned => Err(Error::ProtocolState(
                "signature is not available for this share".into(),
            )),
        })
    }
}

pub(crate) fn spawn_sign(ctx: Context, keypair: Keypair, opts: SignOptions) -> Result<SignSession> {
    if opts.scheme != Scheme::Ecdsa2p || keypair.scheme() != Scheme::Ecdsa2p {
        return Err(Error::Unsupported(
            "only two-party ECDSA signing is implemented".into(),
        ));
    }
    if keypair.curve() != Curve::Secp256k1 {
        return Err(Error::Unsupported("ed25519 is not yet implemented".into()));
    }
    ctx.log(LogLevel::Info, "sign session created");
    let worker_ctx = ctx.clone();
    let inner = Session::spawn("maany-sign", move |channel| {
        let message = channel.wait_message()?;
        run_dsg(channel, &worker_ctx, &keypair, &opts, &message)
    })?;
    Ok(SignSession { inner })
}
