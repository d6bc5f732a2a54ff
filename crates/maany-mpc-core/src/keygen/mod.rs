//! Distributed key generation and share refresh
//!
//! Both flows share the same session shape: a worker runs the blocking
//! protocol routine, the host pumps it with `step`, and `finalize` yields
//! the resulting local share.

mod dkg;
mod messages;
mod refresh;

pub use dkg::run_dkg;
pub use messages::*;
pub use refresh::run_refresh;

use crate::context::{Context, LogLevel};
use crate::error::{Error, Result};
use crate::keypair::Keypair;
use crate::session::Session;
use crate::types::{Curve, DkgOptions, RefreshOptions, Scheme, StepState};

/// A key generation (or refresh) session in flight
pub struct DkgSession {
    inner: Session<Keypair>,
}

impl DkgSession {
    /// Advance the protocol with an optional inbound peer message
    pub fn step(&mut self, inbound: Option<&[u8]>) -> Result<(StepState, Option<Vec<u8>>)> {
        self.inner.step(inbound)
    }

    /// Materialize the local share; the session is spent afterwards
    pub fn finalize(&mut self) -> Result<Keypair> {
        self.inner.take_result()
    }
}

fn check_supported(curve: Curve, scheme: Scheme) -> Result<()> {
    match curve {
        Curve::Secp256k1 => {}
        Curve::Ed25519 => {
            return Err(Error::Unsupported("ed25519 is not yet implemented".into()))
        }
    }
    match scheme {
        Scheme::Ecdsa2p => Ok(()),
        Scheme::EcdsaTn => Err(Error::Unsupported(
            "t-of-n ECDSA is not yet implemented".into(),
        )),
        Scheme::Schnorr2p => Err(Error::Unsupported(
            "two-party Schnorr is not yet implemented".into(),
        )),
    }
}

pub(crate) fn spawn_dkg(ctx: Context, opts: DkgOptions) -> Result<DkgSession> {
    check_supported(opts.curve, opts.scheme)?;
    ctx.log(LogLevel::Info, "dkg session created");
    let worker_ctx = ctx.clone();
    let inner = Session::spawn("maany-dkg", move |channel| {
        run_dkg(channel, &worker_ctx, &opts)
    })?;
    Ok(DkgSession { inner })
}

pub(crate) fn spawn_refresh(
    ctx: Context,
    keypair: Keypair,
    opts: RefreshOptions,
) -> Result<DkgSession> {
    check_supported(keypair.curve(), keypair.scheme())?;
    ctx.log(LogLevel::Info, "refresh session created");
    let worker_ctx = ctx.clone();
    let inner = Session::spawn("maany-refresh", move |channel| {
        run_refresh(channel, &worker_ctx, &keypair, &opts)
    })?;
    Ok(DkgSession { inner })
}
