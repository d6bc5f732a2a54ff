//! # maany-mpc-core
//!
//! Two-party threshold ECDSA engine over secp256k1. A device and a server
//! jointly generate a key without either ever holding the full signing
//! scalar, then cooperate on every signature.
//!
//! The engine exposes three flows with one driving contract:
//! - **DKG**: distributed key generation,
//! - **Sign**: two-party signing (only the device receives the signature),
//! - **Refresh**: share re-randomization that preserves the joint key.
//!
//! Protocols run on a private worker per session; the host pumps each
//! session one message at a time:
//!
//! ```rust,ignore
//! use maany_mpc_core::{Context, DkgOptions};
//!
//! let ctx = Context::default();
//! let mut session = ctx.dkg(opts)?;
//! loop {
//!     let (state, outbound) = session.step(inbound.as_deref())?;
//!     // ship `outbound` to the peer, stop once both sides are Done
//! }
//! let keypair = session.finalize()?;
//! ```
//!
//! Local shares serialize through a deterministic binary codec and can be
//! sealed into t-of-n threshold backups (Shamir over the curve's scalar
//! field plus AES-256-GCM).

pub mod backup;
pub mod codec;
pub mod context;
pub mod crypto;
pub mod error;
pub mod keygen;
pub mod keypair;
pub mod mpc;
pub mod session;
pub mod shamir;
pub mod sign;
pub mod signature;
pub mod types;

pub use backup::{BackupCiphertext, BackupShare};
pub use context::{Context, InitOptions, LogCallback, LogLevel, RngCallback, VERSION};
pub use error::{error_string, Error, ErrorKind, Result};
pub use keygen::DkgSession;
pub use keypair::Keypair;
pub use sign::SignSession;
pub use types::{
    Curve, DkgOptions, KeyId, RefreshOptions, Scheme, ShareKind, SigFormat, SignOptions,
    StepState,
};
