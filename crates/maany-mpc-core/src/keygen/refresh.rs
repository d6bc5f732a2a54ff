//! Share refresh
//!
//! Re-randomizes both secret shares and the device's Paillier material
//! while keeping the joint public key and key id. The offset is the sum of
//! one contribution per party; the device commits to its contribution
//! before seeing the server's, so neither side controls the result. A share
//! that skipped a refresh no longer sums with its counterpart and fails at
//! the next signing attempt.

use curv::arithmetic::Converter;
use curv::BigInt;
use k256::elliptic_curve::Field;
use k256::ProjectivePoint;
use tracing::{debug, info, instrument};

use super::messages::{RefreshMsg1, RefreshMsg2, RefreshMsg3, RefreshMsg4};
use crate::context::Context;
use crate::crypto::paillier::{scalar_to_bigint, PaillierMaterial};
use crate::crypto::{decode_point, encode_point, encode_scalar, scalar_from_bytes, sha256};
use crate::error::{Error, Result};
use crate::keypair::Keypair;
use crate::mpc::{recv_msg, send_msg, transcript_key, Transport};
use crate::types::{RefreshOptions, ShareKind};

const TRANSCRIPT_LABEL: &str = "maany-mpc/refresh/v1";
const CONFIRM_DOMAIN: &[u8] = b"refresh-confirm";

fn confirm_digest(transcript: &[u8; 32], q: &ProjectivePoint) -> [u8; 32] {
    sha256(&[transcript, CONFIRM_DOMAIN, &encode_point(q)])
}

/// Run a refresh over an established transport, as the party owning
/// `keypair`
#[instrument(skip(transport, ctx, keypair))]
pub fn run_refresh<T: Transport + ?Sized>(
    transport: &T,
    ctx: &Context,
    keypair: &Keypair,
    opts: &RefreshOptions,
) -> Result<Keypair> {
    let transcript = transcript_key(TRANSCRIPT_LABEL, &opts.session_id);
    let refreshed = match keypair.kind() {
        ShareKind::Device => run_device(transport, ctx, keypair, &transcript),
        ShareKind::Server => run_server(transport, ctx, keypair, &transcript),
    }?;
    info!(
        kind = ?keypair.kind(),
        public_key = hex::encode(refreshed.public_key()),
        "refresh completed"
    );
    Ok(refreshed)
}

fn run_device<T: Transport + ?Sized>(
    transport: &T,
    ctx: &Context,
    keypair: &Keypair,
    transcript: &[u8; 32],
) -> Result<Keypair> {
    let delta1 = ctx.random_scalar()?;
    let delta1_bytes = encode_scalar(&delta1);
    let mut blind = [0u8; 32];
    ctx.fill_random(&mut blind)?;

    debug!("refresh round 1: commit to offset contribution");
    send_msg(
        transport,
        &RefreshMsg1 {
            commitment: sha256(&[transcript, &delta1_bytes, &blind]),
        },
    )?;

    let msg2: RefreshMsg2 = recv_msg(transport)?;
    let delta = delta1 + scalar_from_bytes(&msg2.delta2);

    let x1 = *keypair.x_share() + delta;
    if bool::from(x1.is_zero()) {
        return Err(Error::Crypto("degenerate refreshed share".into()));
    }

    debug!("refresh round 3: open offset, bind fresh paillier key");
    let paillier = PaillierMaterial::generate();
    let c_key = paillier.encrypt(&scalar_to_bigint(&x1));
    send_msg(
        transport,
        &RefreshMsg3 {
            delta1: delta1_bytes,
            blind,
            q1: encode_point(&(ProjectivePoint::GENERATOR * x1)),
            paillier_n: paillier.modulus().to_bytes(),
            c_key: c_key.to_bytes(),
        },
    )?;

    let msg4: RefreshMsg4 = recv_msg(transport)?;
    if msg4.confirm != confirm_digest(transcript, keypair.q()) {
        return Err(Error::Crypto("peer failed to confirm the joint key".into()));
    }

    Ok(Keypair::new(
        ShareKind::Device,
        keypair.scheme(),
        keypair.curve(),
        *keypair.key_id(),
        *keypair.q(),
        x1,
        c_key,
        paillier,
    ))
}

fn run_server<T: Transport + ?Sized>(
    transport: &T,
    ctx: &Context,
    keypair: &Keypair,
    transcript: &[u8; 32],
) -> Result<Keypair> {
    let msg1: RefreshMsg1 = recv_msg(transport)?;

    let delta2 = ctx.random_scalar()?;
    debug!("refresh round 2: send offset contribution");
    send_msg(
        transport,
        &RefreshMsg2 {
            delta2: encode_scalar(&delta2),
        },
    )?;

    let msg3: RefreshMsg3 = recv_msg(transport)?;
    if sha256(&[transcript, &msg3.delta1, &msg3.blind]) != msg1.commitment {
        return Err(Error::Crypto("commitment opening mismatch".into()));
    }

    let delta = scalar_from_bytes(&msg3.delta1) + delta2;
    let x2 = *keypair.x_share() - delta;
    if bool::from(x2.is_zero()) {
        return Err(Error::Crypto("degenerate refreshed share".into()));
    }

    // the new shares must still assemble the old joint key
    let q1 = decode_point(&msg3.q1)?;
    if q1 + ProjectivePoint::GENERATOR * x2 != *keypair.q() {
        return Err(Error::Crypto("refresh would change the joint key".into()));
    }

    let paillier = PaillierMaterial::from_modulus(BigInt::from_bytes(&msg3.paillier_n))?;
    let c_key = BigInt::from_bytes(&msg3.c_key);
    paillier.check_ciphertext(&c_key)?;

    debug!("refresh round 4: confirm joint key");
    send_msg(
        transport,
        &RefreshMsg4 {
            confirm: confirm_digest(transcript, keypair.q()),
        },
    )?;

    Ok(Keypair::new(
        ShareKind::Server,
        keypair.scheme(),
        keypair.curve(),
        *keypair.key_id(),
        *keypair.q(),
        x2,
        c_key,
        paillier,
    ))
}
