//! Two-party distributed key generation
//!
//! The device speaks first. Its public share is bound by a hash commitment
//! before it sees the server's share, so neither side can steer the joint
//! key. The device's Paillier modulus and the encryption of its secret
//! share ride along in round 3; consistency proofs between that ciphertext
//! and the public share are the business of the underlying primitive tier.

use curv::arithmetic::Converter;
use curv::BigInt;
use k256::elliptic_curve::Group;
use k256::ProjectivePoint;
use tracing::{debug, info, instrument};

use super::messages::{KeygenMsg1, KeygenMsg2, KeygenMsg3, KeygenMsg4};
use crate::context::Context;
use crate::crypto::paillier::{scalar_to_bigint, PaillierMaterial};
use crate::crypto::{decode_point, encode_point, sha256};
use crate::error::{Error, Result};
use crate::keypair::Keypair;
use crate::mpc::{recv_msg, send_msg, transcript_key, Transport};
use crate::types::{DkgOptions, ShareKind};

const TRANSCRIPT_LABEL: &str = "maany-mpc/keygen/v1";
const CONFIRM_DOMAIN: &[u8] = b"confirm";

fn confirm_digest(transcript: &[u8; 32], q: &ProjectivePoint) -> [u8; 32] {
    sha256(&[transcript, CONFIRM_DOMAIN, &encode_point(q)])
}

/// Run DKG over an established transport, as one of the two parties
#[instrument(skip(transport, ctx))]
pub fn run_dkg<T: Transport + ?Sized>(
    transport: &T,
    ctx: &Context,
    opts: &DkgOptions,
) -> Result<Keypair> {
    let transcript = transcript_key(TRANSCRIPT_LABEL, &opts.session_id);
    let keypair = match opts.kind {
        ShareKind::Device => run_device(transport, ctx, opts, &transcript),
        ShareKind::Server => run_server(transport, ctx, opts, &transcript),
    }?;
    info!(
        kind = ?opts.kind,
        public_key = hex::encode(keypair.public_key()),
        "DKG completed"
    );
    Ok(keypair)
}

fn run_device<T: Transport + ?Sized>(
    transport: &T,
    ctx: &Context,
    opts: &DkgOptions,
    transcript: &[u8; 32],
) -> Result<Keypair> {
    let x1 = ctx.random_nonzero_scalar()?;
    let q1 = ProjectivePoint::GENERATOR * x1;
    let q1_bytes = encode_point(&q1);

    let mut blind = [0u8; 32];
    ctx.fill_random(&mut blind)?;
    let commitment = sha256(&[transcript, &q1_bytes, &blind]);

    debug!("keygen round 1: commit to public share");
    send_msg(transport, &KeygenMsg1 { commitment })?;

    let msg2: KeygenMsg2 = recv_msg(transport)?;
    let q2 = decode_point(&msg2.q2)?;
    let q = q1 + q2;
    if bool::from(q.is_identity()) {
        return Err(Error::Crypto("joint public key is the identity".into()));
    }

    debug!("keygen round 3: open commitment, bind paillier key");
    let paillier = PaillierMaterial::generate();
    let c_key = paillier.encrypt(&scalar_to_bigint(&x1));
    send_msg(
        transport,
        &KeygenMsg3 {
            q1: q1_bytes,
            blind,
            paillier_n: paillier.modulus().to_bytes(),
            c_key: c_key.to_bytes(),
        },
    )?;

    let msg4: KeygenMsg4 = recv_msg(transport)?;
    if msg4.confirm != confirm_digest(transcript, &q) {
        return Err(Error::Crypto("peer derived a different joint key".into()));
    }

    Ok(Keypair::new(
        ShareKind::Device,
        opts.scheme,
        opts.curve,
        opts.key_id,
        q,
        x1,
        c_key,
        paillier,
    ))
}

fn run_server<T: Transport + ?Sized>(
    transport: &T,
    ctx: &Context,
    opts: &DkgOptions,
    transcript: &[u8; 32],
) -> Result<Keypair> {
    let msg1: KeygenMsg1 = recv_msg(transport)?;

    let x2 = ctx.random_nonzero_scalar()?;
    let q2 = ProjectivePoint::GENERATOR * x2;
    debug!("keygen round 2: send public share");
    send_msg(
        transport,
        &KeygenMsg2 {
            q2: encode_point(&q2),
        },
    )?;

    let msg3: KeygenMsg3 = recv_msg(transport)?;
    if sha256(&[transcript, &msg3.q1, &msg3.blind]) != msg1.commitment {
        return Err(Error::Crypto("commitment opening mismatch".into()));
    }
    let q1 = decode_point(&msg3.q1)?;
    let q = q1 + q2;
    if bool::from(q.is_identity()) {
        return Err(Error::Crypto("joint public key is the identity".into()));
    }

    let paillier = PaillierMaterial::from_modulus(BigInt::from_bytes(&msg3.paillier_n))?;
    let c_key = BigInt::from_bytes(&msg3.c_key);
    paillier.check_ciphertext(&c_key)?;

    debug!("keygen round 4: confirm joint key");
    send_msg(
        transport,
        &KeygenMsg4 {
            confirm: confirm_digest(transcript, &q),
        },
    )?;

    Ok(Keypair::new(
        ShareKind::Server,
        opts.scheme,
        opts.curve,
        opts.key_id,
        q,
        x2,
        c_key,
        paillier,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mpc::MemoryTransport;
    use crate::types::{Curve, KeyId, Scheme};

    fn options(kind: ShareKind, session_id: &[u8]) -> DkgOptions {
        DkgOptions {
            curve: Curve::Secp256k1,
            scheme: Scheme::Ecdsa2p,
            kind,
            key_id: KeyId::default(),
            session_id: session_id.to_vec(),
        }
    }

    #[test]
    fn both_parties_agree_on_the_joint_key() {
        let (device_link, server_link) = MemoryTransport::pair();
        let ctx = Context::default();
        let server_ctx = ctx.clone();

        let server = std::thread::spawn(move || {
            run_dkg(&server_link, &server_ctx, &options(ShareKind::Server, b"sid"))
        });
        let device = run_dkg(&device_link, &ctx, &options(ShareKind::Device, b"sid")).unwrap();
        let server = server.join().unwrap().unwrap();

        assert_eq!(device.public_key(), server.public_key());
        assert_eq!(device.public_key().len(), 33);
        assert_eq!(device.c_key(), server.c_key());
        assert_ne!(device.x_share(), server.x_share());
    }

    #[test]
    fn session_id_mismatch_fails() {
        let (device_link, server_link) = MemoryTransport::pair();
        let ctx = Context::default();
        let server_ctx = ctx.clone();

        let server = std::thread::spawn(move || {
            run_dkg(&server_link, &server_ctx, &options(ShareKind::Server, b"one"))
        });
        let device = run_dkg(&device_link, &ctx, &options(ShareKind::Device, b"two"));
        let server = server.join().unwrap();

        // the server detects the commitment mismatch; the device then sees
        // either the same failure or a dead transport
        assert!(server.is_err() || device.is_err());
    }
}
