//! Two-party ECDSA signing
//!
//! Multiplicative nonce sharing over additive key shares: the parties hold
//! x1 + x2 = d and nonces k1, k2 with R = k1·k2·G. The server folds its
//! share into a Paillier ciphertext over the device's key ciphertext, the
//! device decrypts, unblinds with k1⁻¹ and self-verifies the result before
//! releasing it. Only the device ever sees a signature.

use curv::arithmetic::Converter;
use curv::BigInt;
use k256::ecdsa::signature::Verifier;
use k256::ecdsa::VerifyingKey;
use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::{ProjectivePoint, Scalar};
use tracing::{debug, info, instrument};
use zeroize::Zeroizing;

use super::messages::{SignMsg1, SignMsg2};
use super::SignOutcome;
use crate::context::Context;
use crate::crypto::paillier::{bigint_to_scalar, curve_order, scalar_to_bigint};
use crate::crypto::{decode_point, encode_point, scalar_from_bytes, sha256};
use crate::error::{Error, Result};
use crate::keypair::Keypair;
use crate::mpc::{recv_msg, send_msg, transcript_key, Transport};
use crate::types::{ShareKind, SignOptions};

const TRANSCRIPT_LABEL: &str = "maany-mpc/sign/v1";

/// x-coordinate of a point reduced into the scalar field; the `r` of ECDSA
fn r_component(point: &ProjectivePoint) -> Result<Scalar> {
    let encoded = point.to_affine().to_encoded_point(false);
    let x = encoded
        .x()
        .ok_or_else(|| Error::Crypto("nonce point at infinity".into()))?;
    let mut x_bytes = [0u8; 32];
    x_bytes.copy_from_slice(x.as_slice());
    let r = scalar_from_bytes(&x_bytes);
    if bool::from(r.is_zero()) {
        return Err(Error::Crypto("nonce produced r = 0".into()));
    }
    Ok(r)
}

fn invert(scalar: &Scalar) -> Result<Scalar> {
    Option::<Scalar>::from(scalar.invert())
        .ok_or_else(|| Error::Crypto("nonce is not invertible".into()))
}

/// Run the signing protocol over an established transport, as the party
/// owning `keypair`. Both parties must have been handed the same message.
#[instrument(skip_all, fields(kind = ?keypair.kind(), msg_len = message.len()))]
pub fn run_dsg<T: Transport + ?Sized>(
    transport: &T,
    ctx: &Context,
    keypair: &Keypair,
    opts: &SignOptions,
    message: &[u8],
) -> Result<SignOutcome> {
    let transcript = transcript_key(TRANSCRIPT_LABEL, &opts.session_id);
    let digest = sha256(&[message]);
    let binding = sha256(&[&transcript, &digest, &opts.extra_aad]);
    let m = scalar_from_bytes(&digest);

    match keypair.kind() {
        ShareKind::Device => run_device(transport, ctx, keypair, message, &m, &binding),
        ShareKind::Server => run_server(transport, ctx, keypair, &m, &binding),
    }
}

fn run_device<T: Transport + ?Sized>(
    transport: &T,
    ctx: &Context,
    keypair: &Keypair,
    message: &[u8],
    m: &Scalar,
    binding: &[u8; 32],
) -> Result<SignOutcome> {
    let k1 = ctx.random_nonzero_scalar()?;

    debug!("sign round 1: send nonce point");
    send_msg(
        transport,
        &SignMsg1 {
            r1: encode_point(&(ProjectivePoint::GENERATOR * k1)),
            binding: *binding,
        },
    )?;

    let msg2: SignMsg2 = recv_msg(transport)?;
    let r2 = decode_point(&msg2.r2)?;
    let r = r_component(&(r2 * k1))?;

    // s'' = k2⁻¹(m + r·d) + ρ·q; the blinding vanishes mod q
    let c3 = BigInt::from_bytes(&msg2.c3);
    keypair.paillier().check_ciphertext(&c3)?;
    let s_masked = keypair.paillier().decrypt(&c3)?;
    let s_shared = bigint_to_scalar(&s_masked);
    let s = invert(&k1)? * s_shared;
    if bool::from(s.is_zero()) {
        return Err(Error::Crypto("signature has s = 0".into()));
    }

    let signature =
        k256::ecdsa::Signature::from_scalars(r.to_bytes(), s.to_bytes())
            .map_err(|e| Error::Crypto(format!("assembling signature: {e}")))?;
    let signature = signature.normalize_s().unwrap_or(signature);

    // reject anything that does not verify under the joint key before it
    // can leave the session
    let verifying_key = VerifyingKey::from_sec1_bytes(&keypair.public_key())
        .map_err(|e| Error::Crypto(format!("joint key rejected: {e}")))?;
    verifying_key
        .verify(message, &signature)
        .map_err(|_| Error::Crypto("co-signed signature failed verification".into()))?;

    info!(r = %hex::encode(r.to_bytes()), "signature produced");
    Ok(SignOutcome::Signature {
        der: Zeroizing::new(signature.to_der().as_bytes().to_vec()),
        raw: Zeroizing::new(signature.to_bytes().to_vec()),
    })
}

fn run_server<T: Transport + ?Sized>(
    transport: &T,
    ctx: &Context,
    keypair: &Keypair,
    m: &Scalar,
    binding: &[u8; 32],
) -> Result<SignOutcome> {
    let msg1: SignMsg1 = recv_msg(transport)?;
    if msg1.binding != *binding {
        return Err(Error::Crypto(
            "peer is signing a different message".into(),
        ));
    }
    let r1 = decode_point(&msg1.r1)?;

    let k2 = ctx.random_nonzero_scalar()?;
    let r = r_component(&(r1 * k2))?;
    let k2_inv = invert(&k2)?;

    // Enc(k2⁻¹(m + r·x2) + ρ·q) ⊕ c_key ⊗ (k2⁻¹·r) = Enc(k2⁻¹(m + r·d) + ρ·q)
    let paillier = keypair.paillier();
    let mut rho_bytes = Zeroizing::new([0u8; 32]);
    ctx.fill_random(rho_bytes.as_mut())?;
    let rho = BigInt::from_bytes(rho_bytes.as_ref()) % curve_order();

    let a = k2_inv * (*m + r * keypair.x_share());
    let plaintext = scalar_to_bigint(&a) + rho * curve_order();
    let c1 = paillier.encrypt(&plaintext);
    let c2 = paillier.mul_plaintext(keypair.c_key(), &scalar_to_bigint(&(k2_inv * r)));
    let c3 = paillier.add(&c1, &c2);

    debug!("sign round 2: send encrypted signature share");
    send_msg(
        transport,
        &SignMsg2 {
            r2: encode_point(&(ProjectivePoint::GENERATOR * k2)),
            c3: c3.to_bytes(),
        },
    )?;

    Ok(SignOutcome::CoSigned)
}
