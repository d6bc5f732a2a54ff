//! Shared harness for the two-party end-to-end suites
#![allow(dead_code)]

use std::sync::OnceLock;

use maany_mpc_core::{
    Context, Curve, DkgOptions, DkgSession, KeyId, Keypair, Result, Scheme, ShareKind,
    SigFormat, SignOptions, SignSession, StepState,
};

/// The step/finalize contract shared by every session kind
pub trait Steppable {
    fn step(&mut self, inbound: Option<&[u8]>) -> Result<(StepState, Option<Vec<u8>>)>;
}

impl Steppable for DkgSession {
    fn step(&mut self, inbound: Option<&[u8]>) -> Result<(StepState, Option<Vec<u8>>)> {
        DkgSession::step(self, inbound)
    }
}

impl Steppable for SignSession {
    fn step(&mut self, inbound: Option<&[u8]>) -> Result<(StepState, Option<Vec<u8>>)> {
        SignSession::step(self, inbound)
    }
}

/// Loopback driver: every outbound message is delivered to the peer's next
/// step, in order, until both sessions report Done
pub fn pump(a: &mut dyn Steppable, b: &mut dyn Steppable) -> Result<()> {
    let mut to_a: Option<Vec<u8>> = None;
    let mut to_b: Option<Vec<u8>> = None;
    for _ in 0..64 {
        let inbound = to_a.take();
        let (state_a, out) = a.step(inbound.as_deref())?;
        if let Some(msg) = out {
            to_b = Some(msg);
        }

        let inbound = to_b.take();
        let (state_b, out) = b.step(inbound.as_deref())?;
        if let Some(msg) = out {
            to_a = Some(msg);
        }

        if state_a == StepState::Done
            && state_b == StepState::Done
            && to_a.is_none()
            && to_b.is_none()
        {
            return Ok(());
        }
    }
    panic!("step loop did not terminate");
}

pub fn dkg_options(kind: ShareKind, key_id: KeyId, session_id: &[u8]) -> DkgOptions {
    DkgOptions {
        curve: Curve::Secp256k1,
        scheme: Scheme::Ecdsa2p,
        kind,
        key_id,
        session_id: session_id.to_vec(),
    }
}

/// Run a complete DKG through the session engine
pub fn run_dkg_pair(ctx: &Context, key_id: KeyId) -> (Keypair, Keypair) {
    let mut device = ctx
        .dkg(dkg_options(ShareKind::Device, key_id, b""))
        .expect("device dkg session");
    let mut server = ctx
        .dkg(dkg_options(ShareKind::Server, key_id, b""))
        .expect("server dkg session");
    pump(&mut device, &mut server).expect("dkg step loop");
    (
        device.finalize().expect("device share"),
        server.finalize().expect("server share"),
    )
}

/// Run a complete co-signing session; returns (DER, raw r‖s) from the
/// device side
pub fn co_sign(
    ctx: &Context,
    device: &Keypair,
    server: &Keypair,
    message: &[u8],
) -> Result<(Vec<u8>, Vec<u8>)> {
    let mut device_session = ctx.sign(device, SignOptions::default())?;
    let mut server_session = ctx.sign(server, SignOptions::default())?;
    device_session.set_message(message)?;
    server_session.set_message(message)?;
    pump(&mut device_session, &mut server_session)?;
    let der = device_session.finalize(SigFormat::Der)?;
    let raw = device_session.finalize(SigFormat::RawRs)?;
    Ok((der, raw))
}

/// Standard ECDSA verification of a DER signature under a compressed key
pub fn verify_der(public_key: &[u8], message: &[u8], der: &[u8]) -> bool {
    use k256::ecdsa::signature::Verifier;
    let Ok(key) = k256::ecdsa::VerifyingKey::from_sec1_bytes(public_key) else {
        return false;
    };
    let Ok(signature) = k256::ecdsa::Signature::from_der(der) else {
        return false;
    };
    key.verify(message, &signature).is_ok()
}

pub struct Fixture {
    pub device_blob: Vec<u8>,
    pub server_blob: Vec<u8>,
    pub public_key: Vec<u8>,
}

/// One DKG shared by every test that only needs an established joint key;
/// Paillier keypair generation is the expensive part of DKG
pub fn fixture() -> &'static Fixture {
    static FIXTURE: OnceLock<Fixture> = OnceLock::new();
    FIXTURE.get_or_init(|| {
        let ctx = Context::default();
        let (device, server) = run_dkg_pair(&ctx, KeyId([9u8; 32]));
        Fixture {
            device_blob: ctx.export_keypair(&device).expect("export device").to_vec(),
            server_blob: ctx.export_keypair(&server).expect("export server").to_vec(),
            public_key: device.public_key(),
        }
    })
}

/// The 32-byte test message 0x01 02 … 20
pub fn test_message() -> Vec<u8> {
    (1u8..=32).collect()
}
