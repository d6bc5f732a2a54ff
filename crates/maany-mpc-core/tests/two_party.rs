//! End-to-end two-party flows: key generation, signing, refresh

mod common;

use common::{co_sign, dkg_options, fixture, pump, run_dkg_pair, test_message, verify_der};
use maany_mpc_core::{
    Context, Curve, DkgOptions, Error, KeyId, RefreshOptions, Scheme, ShareKind, SigFormat,
    SignOptions, StepState,
};

#[test]
fn dkg_produces_matching_public_keys() {
    let ctx = Context::default();
    let key_id = KeyId([0u8; 32]);
    let (device, server) = run_dkg_pair(&ctx, key_id);

    let device_pub = device.public_key();
    let server_pub = server.public_key();
    assert_eq!(device_pub, server_pub);
    assert_eq!(device_pub.len(), 33);
    assert!(device_pub[0] == 0x02 || device_pub[0] == 0x03);

    assert_eq!(device.kind(), ShareKind::Device);
    assert_eq!(server.kind(), ShareKind::Server);
    assert_eq!(device.scheme(), Scheme::Ecdsa2p);
    assert_eq!(device.curve(), Curve::Secp256k1);
    assert_eq!(device.key_id(), &key_id);
}

#[test]
fn sign_produces_a_verifying_signature() {
    let fixture = fixture();
    let ctx = Context::default();
    let device = ctx.import_keypair(&fixture.device_blob).unwrap();
    let server = ctx.import_keypair(&fixture.server_blob).unwrap();

    let message = test_message();
    let (der, raw) = co_sign(&ctx, &device, &server, &message).unwrap();

    assert!(verify_der(&fixture.public_key, &message, &der));

    // raw output is exactly the DER components, left-padded to 32 bytes
    assert_eq!(raw.len(), 64);
    let parsed = k256::ecdsa::Signature::from_der(&der).unwrap();
    assert_eq!(raw, parsed.to_bytes().to_vec());
}

#[test]
fn sign_finalize_is_idempotent_on_the_device() {
    let fixture = fixture();
    let ctx = Context::default();
    let device = ctx.import_keypair(&fixture.device_blob).unwrap();
    let server = ctx.import_keypair(&fixture.server_blob).unwrap();

    let mut device_session = ctx.sign(&device, SignOptions::default()).unwrap();
    let mut server_session = ctx.sign(&server, SignOptions::default()).unwrap();
    let message = test_message();
    device_session.set_message(&message).unwrap();
    server_session.set_message(&message).unwrap();
    pump(&mut device_session, &mut server_session).unwrap();

    let first = device_session.finalize(SigFormat::Der).unwrap();
    let second = device_session.finalize(SigFormat::Der).unwrap();
    assert_eq!(first, second);

    // the server side terminates Done but never releases a signature
    let err = server_session.finalize(SigFormat::Der).unwrap_err();
    assert!(matches!(err, Error::ProtocolState(_)));
}

#[test]
fn export_import_round_trips_and_still_signs() {
    let fixture = fixture();
    let ctx = Context::default();

    let device = ctx.import_keypair(&fixture.device_blob).unwrap();
    let server = ctx.import_keypair(&fixture.server_blob).unwrap();

    // the codec is deterministic: re-export reproduces the blob
    assert_eq!(
        ctx.export_keypair(&device).unwrap().to_vec(),
        fixture.device_blob
    );
    assert_eq!(device.public_key(), fixture.public_key);
    assert_eq!(server.public_key(), fixture.public_key);
    assert_eq!(device.key_id(), &KeyId([9u8; 32]));

    let message = test_message();
    let (der, _) = co_sign(&ctx, &device, &server, &message).unwrap();
    assert!(verify_der(&fixture.public_key, &message, &der));
}

#[test]
fn refresh_preserves_the_key_and_invalidates_old_shares() {
    let ctx = Context::default();
    let (device, server) = run_dkg_pair(&ctx, KeyId([4u8; 32]));
    let joint = device.public_key();

    let mut device_session = ctx.refresh(&device, RefreshOptions::default()).unwrap();
    let mut server_session = ctx.refresh(&server, RefreshOptions::default()).unwrap();
    pump(&mut device_session, &mut server_session).unwrap();
    let new_device = device_session.finalize().unwrap();
    let new_server = server_session.finalize().unwrap();

    assert_eq!(new_device.public_key(), joint);
    assert_eq!(new_server.public_key(), joint);
    assert_eq!(new_device.key_id(), device.key_id());

    // the refreshed pair still signs
    let message = test_message();
    let (der, _) = co_sign(&ctx, &new_device, &new_server, &message).unwrap();
    assert!(verify_der(&joint, &message, &der));

    // a pre-refresh share mixed with a refreshed counterpart must not
    let result = co_sign(&ctx, &device, &new_server, &message);
    assert!(matches!(result.unwrap_err(), Error::Crypto(_)));
}

#[test]
fn step_without_input_holds_position_while_waiting() {
    let ctx = Context::default();
    let mut device = ctx
        .dkg(dkg_options(ShareKind::Device, KeyId::default(), b""))
        .unwrap();

    // first step yields the round-1 message
    let (state, out) = device.step(None).unwrap();
    assert_eq!(state, StepState::Continue);
    let round1 = out.expect("device speaks first");
    assert!(!round1.is_empty());

    // with the worker parked on the peer's reply, stepping without input
    // neither blocks nor advances anything
    for _ in 0..3 {
        let (state, out) = device.step(None).unwrap();
        assert_eq!(state, StepState::Continue);
        assert!(out.is_none());
    }
}

#[test]
fn sign_session_waits_for_the_message() {
    let fixture = fixture();
    let ctx = Context::default();
    let device = ctx.import_keypair(&fixture.device_blob).unwrap();

    let mut session = ctx.sign(&device, SignOptions::default()).unwrap();

    // no progress before the message arrives
    let (state, out) = session.step(None).unwrap();
    assert_eq!(state, StepState::Continue);
    assert!(out.is_none());

    assert!(matches!(
        session.set_message(b"").unwrap_err(),
        Error::InvalidArgument(_)
    ));
    session.set_message(b"message").unwrap();
    assert!(matches!(
        session.set_message(b"message").unwrap_err(),
        Error::ProtocolState(_)
    ));

    // now the worker produces round 1
    let (_, out) = session.step(None).unwrap();
    assert!(out.is_some());
}

#[test]
fn finalize_respects_session_state() {
    let ctx = Context::default();
    let mut device = ctx
        .dkg(dkg_options(ShareKind::Device, KeyId::default(), b""))
        .unwrap();
    let mut server = ctx
        .dkg(dkg_options(ShareKind::Server, KeyId::default(), b""))
        .unwrap();

    // before Done
    assert!(matches!(
        device.finalize().unwrap_err(),
        Error::ProtocolState(_)
    ));

    pump(&mut device, &mut server).unwrap();
    device.finalize().unwrap();

    // twice
    assert!(matches!(
        device.finalize().unwrap_err(),
        Error::ProtocolState(_)
    ));
}

#[test]
fn reserved_curves_and_schemes_are_refused() {
    let ctx = Context::default();

    let mut opts = dkg_options(ShareKind::Device, KeyId::default(), b"");
    opts.curve = Curve::Ed25519;
    assert!(matches!(
        ctx.dkg(opts).unwrap_err(),
        Error::Unsupported(_)
    ));

    let mut opts = dkg_options(ShareKind::Device, KeyId::default(), b"");
    opts.scheme = Scheme::EcdsaTn;
    assert!(matches!(ctx.dkg(opts).unwrap_err(), Error::Unsupported(_)));

    let mut opts = dkg_options(ShareKind::Device, KeyId::default(), b"");
    opts.scheme = Scheme::Schnorr2p;
    assert!(matches!(ctx.dkg(opts).unwrap_err(), Error::Unsupported(_)));
}

#[test]
fn mismatched_session_ids_surface_as_a_step_error() {
    let ctx = Context::default();
    let mut device = ctx
        .dkg(DkgOptions {
            session_id: b"alpha".to_vec(),
            ..dkg_options(ShareKind::Device, KeyId::default(), b"")
        })
        .unwrap();
    let mut server = ctx
        .dkg(DkgOptions {
            session_id: b"beta".to_vec(),
            ..dkg_options(ShareKind::Server, KeyId::default(), b"")
        })
        .unwrap();

    let mut to_a: Option<Vec<u8>> = None;
    let mut to_b: Option<Vec<u8>> = None;
    let mut failed = None;
    for _ in 0..16 {
        let inbound = to_a.take();
        match device.step(inbound.as_deref()) {
            Ok((_, Some(msg))) => to_b = Some(msg),
            Ok(_) => {}
            Err(err) => {
                failed = Some(err);
                break;
            }
        }
        let inbound = to_b.take();
        match server.step(inbound.as_deref()) {
            Ok((_, Some(msg))) => to_a = Some(msg),
            Ok(_) => {}
            Err(err) => {
                failed = Some(err);
                break;
            }
        }
    }
    assert!(matches!(failed, Some(Error::Crypto(_))));
}
