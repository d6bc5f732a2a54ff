//! Flat C-compatible surface of the MPC engine, version 1.0.0
//!
//! One `extern "C"` entry point per operation; errors travel by value as
//! `u32` codes, never through thread-locals. Every out-parameter buffer is
//! allocated through the context's injected allocator and must be released
//! with `maany_mpc_buf_free` (handles through their dedicated `_free`).
//! `maany_mpc_buf_free` always zeroizes before freeing.

#![allow(non_camel_case_types)]
#![allow(unused_unsafe)]
#![allow(clippy::missing_safety_doc)]

use std::ffi::{c_char, c_int, c_void, CString};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use maany_mpc_core::{
    error_string, BackupCiphertext, BackupShare, Context, Curve, DkgOptions, DkgSession,
    ErrorKind, InitOptions, KeyId, Keypair, LogLevel, RefreshOptions, Scheme, ShareKind,
    SigFormat, SignOptions, SignSession, StepState,
};

pub const MAANY_MPC_OK: u32 = 0;
pub const MAANY_MPC_ERR_GENERAL: u32 = 1;
pub const MAANY_MPC_ERR_INVALID_ARG: u32 = 2;
pub const MAANY_MPC_ERR_UNSUPPORTED: u32 = 3;
pub const MAANY_MPC_ERR_PROTO_STATE: u32 = 4;
pub const MAANY_MPC_ERR_CRYPTO: u32 = 5;
pub const MAANY_MPC_ERR_RNG: u32 = 6;
pub const MAANY_MPC_ERR_IO: u32 = 7;
pub const MAANY_MPC_ERR_POLICY: u32 = 8;
pub const MAANY_MPC_ERR_MEMORY: u32 = 9;

pub const MAANY_MPC_STEP_CONTINUE: u32 = 0;
pub const MAANY_MPC_STEP_DONE: u32 = 1;

pub type maany_mpc_error_t = u32;

#[repr(C)]
#[derive(Clone, Copy)]
pub struct maany_mpc_version_t {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct maany_mpc_buf_t {
    pub data: *mut u8,
    pub len: usize,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct maany_mpc_key_id_t {
    pub bytes: [u8; 32],
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct maany_mpc_kp_meta_t {
    pub kind: u32,
    pub curve: u32,
    pub scheme: u32,
    pub key_id: maany_mpc_key_id_t,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct maany_mpc_pubkey_t {
    pub curve: u32,
    pub pubkey: maany_mpc_buf_t,
}

pub type maany_mpc_rng_cb = Option<unsafe extern "C" fn(*mut u8, usize) -> c_int>;
pub type maany_mpc_malloc_fn = Option<unsafe extern "C" fn(usize) -> *mut c_void>;
pub type maany_mpc_free_fn = Option<unsafe extern "C" fn(*mut c_void)>;
pub type maany_mpc_secure_zero_fn = Option<unsafe extern "C" fn(*mut c_void, usize)>;
pub type maany_mpc_log_cb = Option<unsafe extern "C" fn(u32, *const c_char)>;

#[repr(C)]
#[derive(Clone, Copy)]
pub struct maany_mpc_init_opts_t {
    pub rng: maany_mpc_rng_cb,
    pub malloc_fn: maany_mpc_malloc_fn,
    pub free_fn: maany_mpc_free_fn,
    pub secure_zero: maany_mpc_secure_zero_fn,
    pub logger: maany_mpc_log_cb,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct maany_mpc_dkg_opts_t {
    pub curve: u32,
    pub scheme: u32,
    pub kind: u32,
    pub key_id_hint: maany_mpc_key_id_t,
    pub session_id: maany_mpc_buf_t,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct maany_mpc_sign_opts_t {
    pub scheme: u32,
    pub session_id: maany_mpc_buf_t,
    pub extra_aad: maany_mpc_buf_t,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct maany_mpc_refresh_opts_t {
    pub session_id: maany_mpc_buf_t,
}

#[derive(Clone, Copy)]
struct AllocTable {
    malloc: maany_mpc_malloc_fn,
    free: maany_mpc_free_fn,
    secure_zero: maany_mpc_secure_zero_fn,
}

impl AllocTable {
    unsafe fn alloc_copy(&self, src: &[u8], dst: *mut maany_mpc_buf_t) -> maany_mpc_error_t {
        if dst.is_null() {
            return MAANY_MPC_OK;
        }
        (*dst).data = std::ptr::null_mut();
        (*dst).len = 0;
        if src.is_empty() {
            return MAANY_MPC_OK;
        }
        let raw = match self.malloc {
            Some(malloc) => malloc(src.len()),
            None => libc::malloc(src.len()),
        };
        if raw.is_null() {
            return MAANY_MPC_ERR_MEMORY;
        }
        std::ptr::copy_nonoverlapping(src.as_ptr(), raw as *mut u8, src.len());
        (*dst).data = raw as *mut u8;
        (*dst).len = src.len();
        MAANY_MPC_OK
    }

    unsafe fn release(&self, buf: *mut maany_mpc_buf_t) {
        if buf.is_null() || (*buf).data.is_null() {
            return;
        }
        match self.secure_zero {
            Some(zero) => zero((*buf).data as *mut c_void, (*buf).len),
            None => default_secure_zero((*buf).data, (*buf).len),
        }
        match self.free {
            Some(free) => free((*buf).data as *mut c_void),
            None => libc::free((*buf).data as *mut c_void),
        }
        (*buf).data = std::ptr::null_mut();
        (*buf).len = 0;
    }
}

unsafe fn default_secure_zero(p: *mut u8, n: usize) {
    for i in 0..n {
        std::ptr::write_volatile(p.add(i), 0);
    }
}

pub struct maany_mpc_ctx_t {
    ctx: Context,
    alloc: AllocTable,
}

pub struct maany_mpc_keypair_t {
    keypair: Keypair,
}

pub struct maany_mpc_dkg_t {
    session: DkgSession,
}

pub struct maany_mpc_sign_t {
    session: SignSession,
}

fn err_code(err: &maany_mpc_core::Error) -> maany_mpc_error_t {
    err.kind().code()
}

/// `None` when the pointer is null, the borrowed bytes otherwise. A
/// non-null buffer with zero length is a valid empty message.
unsafe fn buf_as_slice<'a>(
    buf: *const maany_mpc_buf_t,
) -> std::result::Result<Option<&'a [u8]>, maany_mpc_error_t> {
    if buf.is_null() {
        return Ok(None);
    }
    let buf = &*buf;
    if buf.len == 0 {
        return Ok(Some(&[]));
    }
    if buf.data.is_null() {
        return Err(MAANY_MPC_ERR_INVALID_ARG);
    }
    Ok(Some(std::slice::from_raw_parts(buf.data, buf.len)))
}

fn guarded(body: impl FnOnce() -> maany_mpc_error_t) -> maany_mpc_error_t {
    catch_unwind(AssertUnwindSafe(body)).unwrap_or(MAANY_MPC_ERR_GENERAL)
}

#[no_mangle]
pub unsafe extern "C" fn maany_mpc_init(
    opts: *const maany_mpc_init_opts_t,
) -> *mut maany_mpc_ctx_t {
    let result = catch_unwind(AssertUnwindSafe(|| unsafe {
        let opts = if opts.is_null() { None } else { Some(*opts) };
        let mut core_opts = InitOptions::default();
        let mut alloc = AllocTable {
            malloc: None,
            free: None,
            secure_zero: None,
        };
        if let Some(opts) = opts {
            alloc.malloc = opts.malloc_fn;
            alloc.free = opts.free_fn;
            alloc.secure_zero = opts.secure_zero;
            if let Some(rng) = opts.rng {
                core_opts.rng = Some(Arc::new(move |out: &mut [u8]| {
                    unsafe { rng(out.as_mut_ptr(), out.len()) as i32 }
                }));
            }
            if let Some(logger) = opts.logger {
                core_opts.logger = Some(Arc::new(move |level: LogLevel, msg: &str| {
                    if let Ok(text) = CString::new(msg) {
                        unsafe { logger(level as u32, text.as_ptr()) }
                    }
                }));
            }
        }
        Box::into_raw(Box::new(maany_mpc_ctx_t {
            ctx: Context::new(core_opts),
            alloc,
        }))
    }));
    result.unwrap_or(std::ptr::null_mut())
}

#[no_mangle]
pub unsafe extern "C" fn maany_mpc_shutdown(ctx: *mut maany_mpc_ctx_t) {
    if ctx.is_null() {
        return;
    }
    drop(Box::from_raw(ctx));
}

#[no_mangle]
pub extern "C" fn maany_mpc_version() -> maany_mpc_version_t {
    let (major, minor, patch) = maany_mpc_core::VERSION;
    maany_mpc_version_t {
        major,
        minor,
        patch,
    }
}

#[no_mangle]
pub extern "C" fn maany_mpc_error_string(err: maany_mpc_error_t) -> *const c_char {
    let text: &'static [u8] = match ErrorKind::from_code(err) {
        ErrorKind::Ok => b"ok\0",
        ErrorKind::General => b"general error\0",
        ErrorKind::InvalidArgument => b"invalid argument\0",
        ErrorKind::Unsupported => b"unsupported\0",
        ErrorKind::ProtocolState => b"protocol state\0",
        ErrorKind::Crypto => b"crypto error\0",
        ErrorKind::Rng => b"rng failure\0",
        ErrorKind::Io => b"io\0",
        ErrorKind::Policy => b"policy\0",
        ErrorKind::Memory => b"out of memory\0",
    };
    debug_assert_eq!(
        &text[..text.len() - 1],
        error_string(ErrorKind::from_code(err)).as_bytes()
    );
    text.as_ptr() as *const c_char
}

#[no_mangle]
pub unsafe extern "C" fn maany_mpc_buf_free(ctx: *mut maany_mpc_ctx_t, buf: *mut maany_mpc_buf_t) {
    if ctx.is_null() {
        return;
    }
    let alloc = (*ctx).alloc;
    alloc.release(buf);
}

#[no_mangle]
pub unsafe extern "C" fn maany_mpc_kp_export(
    ctx: *mut maany_mpc_ctx_t,
    kp: *const maany_mpc_keypair_t,
    out_blob: *mut maany_mpc_buf_t,
) -> maany_mpc_error_t {
    if ctx.is_null() || kp.is_null() || out_blob.is_null() {
        return MAANY_MPC_ERR_INVALID_ARG;
    }
    guarded(|| unsafe {
        let ctx = &*ctx;
        match ctx.ctx.export_keypair(&(*kp).keypair) {
            Ok(blob) => ctx.alloc.alloc_copy(&blob, out_blob),
            Err(err) => err_code(&err),
        }
    })
}

#[no_mangle]
pub unsafe extern "C" fn maany_mpc_kp_import(
    ctx: *mut maany_mpc_ctx_t,
    in_blob: *const maany_mpc_buf_t,
    out_kp: *mut *mut maany_mpc_keypair_t,
) -> maany_mpc_error_t {
    if ctx.is_null() || in_blob.is_null() || out_kp.is_null() {
        return MAANY_MPC_ERR_INVALID_ARG;
    }
    guarded(|| unsafe {
        let blob = match buf_as_slice(in_blob) {
            Ok(Some(blob)) => blob,
            Ok(None) => return MAANY_MPC_ERR_INVALID_ARG,
            Err(code) => return code,
        };
        match (*ctx).ctx.import_keypair(blob) {
            Ok(keypair) => {
                *out_kp = Box::into_raw(Box::new(maany_mpc_keypair_t { keypair }));
                MAANY_MPC_OK
            }
            Err(err) => err_code(&err),
        }
    })
}

#[no_mangle]
pub unsafe extern "C" fn maany_mpc_kp_free(kp: *mut maany_mpc_keypair_t) {
    if kp.is_null() {
        return;
    }
    drop(Box::from_raw(kp));
}

#[no_mangle]
pub unsafe extern "C" fn maany_mpc_kp_meta(
    ctx: *mut maany_mpc_ctx_t,
    kp: *const maany_mpc_keypair_t,
    out_meta: *mut maany_mpc_kp_meta_t,
) -> maany_mpc_error_t {
    if ctx.is_null() || kp.is_null() || out_meta.is_null() {
        return MAANY_MPC_ERR_INVALID_ARG;
    }
    guarded(|| unsafe {
        let keypair = &(*kp).keypair;
        (*out_meta).kind = keypair.kind().code();
        (*out_meta).curve = keypair.curve().code();
        (*out_meta).scheme = keypair.scheme().code();
        (*out_meta).key_id.bytes = *keypair.key_id().as_bytes();
        MAANY_MPC_OK
    })
}

#[no_mangle]
pub unsafe extern "C" fn maany_mpc_kp_pubkey(
    ctx: *mut maany_mpc_ctx_t,
    kp: *const maany_mpc_keypair_t,
    out_pub: *mut maany_mpc_pubkey_t,
) -> maany_mpc_error_t {
    if ctx.is_null() || kp.is_null() || out_pub.is_null() {
        return MAANY_MPC_ERR_INVALID_ARG;
    }
    guarded(|| unsafe {
        let ctx = &*ctx;
        let keypair = &(*kp).keypair;
        (*out_pub).curve = keypair.curve().code();
        ctx.alloc
            .alloc_copy(&keypair.public_key(), &mut (*out_pub).pubkey)
    })
}

unsafe fn step_session(
    ctx: *mut maany_mpc_ctx_t,
    step: impl FnOnce(Option<&[u8]>) -> maany_mpc_core::Result<(StepState, Option<Vec<u8>>)>,
    in_peer_msg: *const maany_mpc_buf_t,
    out_msg: *mut maany_mpc_buf_t,
    result: *mut u32,
) -> maany_mpc_error_t {
    if !out_msg.is_null() {
        (*out_msg).data = std::ptr::null_mut();
        (*out_msg).len = 0;
    }
    if !result.is_null() {
        *result = MAANY_MPC_STEP_CONTINUE;
    }
    let inbound = match buf_as_slice(in_peer_msg) {
        Ok(inbound) => inbound,
        Err(code) => return code,
    };
    match step(inbound) {
        Ok((state, outbound)) => {
            if let Some(outbound) = outbound {
                if out_msg.is_null() {
                    return MAANY_MPC_ERR_INVALID_ARG;
                }
                let code = (*ctx).alloc.alloc_copy(&outbound, out_msg);
                if code != MAANY_MPC_OK {
                    return code;
                }
            }
            if !result.is_null() {
                *result = state.code();
            }
            MAANY_MPC_OK
        }
        Err(err) => err_code(&err),
    }
}

#[no_mangle]
pub unsafe extern "C" fn maany_mpc_dkg_new(
    ctx: *mut maany_mpc_ctx_t,
    opts: *const maany_mpc_dkg_opts_t,
    out_dkg: *mut *mut maany_mpc_dkg_t,
) -> maany_mpc_error_t {
    if ctx.is_null() || opts.is_null() || out_dkg.is_null() {
        return MAANY_MPC_ERR_INVALID_ARG;
    }
    guarded(|| unsafe {
        let opts = &*opts;
        let session_id = match buf_as_slice(&opts.session_id) {
            Ok(bytes) => bytes.unwrap_or(&[]).to_vec(),
            Err(code) => return code,
        };
        let parsed = (|| -> maany_mpc_core::Result<DkgOptions> {
            Ok(DkgOptions {
                curve: Curve::from_code(opts.curve)?,
                scheme: Scheme::from_code(opts.scheme)?,
                kind: ShareKind::from_code(opts.kind)?,
                key_id: KeyId(opts.key_id_hint.bytes),
                session_id,
            })
        })();
        let parsed = match parsed {
            Ok(parsed) => parsed,
            Err(err) => return err_code(&err),
        };
        match (*ctx).ctx.dkg(parsed) {
            Ok(session) => {
                *out_dkg = Box::into_raw(Box::new(maany_mpc_dkg_t { session }));
                MAANY_MPC_OK
            }
            Err(err) => err_code(&err),
        }
    })
}

#[no_mangle]
pub unsafe extern "C" fn maany_mpc_dkg_step(
    ctx: *mut maany_mpc_ctx_t,
    dkg: *mut maany_mpc_dkg_t,
    in_peer_msg: *const maany_mpc_buf_t,
    out_msg: *mut maany_mpc_buf_t,
    result: *mut u32,
) -> maany_mpc_error_t {
    if ctx.is_null() || dkg.is_null() {
        return MAANY_MPC_ERR_INVALID_ARG;
    }
    guarded(|| unsafe {
        let session = &mut (*dkg).session;
        step_session(ctx, |inbound| session.step(inbound), in_peer_msg, out_msg, result)
    })
}

#[no_mangle]
pub unsafe extern "C" fn maany_mpc_dkg_finalize(
    ctx: *mut maany_mpc_ctx_t,
    dkg: *mut maany_mpc_dkg_t,
    out_kp: *mut *mut maany_mpc_keypair_t,
) -> maany_mpc_error_t {
    if ctx.is_null() || dkg.is_null() || out_kp.is_null() {
        return MAANY_MPC_ERR_INVALID_ARG;
    }
    guarded(|| unsafe {
        match (*dkg).session.finalize() {
            Ok(keypair) => {
                *out_kp = Box::into_raw(Box::new(maany_mpc_keypair_t { keypair }));
                MAANY_MPC_OK
            }
            Err(err) => err_code(&err),
        }
    })
}

#[no_mangle]
pub unsafe extern "C" fn maany_mpc_dkg_free(dkg: *mut maany_mpc_dkg_t) {
    if dkg.is_null() {
        return;
    }
    drop(Box::from_raw(dkg));
}

#[no_mangle]
pub unsafe extern "C" fn maany_mpc_sign_new(
    ctx: *mut maany_mpc_ctx_t,
    kp: *const maany_mpc_keypair_t,
    opts: *const maany_mpc_sign_opts_t,
    out_sign: *mut *mut maany_mpc_sign_t,
) -> maany_mpc_error_t {
    if ctx.is_null() || kp.is_null() || out_sign.is_null() {
        return MAANY_MPC_ERR_INVALID_ARG;
    }
    guarded(|| unsafe {
        let mut parsed = SignOptions::default();
        if !opts.is_null() {
            let opts = &*opts;
            parsed.scheme = match Scheme::from_code(opts.scheme) {
                Ok(scheme) => scheme,
                Err(err) => return err_code(&err),
            };
            parsed.session_id = match buf_as_slice(&opts.session_id) {
                Ok(bytes) => bytes.unwrap_or(&[]).to_vec(),
                Err(code) => return code,
            };
            parsed.extra_aad = match buf_as_slice(&opts.extra_aad) {
                Ok(bytes) => bytes.unwrap_or(&[]).to_vec(),
                Err(code) => return code,
            };
        }
        match (*ctx).ctx.sign(&(*kp).keypair, parsed) {
            Ok(session) => {
                *out_sign = Box::into_raw(Box::new(maany_mpc_sign_t { session }));
                MAANY_MPC_OK
            }
            Err(err) => err_code(&err),
        }
    })
}

#[no_mangle]
pub unsafe extern "C" fn maany_mpc_sign_set_message(
    ctx: *mut maany_mpc_ctx_t,
    sign: *mut maany_mpc_sign_t,
    msg: *const u8,
    msg_len: usize,
) -> maany_mpc_error_t {
    if ctx.is_null() || sign.is_null() || msg.is_null() || msg_len == 0 {
        return MAANY_MPC_ERR_INVALID_ARG;
    }
    guarded(|| unsafe {
        let message = std::slice::from_raw_parts(msg, msg_len);
        match (*sign).session.set_message(message) {
            Ok(()) => MAANY_MPC_OK,
            Err(err) => err_code(&err),
        }
    })
}

#[no_mangle]
pub unsafe extern "C" fn maany_mpc_sign_step(
    ctx: *mut maany_mpc_ctx_t,
    sign: *mut maany_mpc_sign_t,
    in_peer_msg: *const maany_mpc_buf_t,
    out_msg: *mut maany_mpc_buf_t,
    result: *mut u32,
) -> maany_mpc_error_t {
    if ctx.is_null() || sign.is_null() {
        return MAANY_MPC_ERR_INVALID_ARG;
    }
    guarded(|| unsafe {
        let session = &mut (*sign).session;
        step_session(ctx, |inbound| session.step(inbound), in_peer_msg, out_msg, result)
    })
}

#[no_mangle]
pub unsafe extern "C" fn maany_mpc_sign_finalize(
    ctx: *mut maany_mpc_ctx_t,
    sign: *mut maany_mpc_sign_t,
    fmt: u32,
    out_signature: *mut maany_mpc_buf_t,
) -> maany_mpc_error_t {
    if ctx.is_null() || sign.is_null() || out_signature.is_null() {
        return MAANY_MPC_ERR_INVALID_ARG;
    }
    guarded(|| unsafe {
        let format = match SigFormat::from_code(fmt) {
            Ok(format) => format,
            Err(err) => return err_code(&err),
        };
        match (*sign).session.finalize(format) {
            Ok(signature) => (*ctx).alloc.alloc_copy(&signature, out_signature),
            Err(err) => err_code(&err),
        }
    })
}

#[no_mangle]
pub unsafe extern "C" fn maany_mpc_sign_free(sign: *mut maany_mpc_sign_t) {
    if sign.is_null() {
        return;
    }
    drop(Box::from_raw(sign));
}

/// Refresh reuses the DKG session type: drive the returned handle with
/// `maany_mpc_dkg_step` and materialize the new share with
/// `maany_mpc_dkg_finalize`.
#[no_mangle]
pub unsafe extern "C" fn maany_mpc_refresh_new(
    ctx: *mut maany_mpc_ctx_t,
    kp: *const maany_mpc_keypair_t,
    opts: *const maany_mpc_refresh_opts_t,
    out_refresh: *mut *mut maany_mpc_dkg_t,
) -> maany_mpc_error_t {
    if ctx.is_null() || kp.is_null() || out_refresh.is_null() {
        return MAANY_MPC_ERR_INVALID_ARG;
    }
    guarded(|| unsafe {
        let mut parsed = RefreshOptions::default();
        if !opts.is_null() {
            parsed.session_id = match buf_as_slice(&(*opts).session_id) {
                Ok(bytes) => bytes.unwrap_or(&[]).to_vec(),
                Err(code) => return code,
            };
        }
        match (*ctx).ctx.refresh(&(*kp).keypair, parsed) {
            Ok(session) => {
                *out_refresh = Box::into_raw(Box::new(maany_mpc_dkg_t { session }));
                MAANY_MPC_OK
            }
            Err(err) => err_code(&err),
        }
    })
}

#[no_mangle]
pub unsafe extern "C" fn maany_mpc_backup_create(
    ctx: *mut maany_mpc_ctx_t,
    kp: *const maany_mpc_keypair_t,
    threshold: u16,
    share_count: u16,
    label: *const maany_mpc_buf_t,
    out_ciphertext: *mut maany_mpc_buf_t,
    out_shares: *mut maany_mpc_buf_t,
) -> maany_mpc_error_t {
    if ctx.is_null() || kp.is_null() || out_ciphertext.is_null() || out_shares.is_null() {
        return MAANY_MPC_ERR_INVALID_ARG;
    }
    guarded(|| unsafe {
        let ctx = &*ctx;
        let label = match buf_as_slice(label) {
            Ok(bytes) => bytes.unwrap_or(&[]).to_vec(),
            Err(code) => return code,
        };
        let (ciphertext, shares) =
            match ctx
                .ctx
                .backup_create(&(*kp).keypair, threshold, share_count, &label)
            {
                Ok(out) => out,
                Err(err) => return err_code(&err),
            };

        let code = ctx.alloc.alloc_copy(&ciphertext.to_bytes(), out_ciphertext);
        if code != MAANY_MPC_OK {
            return code;
        }
        for (i, share) in shares.iter().enumerate() {
            let slot = out_shares.add(i);
            let code = ctx.alloc.alloc_copy(share.as_bytes(), slot);
            if code != MAANY_MPC_OK {
                for j in 0..i {
                    ctx.alloc.release(out_shares.add(j));
                }
                ctx.alloc.release(out_ciphertext);
                return code;
            }
        }
        MAANY_MPC_OK
    })
}

#[no_mangle]
pub unsafe extern "C" fn maany_mpc_backup_restore(
    ctx: *mut maany_mpc_ctx_t,
    ciphertext: *const maany_mpc_buf_t,
    shares: *const maany_mpc_buf_t,
    share_count: usize,
    out_kp: *mut *mut maany_mpc_keypair_t,
) -> maany_mpc_error_t {
    if ctx.is_null() || ciphertext.is_null() || out_kp.is_null() {
        return MAANY_MPC_ERR_INVALID_ARG;
    }
    if share_count > 0 && shares.is_null() {
        return MAANY_MPC_ERR_INVALID_ARG;
    }
    guarded(|| unsafe {
        let blob = match buf_as_slice(ciphertext) {
            Ok(Some(blob)) => blob,
            Ok(None) => return MAANY_MPC_ERR_INVALID_ARG,
            Err(code) => return code,
        };
        let parsed = match BackupCiphertext::from_bytes(blob) {
            Ok(parsed) => parsed,
            Err(err) => return err_code(&err),
        };

        let mut parsed_shares = Vec::with_capacity(share_count);
        for i in 0..share_count {
            match buf_as_slice(shares.add(i)) {
                Ok(Some(bytes)) => parsed_shares.push(BackupShare::from_bytes(bytes)),
                Ok(None) => return MAANY_MPC_ERR_INVALID_ARG,
                Err(code) => return code,
            }
        }

        match (*ctx).ctx.backup_restore(&parsed, &parsed_shares) {
            Ok(keypair) => {
                *out_kp = Box::into_raw(Box::new(maany_mpc_keypair_t { keypair }));
                MAANY_MPC_OK
            }
            Err(err) => err_code(&err),
        }
    })
}

#[no_mangle]
pub unsafe extern "C" fn maany_mpc_free(p: *mut c_void) {
    if p.is_null() {
        return;
    }
    libc::free(p);
}

#[no_mangle]
pub unsafe extern "C" fn maany_mpc_secure_zero(p: *mut c_void, n: usize) {
    if p.is_null() {
        return;
    }
    default_secure_zero(p as *mut u8, n);
}

#[cfg(test)]
mod tests {
    use super::*;

    const NO_BUF: maany_mpc_buf_t = maany_mpc_buf_t {
        data: std::ptr::null_mut(),
        len: 0,
    };

    unsafe fn take_buf(ctx: *mut maany_mpc_ctx_t, buf: &mut maany_mpc_buf_t) -> Vec<u8> {
        let out = std::slice::from_raw_parts(buf.data, buf.len).to_vec();
        maany_mpc_buf_free(ctx, buf);
        out
    }

    #[test]
    fn version_and_error_strings() {
        let version = maany_mpc_version();
        assert_eq!((version.major, version.minor, version.patch), (1, 0, 0));

        unsafe {
            let ok = std::ffi::CStr::from_ptr(maany_mpc_error_string(MAANY_MPC_OK));
            assert_eq!(ok.to_str().unwrap(), "ok");
            let arg = std::ffi::CStr::from_ptr(maany_mpc_error_string(MAANY_MPC_ERR_INVALID_ARG));
            assert_eq!(arg.to_str().unwrap(), "invalid argument");
        }
    }

    #[test]
    fn null_arguments_are_rejected_cleanly() {
        unsafe {
            let ctx = maany_mpc_init(std::ptr::null());
            assert!(!ctx.is_null());
            assert_eq!(
                maany_mpc_dkg_new(
                    std::ptr::null_mut(),
                    std::ptr::null(),
                    std::ptr::null_mut()
                ),
                MAANY_MPC_ERR_INVALID_ARG
            );
            assert_eq!(
                maany_mpc_kp_import(ctx, std::ptr::null(), std::ptr::null_mut()),
                MAANY_MPC_ERR_INVALID_ARG
            );
            maany_mpc_shutdown(std::ptr::null_mut());
            maany_mpc_shutdown(ctx);
        }
    }

    #[test]
    fn full_dkg_through_the_flat_surface() {
        unsafe {
            let ctx = maany_mpc_init(std::ptr::null());
            assert!(!ctx.is_null());

            let mut opts = maany_mpc_dkg_opts_t {
                curve: 0,
                scheme: 0,
                kind: 0,
                key_id_hint: maany_mpc_key_id_t { bytes: [0; 32] },
                session_id: NO_BUF,
            };
            let mut device: *mut maany_mpc_dkg_t = std::ptr::null_mut();
            assert_eq!(maany_mpc_dkg_new(ctx, &opts, &mut device), MAANY_MPC_OK);
            opts.kind = 1;
            let mut server: *mut maany_mpc_dkg_t = std::ptr::null_mut();
            assert_eq!(maany_mpc_dkg_new(ctx, &opts, &mut server), MAANY_MPC_OK);

            let (device_kp, server_kp) = {
                let mut to_device: Option<Vec<u8>> = None;
                let mut to_server: Option<Vec<u8>> = None;
                for _ in 0..32 {
                    let mut out = NO_BUF;
                    let mut state = MAANY_MPC_STEP_CONTINUE;
                    let inbound = to_device.take();
                    let inbuf = inbound.as_ref().map(|m| maany_mpc_buf_t {
                        data: m.as_ptr() as *mut u8,
                        len: m.len(),
                    });
                    let code = maany_mpc_dkg_step(
                        ctx,
                        device,
                        inbuf.as_ref().map_or(std::ptr::null(), |b| b as *const _),
                        &mut out,
                        &mut state,
                    );
                    assert_eq!(code, MAANY_MPC_OK);
                    if !out.data.is_null() {
                        to_server = Some(take_buf(ctx, &mut out));
                    }
                    let device_done = state == MAANY_MPC_STEP_DONE;

                    let mut out = NO_BUF;
                    let mut state = MAANY_MPC_STEP_CONTINUE;
                    let inbound = to_server.take();
                    let inbuf = inbound.as_ref().map(|m| maany_mpc_buf_t {
                        data: m.as_ptr() as *mut u8,
                        len: m.len(),
                    });
                    let code = maany_mpc_dkg_step(
                        ctx,
                        server,
                        inbuf.as_ref().map_or(std::ptr::null(), |b| b as *const _),
                        &mut out,
                        &mut state,
                    );
                    assert_eq!(code, MAANY_MPC_OK);
                    if !out.data.is_null() {
                        to_device = Some(take_buf(ctx, &mut out));
                    }
                    let server_done = state == MAANY_MPC_STEP_DONE;

                    if device_done && server_done && to_device.is_none() && to_server.is_none() {
                        break;
                    }
                }

                let mut device_kp: *mut maany_mpc_keypair_t = std::ptr::null_mut();
                assert_eq!(
                    maany_mpc_dkg_finalize(ctx, device, &mut device_kp),
                    MAANY_MPC_OK
                );
                let mut server_kp: *mut maany_mpc_keypair_t = std::ptr::null_mut();
                assert_eq!(
                    maany_mpc_dkg_finalize(ctx, server, &mut server_kp),
                    MAANY_MPC_OK
                );
                (device_kp, server_kp)
            };
            maany_mpc_dkg_free(device);
            maany_mpc_dkg_free(server);

            let mut device_pub = maany_mpc_pubkey_t {
                curve: 99,
                pubkey: NO_BUF,
            };
            assert_eq!(
                maany_mpc_kp_pubkey(ctx, device_kp, &mut device_pub),
                MAANY_MPC_OK
            );
            let mut server_pub = maany_mpc_pubkey_t {
                curve: 99,
                pubkey: NO_BUF,
            };
            assert_eq!(
                maany_mpc_kp_pubkey(ctx, server_kp, &mut server_pub),
                MAANY_MPC_OK
            );
            assert_eq!(device_pub.curve, 0);
            let device_pub_bytes = take_buf(ctx, &mut device_pub.pubkey);
            let server_pub_bytes = take_buf(ctx, &mut server_pub.pubkey);
            assert_eq!(device_pub_bytes, server_pub_bytes);
            assert_eq!(device_pub_bytes.len(), 33);

            let mut meta = maany_mpc_kp_meta_t {
                kind: 9,
                curve: 9,
                scheme: 9,
                key_id: maany_mpc_key_id_t { bytes: [1; 32] },
            };
            assert_eq!(maany_mpc_kp_meta(ctx, device_kp, &mut meta), MAANY_MPC_OK);
            assert_eq!(meta.kind, 0);
            assert_eq!(meta.curve, 0);
            assert_eq!(meta.scheme, 0);
            assert_eq!(meta.key_id.bytes, [0u8; 32]);

            maany_mpc_kp_free(device_kp);
            maany_mpc_kp_free(server_kp);
            maany_mpc_shutdown(ctx);
        }
    }
}
