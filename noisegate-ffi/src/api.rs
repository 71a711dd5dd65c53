//! The C host surface.
//!
//! Every operation resolves its handle first — the null sentinel and unknown
//! handles fail fast without touching any session state — then records its
//! resulting status, success included, in the session's last-error slot
//! before returning. Failure reaches the host as the zero handle, the null
//! buffer, or a status code; nothing is ever retried internally.

use std::sync::{Mutex, MutexGuard};

use libc::{c_char, c_int, size_t};
use tracing::debug;

use noisegate_core::{Mode, NoiseSession, MAX_MESSAGE_LEN, MAX_PAYLOAD_LEN, TAG_LEN};

use crate::marshal::{self, ByteBuffer};
use crate::registry::{Registry, SessionHandle, SessionSlot};
use crate::status::ErrorCode;

fn lock_slot(slot: &Mutex<SessionSlot>) -> MutexGuard<'_, SessionSlot> {
    slot.lock().unwrap_or_else(|e| e.into_inner())
}

/// Resolve `handle`, run `op` against its engine, and record the resulting
/// status in the slot before returning.
fn with_slot<F>(handle: SessionHandle, op: F) -> ByteBuffer
where
    F: FnOnce(&mut NoiseSession) -> Result<ByteBuffer, ErrorCode>,
{
    let Some(slot) = Registry::global().resolve(handle) else {
        return ByteBuffer::null();
    };
    let mut slot = lock_slot(&slot);
    match op(&mut slot.engine) {
        Ok(buf) => {
            slot.last_error = ErrorCode::Success;
            buf
        }
        Err(code) => {
            slot.last_error = code;
            ByteBuffer::null()
        }
    }
}

fn register(engine: NoiseSession) -> SessionHandle {
    let handle = Registry::global().insert(engine);
    debug!(handle, "session created");
    handle
}

fn create(mode: Mode) -> SessionHandle {
    match NoiseSession::new(mode) {
        Ok(engine) => register(engine),
        Err(_) => 0,
    }
}

unsafe fn create_with_key(key: *const u8, key_len: size_t, mode: Mode) -> SessionHandle {
    // Malformed key material is rejected before anything inspects it.
    let Some(key) = marshal::host_slice(key, key_len) else {
        return 0;
    };
    let Ok(key) = <&[u8; 32]>::try_from(key) else {
        return 0;
    };
    match NoiseSession::with_private_key(key, mode) {
        Ok(engine) => register(engine),
        Err(_) => 0,
    }
}

/// Create an initiator session with a fresh static keypair.
///
/// Returns the session handle, or 0 on failure.
#[no_mangle]
pub extern "C" fn noisegate_session_new_initiator() -> u64 {
    create(Mode::Initiator)
}

/// Create a responder session with a fresh static keypair.
///
/// Returns the session handle, or 0 on failure.
#[no_mangle]
pub extern "C" fn noisegate_session_new_responder() -> u64 {
    create(Mode::Responder)
}

/// Create an initiator session bound to a 32-byte static private key.
///
/// Any other key length is rejected before the engine is consulted. Returns
/// the session handle, or 0 on failure.
///
/// # Safety
///
/// A non-null `private_key` must point to `private_key_len` readable bytes.
#[no_mangle]
pub unsafe extern "C" fn noisegate_session_new_initiator_with_key(
    private_key: *const u8,
    private_key_len: size_t,
) -> u64 {
    create_with_key(private_key, private_key_len, Mode::Initiator)
}

/// Create a responder session bound to a 32-byte static private key.
///
/// Any other key length is rejected before the engine is consulted. Returns
/// the session handle, or 0 on failure.
///
/// # Safety
///
/// A non-null `private_key` must point to `private_key_len` readable bytes.
#[no_mangle]
pub unsafe extern "C" fn noisegate_session_new_responder_with_key(
    private_key: *const u8,
    private_key_len: size_t,
) -> u64 {
    create_with_key(private_key, private_key_len, Mode::Responder)
}

/// Destroy a session, releasing the engine instance and its handle.
///
/// No-op for the null sentinel. Must be called exactly once per live handle;
/// the handle value is never reissued, so later use of it fails cleanly.
#[no_mangle]
pub extern "C" fn noisegate_session_free(handle: u64) {
    if Registry::global().remove(handle).is_some() {
        debug!(handle, "session destroyed");
    }
}

/// Whether the session's handshake has completed.
///
/// Returns 1 once the session is in the transport phase, 0 before, and 0 for
/// null or unknown handles.
#[no_mangle]
pub extern "C" fn noisegate_is_handshake_complete(handle: u64) -> c_int {
    match Registry::global().resolve(handle) {
        Some(slot) => c_int::from(lock_slot(&slot).engine.is_handshake_complete()),
        None => 0,
    }
}

/// The session's static public key (32 bytes).
///
/// Available in every phase. Returns the null buffer for null or unknown
/// handles.
#[no_mangle]
pub extern "C" fn noisegate_public_key(handle: u64) -> ByteBuffer {
    with_slot(handle, |engine| {
        let key = engine.public_key();
        marshal::export(key, key.len())
    })
}

/// The peer's static public key (32 bytes).
///
/// Available once the handshake completes; before that the call fails with
/// `INVALID_STATE`.
#[no_mangle]
pub extern "C" fn noisegate_remote_static(handle: u64) -> ByteBuffer {
    with_slot(handle, |engine| {
        let key = engine.remote_static().ok_or(ErrorCode::InvalidState)?;
        marshal::export(key, key.len())
    })
}

/// Produce the next handshake message, carrying an optional payload.
///
/// `payload` may be null, meaning no payload. Payloads over
/// `noisegate_max_payload_len()` fail with `BUFFER_TOO_SMALL`. Returns the
/// message to send, or the null buffer on failure.
///
/// # Safety
///
/// A non-null `payload` must point to `payload_len` readable bytes.
#[no_mangle]
pub unsafe extern "C" fn noisegate_write_message(
    handle: u64,
    payload: *const u8,
    payload_len: size_t,
) -> ByteBuffer {
    // The one permitted null input: an absent payload is an empty payload.
    let payload = marshal::host_slice(payload, payload_len).unwrap_or(&[]);
    with_slot(handle, |engine| {
        marshal::check_max(payload.len(), MAX_PAYLOAD_LEN)?;
        let mut out = marshal::scratch(MAX_MESSAGE_LEN)?;
        let written = engine
            .write_message(payload, &mut out[..])
            .map_err(|e| ErrorCode::from(&e))?;
        marshal::export(&out, written)
    })
}

/// Consume a peer handshake message, returning its payload (possibly empty).
///
/// Messages over `noisegate_max_message_len()` fail with `BUFFER_TOO_SMALL`.
/// Returns the null buffer on failure.
///
/// # Safety
///
/// A non-null `message` must point to `message_len` readable bytes.
#[no_mangle]
pub unsafe extern "C" fn noisegate_read_message(
    handle: u64,
    message: *const u8,
    message_len: size_t,
) -> ByteBuffer {
    let message = marshal::host_slice(message, message_len);
    with_slot(handle, |engine| {
        let message = message.ok_or(ErrorCode::InvalidParameter)?;
        marshal::check_max(message.len(), MAX_MESSAGE_LEN)?;
        let mut out = marshal::scratch(MAX_MESSAGE_LEN)?;
        let written = engine
            .read_message(message, &mut out[..])
            .map_err(|e| ErrorCode::from(&e))?;
        marshal::export(&out, written)
    })
}

/// Encrypt application data.
///
/// The ciphertext is exactly `plaintext_len + noisegate_tag_len()` bytes.
/// Valid only after the handshake completes. Returns the null buffer on
/// failure.
///
/// # Safety
///
/// A non-null `plaintext` must point to `plaintext_len` readable bytes.
#[no_mangle]
pub unsafe extern "C" fn noisegate_encrypt(
    handle: u64,
    plaintext: *const u8,
    plaintext_len: size_t,
) -> ByteBuffer {
    let plaintext = marshal::host_slice(plaintext, plaintext_len);
    with_slot(handle, |engine| {
        let plaintext = plaintext.ok_or(ErrorCode::InvalidParameter)?;
        marshal::check_max(plaintext.len(), MAX_PAYLOAD_LEN)?;
        let mut out = marshal::scratch(plaintext.len() + TAG_LEN)?;
        let written = engine
            .encrypt(plaintext, &mut out[..])
            .map_err(|e| ErrorCode::from(&e))?;
        marshal::export(&out, written)
    })
}

/// Decrypt and authenticate application data.
///
/// The plaintext is at most `ciphertext_len` bytes. A failed authentication
/// yields `DECRYPTION_FAILED` and no partial output. Returns the null buffer
/// on failure.
///
/// # Safety
///
/// A non-null `ciphertext` must point to `ciphertext_len` readable bytes.
#[no_mangle]
pub unsafe extern "C" fn noisegate_decrypt(
    handle: u64,
    ciphertext: *const u8,
    ciphertext_len: size_t,
) -> ByteBuffer {
    let ciphertext = marshal::host_slice(ciphertext, ciphertext_len);
    with_slot(handle, |engine| {
        let ciphertext = ciphertext.ok_or(ErrorCode::InvalidParameter)?;
        marshal::check_max(ciphertext.len(), MAX_MESSAGE_LEN)?;
        let mut out = marshal::scratch(ciphertext.len())?;
        let written = engine
            .decrypt(ciphertext, &mut out[..])
            .map_err(|e| ErrorCode::from(&e))?;
        marshal::export(&out, written)
    })
}

/// The status recorded by the most recent fallible operation on `handle`.
///
/// Null and unknown handles yield `INVALID_PARAMETER` without consulting any
/// session.
#[no_mangle]
pub extern "C" fn noisegate_last_error(handle: u64) -> c_int {
    match Registry::global().resolve(handle) {
        Some(slot) => lock_slot(&slot).last_error as c_int,
        None => ErrorCode::InvalidParameter as c_int,
    }
}

/// Static description string for a status code.
///
/// Unknown codes map to `"Unknown error"` rather than failing.
#[no_mangle]
pub extern "C" fn noisegate_error_string(code: c_int) -> *const c_char {
    ErrorCode::describe(code)
}

/// Release a buffer previously returned by this library.
///
/// No-op for the null buffer.
///
/// # Safety
///
/// `buf` must have been returned by this library and not freed before.
#[no_mangle]
pub unsafe extern "C" fn noisegate_buffer_free(buf: ByteBuffer) {
    buf.free();
}

/// Maximum Noise message length in bytes.
#[no_mangle]
pub extern "C" fn noisegate_max_message_len() -> size_t {
    MAX_MESSAGE_LEN
}

/// Maximum payload length in bytes.
#[no_mangle]
pub extern "C" fn noisegate_max_payload_len() -> size_t {
    MAX_PAYLOAD_LEN
}

/// AEAD authentication tag length in bytes.
#[no_mangle]
pub extern "C" fn noisegate_tag_len() -> size_t {
    TAG_LEN
}
