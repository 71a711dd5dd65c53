//! Host-visible status codes.
//!
//! The discriminants are ABI: hosts branch on the raw integers, so the
//! values are fixed and must never be renumbered.

use libc::{c_char, c_int};

use noisegate_core::EngineError;

/// Status of a boundary operation.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Operation completed.
    Success = 0,
    /// A null handle, null input, or malformed argument was rejected at the
    /// boundary.
    InvalidParameter = 1,
    /// A scratch or output allocation failed.
    OutOfMemory = 2,
    /// The Noise handshake failed.
    HandshakeFailed = 3,
    /// Transport-phase encryption failed.
    EncryptionFailed = 4,
    /// Transport-phase decryption or tag verification failed.
    DecryptionFailed = 5,
    /// An input or output exceeded the operation's documented maximum.
    BufferTooSmall = 6,
    /// The operation is not valid in the session's current phase.
    InvalidState = 7,
    /// Any other protocol-level failure.
    ProtocolError = 8,
}

impl ErrorCode {
    /// Static NUL-terminated description for a raw status code.
    ///
    /// Pure and stateless; unknown codes map to a generic string rather than
    /// failing.
    pub(crate) fn describe(code: c_int) -> *const c_char {
        match code {
            0 => b"Success\0".as_ptr() as *const c_char,
            1 => b"Invalid parameter\0".as_ptr() as *const c_char,
            2 => b"Out of memory\0".as_ptr() as *const c_char,
            3 => b"Handshake failed\0".as_ptr() as *const c_char,
            4 => b"Encryption failed\0".as_ptr() as *const c_char,
            5 => b"Decryption failed\0".as_ptr() as *const c_char,
            6 => b"Buffer too small\0".as_ptr() as *const c_char,
            7 => b"Invalid state\0".as_ptr() as *const c_char,
            8 => b"Protocol error\0".as_ptr() as *const c_char,
            _ => b"Unknown error\0".as_ptr() as *const c_char,
        }
    }
}

impl From<&EngineError> for ErrorCode {
    fn from(err: &EngineError) -> Self {
        match err {
            EngineError::InvalidParameter => ErrorCode::InvalidParameter,
            EngineError::HandshakeFailed => ErrorCode::HandshakeFailed,
            EngineError::EncryptionFailed => ErrorCode::EncryptionFailed,
            EngineError::DecryptionFailed => ErrorCode::DecryptionFailed,
            EngineError::BufferTooSmall { .. } => ErrorCode::BufferTooSmall,
            EngineError::InvalidState(_) => ErrorCode::InvalidState,
            EngineError::Protocol(_) => ErrorCode::ProtocolError,
        }
    }
}
