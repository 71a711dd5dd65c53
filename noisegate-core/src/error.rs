//! Engine errors.
//!
//! Each variant corresponds to exactly one host-visible status code. Display
//! strings are deliberately terse and leak no key or transcript detail.

use thiserror::Error;

/// Errors produced by the session engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A caller-supplied argument was rejected before any protocol work.
    #[error("invalid parameter")]
    InvalidParameter,

    /// The Noise handshake could not proceed.
    #[error("handshake failed")]
    HandshakeFailed,

    /// Transport-phase encryption failed.
    #[error("encryption failed")]
    EncryptionFailed,

    /// Transport-phase decryption or tag verification failed.
    #[error("decryption failed")]
    DecryptionFailed,

    /// The destination slice cannot hold the operation's output.
    #[error("output buffer too small: need {needed}, have {available}")]
    BufferTooSmall {
        /// Bytes the operation needs to write.
        needed: usize,
        /// Capacity of the destination slice.
        available: usize,
    },

    /// The operation is not valid in the session's current phase.
    #[error("invalid state: {0}")]
    InvalidState(&'static str),

    /// Any other failure reported by the underlying Noise implementation.
    #[error("protocol error: {0}")]
    Protocol(#[from] snow::Error),
}

/// Engine result alias.
pub type Result<T> = std::result::Result<T, EngineError>;
