//! noisegate protocol core.
//!
//! A thin, safe wrapper around the `snow` Noise implementation, providing the
//! session engine the boundary crate is built on:
//!
//! - Noise_XX sessions with fresh or caller-supplied static keys
//! - Output-buffer operations that return the written length
//! - A one-way handshake → transport transition
//! - Key material that zeroizes on drop
//!
//! # Security Invariants
//!
//! - Phase misuse is an error, never silently tolerated: handshake operations
//!   fail after the handshake completes, transport operations fail before
//! - Any authentication failure is terminal for that operation and is never
//!   retried internally
//! - Direct use of `unsafe` is forbidden (#![forbid(unsafe_code)])

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::panic))]

pub mod error;
pub mod session;

pub use error::{EngineError, Result};
pub use session::{Mode, NoiseSession, MAX_MESSAGE_LEN, MAX_PAYLOAD_LEN, PATTERN, TAG_LEN};
