//! noisegate host boundary.
//!
//! Exposes the `noisegate-core` session engine to non-Rust hosts through a
//! narrow C ABI:
//!
//! - Sessions are named by opaque `u64` handles issued from a process-wide
//!   registry; handle `0` is the null sentinel and every operation rejects it
//!   before touching any session state
//! - Byte buffers are copied across the boundary, never aliased: inbound host
//!   memory is only borrowed for the duration of one call, outbound data is
//!   returned in a fresh host-owned allocation released via
//!   `noisegate_buffer_free`
//! - Native errors are translated into a fixed nine-code status taxonomy,
//!   and every fallible operation records its resulting code in the
//!   session's last-error slot
//!
//! # Caller Contract
//!
//! Operations against a single handle must be serialized by the caller, and
//! `noisegate_session_free` must be called exactly once per live handle
//! (commonly from the host's finalization hook). Violations degrade to
//! blocking or a clean `INVALID_PARAMETER`, never to undefined behavior:
//! handles are never reused within a process, so a stale handle can never
//! collide with a live session.

#![deny(missing_docs)]

pub mod api;
pub mod marshal;
pub mod status;

mod registry;
