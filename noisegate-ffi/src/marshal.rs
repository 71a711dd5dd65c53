//! Buffer marshaling across the host boundary.
//!
//! Host memory is never aliased into the engine: inbound bytes are borrowed
//! for the duration of a single call, outbound bytes are produced in a
//! native scratch buffer sized to the operation's documented maximum and
//! copied into a fresh host-owned allocation. Scratch buffers zeroize on
//! release, so plaintext never outlives the call that produced it.

use libc::size_t;
use zeroize::Zeroizing;

use crate::status::ErrorCode;

/// A host-owned byte sequence returned across the boundary.
///
/// A null `data` pointer is the failure sentinel; a successful empty result
/// has a non-null pointer and zero length. Ownership transfers to the host on
/// return and `noisegate_buffer_free` is the only release path.
#[repr(C)]
pub struct ByteBuffer {
    /// Start of the allocation, or null for the failure sentinel.
    pub data: *mut u8,
    /// Logical length. Always at most `cap`.
    pub len: size_t,
    /// Allocated capacity.
    pub cap: size_t,
}

impl ByteBuffer {
    /// The failure sentinel.
    pub const fn null() -> Self {
        Self {
            data: std::ptr::null_mut(),
            len: 0,
            cap: 0,
        }
    }

    /// Whether this is the failure sentinel.
    pub fn is_null(&self) -> bool {
        self.data.is_null()
    }

    /// Hand a vector's allocation to the host.
    pub(crate) fn from_vec(bytes: Vec<u8>) -> Self {
        let mut bytes = std::mem::ManuallyDrop::new(bytes);
        Self {
            data: bytes.as_mut_ptr(),
            len: bytes.len(),
            cap: bytes.capacity(),
        }
    }

    /// Reclaim an allocation previously handed out by [`ByteBuffer::from_vec`].
    ///
    /// No-op for the failure sentinel.
    ///
    /// # Safety
    ///
    /// `self` must have been produced by `from_vec` and must not have been
    /// freed before.
    pub(crate) unsafe fn free(self) {
        if self.data.is_null() {
            return;
        }
        drop(Vec::from_raw_parts(self.data, self.len, self.cap));
    }
}

/// Borrow an inbound host buffer.
///
/// Returns `None` for a null pointer; a zero length with a non-null pointer
/// is a valid empty input.
///
/// # Safety
///
/// A non-null `data` must point to `len` readable bytes that stay valid and
/// unmodified for the duration of the borrow.
pub(crate) unsafe fn host_slice<'a>(data: *const u8, len: size_t) -> Option<&'a [u8]> {
    if data.is_null() {
        None
    } else if len == 0 {
        Some(&[])
    } else {
        Some(std::slice::from_raw_parts(data, len))
    }
}

/// Reject inputs beyond an operation's documented maximum.
///
/// The maxima are authoritative: there is no probe or resize path.
pub(crate) fn check_max(len: usize, max: usize) -> Result<(), ErrorCode> {
    if len > max {
        Err(ErrorCode::BufferTooSmall)
    } else {
        Ok(())
    }
}

/// Allocate a zeroizing scratch buffer of `cap` bytes for the engine to
/// write into.
///
/// Allocation failure is reported as `OutOfMemory` rather than aborting the
/// host process.
pub(crate) fn scratch(cap: usize) -> Result<Zeroizing<Vec<u8>>, ErrorCode> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(cap).map_err(|_| ErrorCode::OutOfMemory)?;
    buf.resize(cap, 0);
    Ok(Zeroizing::new(buf))
}

/// Copy the engine-written prefix of a scratch buffer into a fresh
/// host-owned buffer.
///
/// Only the first `len` bytes cross the boundary; the scratch itself never
/// does.
pub(crate) fn export(src: &[u8], len: usize) -> Result<ByteBuffer, ErrorCode> {
    let mut out = Vec::new();
    out.try_reserve_exact(len).map_err(|_| ErrorCode::OutOfMemory)?;
    out.extend_from_slice(&src[..len]);
    Ok(ByteBuffer::from_vec(out))
}
