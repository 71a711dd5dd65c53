//! Session handle registry.
//!
//! Maps opaque `u64` handles to live sessions. Handle `0` is the null
//! sentinel and is never issued; values come from a monotone counter and are
//! never reused within a process, so a destroyed handle can never collide
//! with a live one and post-destroy use fails cleanly.
//!
//! The registry lock is held only for the map lookup; operations on distinct
//! handles proceed independently, while operations on one handle serialize on
//! its slot mutex.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

use noisegate_core::NoiseSession;

use crate::status::ErrorCode;

/// Host-visible session handle. Zero is the null sentinel.
pub(crate) type SessionHandle = u64;

/// A live session paired with its per-session error slot.
pub(crate) struct SessionSlot {
    /// The owned engine instance.
    pub(crate) engine: NoiseSession,
    /// Status of the most recent fallible operation on this handle.
    pub(crate) last_error: ErrorCode,
}

pub(crate) struct Registry {
    sessions: Mutex<HashMap<SessionHandle, Arc<Mutex<SessionSlot>>>>,
    next_handle: AtomicU64,
}

static REGISTRY: OnceLock<Registry> = OnceLock::new();

impl Registry {
    pub(crate) fn global() -> &'static Registry {
        REGISTRY.get_or_init(|| Registry {
            sessions: Mutex::new(HashMap::new()),
            next_handle: AtomicU64::new(1),
        })
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<SessionHandle, Arc<Mutex<SessionSlot>>>> {
        // A panic must never cross the C ABI; a poisoned map is still
        // structurally sound, so the poison flag is ignored.
        self.sessions.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register a freshly created engine, returning its non-zero handle.
    pub(crate) fn insert(&self, engine: NoiseSession) -> SessionHandle {
        let handle = self.next_handle.fetch_add(1, Ordering::Relaxed);
        let slot = Arc::new(Mutex::new(SessionSlot {
            engine,
            last_error: ErrorCode::Success,
        }));
        self.sessions().insert(handle, slot);
        handle
    }

    /// Look up a handle. Zero fails fast without touching the table.
    pub(crate) fn resolve(&self, handle: SessionHandle) -> Option<Arc<Mutex<SessionSlot>>> {
        if handle == 0 {
            return None;
        }
        self.sessions().get(&handle).cloned()
    }

    /// Detach a handle from the table, returning its slot for disposal.
    pub(crate) fn remove(&self, handle: SessionHandle) -> Option<Arc<Mutex<SessionSlot>>> {
        if handle == 0 {
            return None;
        }
        self.sessions().remove(&handle)
    }
}
