//! Process-wide session slot
//!
//! Holds at most one live session plus a busy flag that serializes
//! initialization attempts. Nothing here persists: a restarted process
//! always begins with an empty slot.
//!
//! The store is an explicit object owned by the facade (or whatever
//! composition root the embedder uses), not a hidden module-level global.

use super::backend::Session;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Single mutable session slot with a non-blocking lock.
///
/// Cloning shares the underlying slot (same semantics as cloning the
/// backend clients elsewhere in this crate).
#[derive(Clone, Default)]
pub struct SessionStore {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    current: Mutex<Option<Arc<Session>>>,
    locked: AtomicBool,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Non-blocking test-and-set. Returns true if this caller now holds
    /// the initialization lock.
    pub fn try_lock(&self) -> bool {
        self.inner
            .locked
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Release the initialization lock.
    pub fn unlock(&self) {
        self.inner.locked.store(false, Ordering::Release);
    }

    /// Whether an initialization currently holds the lock.
    pub fn is_locked(&self) -> bool {
        self.inner.locked.load(Ordering::Acquire)
    }

    /// Current live session, if any.
    pub fn get(&self) -> Option<Arc<Session>> {
        self.inner
            .current
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Store the live session for this process.
    pub fn set(&self, session: Arc<Session>) {
        *self
            .inner
            .current
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(session);
    }

    /// Drop the stored session (explicit close).
    pub fn clear(&self) {
        *self
            .inner
            .current
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = None;
    }
}
