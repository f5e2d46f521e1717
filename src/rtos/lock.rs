//! Single-bit test-and-set lock, safe to share between the main loop and
//! interrupt handlers.

use core::sync::atomic::{AtomicBool, Ordering};

/// Mutual exclusion flag for one guarded resource.
///
/// The AVR has no compare-and-swap, so [`obtain`](Lock::obtain) runs its
/// test-and-set inside a critical section. There is no blocking acquire:
/// callers that need to wait poll from the main loop.
pub struct Lock {
    held: AtomicBool,
}

impl Lock {
    pub const fn new() -> Self {
        Self {
            held: AtomicBool::new(false),
        }
    }

    /// Take the lock if it is free.
    ///
    /// Returns `false` when someone else holds it. That is the normal
    /// "already in progress" answer, not an error.
    pub fn obtain(&self) -> bool {
        critical_section::with(|_| {
            if self.held.load(Ordering::Relaxed) {
                false
            } else {
                self.held.store(true, Ordering::Relaxed);
                true
            }
        })
    }

    /// Release the lock unconditionally.
    #[inline]
    pub fn release(&self) {
        self.held.store(false, Ordering::Release);
    }

    /// Current state, for diagnostics only.
    ///
    /// `check()` followed by `obtain()` is not atomic; never use it to decide
    /// whether to take the lock.
    #[inline]
    pub fn check(&self) -> bool {
        self.held.load(Ordering::Acquire)
    }

    /// Take the lock for the lifetime of the returned guard.
    pub fn try_lock(&self) -> Option<LockGuard<'_>> {
        if self.obtain() {
            Some(LockGuard { lock: self })
        } else {
            None
        }
    }
}

impl Default for Lock {
    fn default() -> Self {
        Self::new()
    }
}

/// Releases its [`Lock`] on drop.
pub struct LockGuard<'a> {
    lock: &'a Lock,
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        self.lock.release();
    }
}
