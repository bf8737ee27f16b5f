//! named, reentrant-free exclusive locks across processes.

use std::panic::Location;

use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Held by the caller of [`Lock::lock`]/[`Lock::try_lock`]. `Unlock` is
/// implicit in dropping this guard (§4.7: "Unlock is implicit in calling
/// cancel").
///
/// Per §9's "finalizer-based misuse detection" design note, a debug build
/// logs a warning if the guard is dropped without `release()` ever being
/// called explicitly and the lock's cancellation token was not already
/// canceled by the lock service itself (i.e. it looks like the holder simply
/// forgot to release it). This is a loud, non-panicking signal: the teacher
/// never panics from a `Drop` impl, and this engine follows the same rule.
pub struct LockGuard {
    key: String,
    ctx: CancellationToken,
    released: bool,
    #[cfg_attr(not(debug_assertions), allow(dead_code))]
    acquired_at: &'static Location<'static>,
    release_fn: Box<dyn FnOnce() + Send>,
}

impl LockGuard {
    #[track_caller]
    pub fn new(key: impl Into<String>, ctx: CancellationToken, release_fn: Box<dyn FnOnce() + Send>) -> Self {
        Self {
            key: key.into(),
            ctx,
            released: false,
            acquired_at: Location::caller(),
            release_fn,
        }
    }

    /// The context handed to the lock holder; canceled if the lock is lost.
    pub fn ctx(&self) -> &CancellationToken {
        &self.ctx
    }

    /// Explicitly releases the lock. Idempotent.
    pub fn release(mut self) {
        self.do_release();
    }

    fn do_release(&mut self) {
        if !self.released {
            self.released = true;
            let release_fn = std::mem::replace(&mut self.release_fn, Box::new(|| {}));
            release_fn();
            self.ctx.cancel();
        }
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if !self.released {
            #[cfg(debug_assertions)]
            warn!(
                key = %self.key,
                acquired_at = %self.acquired_at,
                "lock guard dropped without an explicit release; likely a leak"
            );
            self.do_release();
        }
    }
}

/// Port for C9. `Lock` is not reentrant: a second call for the same
/// key from the same or a different holder blocks (or, for `try_lock`,
/// fails) until the first is released.
#[async_trait::async_trait]
pub trait Lock: Send + Sync {
    /// Blocks until the named lock is acquired exclusively.
    async fn lock(&self, ctx: CancellationToken, key: &str) -> LockGuard;

    /// Returns immediately. If the lock could not be acquired, the returned
    /// guard's context is already canceled.
    async fn try_lock(&self, ctx: CancellationToken, key: &str) -> Option<LockGuard>;
}
