//! Reference adapter for `app::lock::Lock`.
//!
//! Same nested-lock-map idiom as `infra::store::in_memory::InMemoryStore`:
//! a `tokio::sync::Mutex` guarding a `HashMap` of per-key
//! `Arc<tokio::sync::Mutex<()>>`, each held for the duration of the caller's
//! critical section. Only usable within a single process — the spec's
//! "across processes" requirement is satisfied by a real adapter (e.g. an
//! advisory database lock) behind the same `Lock` trait.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio_util::sync::CancellationToken;

use crate::app::lock::{Lock, LockGuard};

#[derive(Default)]
pub struct InMemoryLock {
    keys: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl InMemoryLock {
    pub fn new() -> Self {
        Self::default()
    }

    async fn key_mutex(&self, key: &str) -> Arc<Mutex<()>> {
        let mut keys = self.keys.lock().await;
        keys.entry(key.to_string()).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
    }

    fn guard_from(key: &str, ctx: CancellationToken, held: OwnedMutexGuard<()>) -> LockGuard {
        LockGuard::new(key, ctx, Box::new(move || drop(held)))
    }
}

#[async_trait::async_trait]
impl Lock for InMemoryLock {
    async fn lock(&self, ctx: CancellationToken, key: &str) -> LockGuard {
        let mutex = self.key_mutex(key).await;
        let held = mutex.lock_owned().await;
        Self::guard_from(key, ctx, held)
    }

    async fn try_lock(&self, ctx: CancellationToken, key: &str) -> Option<LockGuard> {
        let mutex = self.key_mutex(key).await;
        match mutex.try_lock_owned() {
            Ok(held) => Some(Self::guard_from(key, ctx, held)),
            Err(_) => {
                ctx.cancel();
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn try_lock_fails_while_held() {
        let lock = InMemoryLock::new();
        let guard = lock.lock(CancellationToken::new(), "update/osv").await;

        let second = lock.try_lock(CancellationToken::new(), "update/osv").await;
        assert!(second.is_none());

        guard.release();
        let third = lock.try_lock(CancellationToken::new(), "update/osv").await;
        assert!(third.is_some());
    }

    #[tokio::test]
    async fn distinct_keys_do_not_contend() {
        let lock = InMemoryLock::new();
        let a = lock.try_lock(CancellationToken::new(), "update/osv").await;
        let b = lock.try_lock(CancellationToken::new(), "update/nvd").await;

        assert!(a.is_some());
        assert!(b.is_some());
    }
}
