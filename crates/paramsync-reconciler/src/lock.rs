//! Named mutual exclusion for reconciliation passes and row mutations.
//!
//! The coordinator keeps one async mutex per key, stored as a `Weak` so an
//! entry dies with its last guard or waiter. Releasing a guard removes the
//! entry when nobody else references it, which keeps the table bounded by
//! the number of keys actually in use.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use dashmap::DashMap;
use paramsync_core::ScopeKey;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{trace, warn};

use crate::error::{ReconcileError, Result};

/// Purge dead entries every N acquisitions.
const PURGE_INTERVAL: usize = 64;

/// Table size below which purging is skipped.
const PURGE_THRESHOLD: usize = 128;

/// What a lock protects: a whole owner scope or a single row.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LockKey {
    Scope(ScopeKey),
    Entity(String),
}

impl fmt::Display for LockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scope(scope) => write!(f, "scope:{scope}"),
            Self::Entity(id) => write!(f, "entity:{id}"),
        }
    }
}

type LockTable = DashMap<LockKey, Weak<Mutex<()>>>;

/// Injectable lock registry shared by everything that mutates the mirror.
#[derive(Clone, Default)]
pub struct LockCoordinator {
    table: Arc<LockTable>,
    acquisitions: Arc<AtomicUsize>,
}

impl LockCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive access to all rows owned by `scope`.
    pub async fn lock_scope(&self, scope: &ScopeKey) -> LockGuard {
        self.acquire(LockKey::Scope(scope.clone())).await
    }

    /// Waits for exclusive access to a single row.
    pub async fn lock_entity(&self, id: &str) -> LockGuard {
        self.acquire(LockKey::Entity(id.to_string())).await
    }

    /// Like [`lock_scope`](Self::lock_scope) but gives up after `wait`.
    pub async fn lock_scope_timeout(&self, scope: &ScopeKey, wait: Duration) -> Result<LockGuard> {
        let key = LockKey::Scope(scope.clone());
        let mutex = self.mutex_for(&key);

        match tokio::time::timeout(wait, mutex.lock_owned()).await {
            Ok(guard) => Ok(self.guard(key, guard)),
            Err(_) => {
                release_entry(&self.table, &key);
                warn!(key = %key, waited_ms = wait.as_millis() as u64, "Lock wait timed out");
                Err(ReconcileError::LockTimeout {
                    key: key.to_string(),
                    waited: wait,
                })
            }
        }
    }

    pub async fn acquire(&self, key: LockKey) -> LockGuard {
        let mutex = self.mutex_for(&key);
        let guard = mutex.lock_owned().await;
        self.guard(key, guard)
    }

    /// Number of keys currently held or waited on.
    pub fn active_keys(&self) -> usize {
        self.table
            .iter()
            .filter(|entry| entry.value().strong_count() > 0)
            .count()
    }

    /// Returns `true` if some guard currently holds `key`.
    pub fn is_locked(&self, key: &LockKey) -> bool {
        self.table
            .get(key)
            .and_then(|weak| weak.upgrade())
            .is_some_and(|mutex| mutex.try_lock().is_err())
    }

    fn mutex_for(&self, key: &LockKey) -> Arc<Mutex<()>> {
        let mutex = {
            let mut entry = self.table.entry(key.clone()).or_default();
            match entry.upgrade() {
                Some(mutex) => mutex,
                None => {
                    let mutex = Arc::new(Mutex::new(()));
                    *entry = Arc::downgrade(&mutex);
                    mutex
                }
            }
        };

        let tick = self.acquisitions.fetch_add(1, Ordering::Relaxed);
        if self.table.len() > PURGE_THRESHOLD && tick.is_multiple_of(PURGE_INTERVAL) {
            self.table.retain(|_, weak| weak.strong_count() > 0);
        }
        mutex
    }

    fn guard(&self, key: LockKey, guard: OwnedMutexGuard<()>) -> LockGuard {
        trace!(key = %key, "Lock acquired");
        LockGuard {
            guard: Some(guard),
            key,
            table: Arc::clone(&self.table),
        }
    }
}

impl fmt::Debug for LockCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockCoordinator")
            .field("entries", &self.table.len())
            .finish()
    }
}

fn release_entry(table: &LockTable, key: &LockKey) {
    table.remove_if(key, |_, weak| weak.strong_count() == 0);
}

/// Holds a lock until dropped.
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct LockGuard {
    guard: Option<OwnedMutexGuard<()>>,
    key: LockKey,
    table: Arc<LockTable>,
}

impl LockGuard {
    pub fn key(&self) -> &LockKey {
        &self.key
    }
}

impl fmt::Debug for LockGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockGuard").field("key", &self.key).finish()
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        // The mutex Arc must be gone before the table entry is checked.
        drop(self.guard.take());
        release_entry(&self.table, &self.key);
        trace!(key = %self.key, "Lock released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use paramsync_core::OwnerId;
    use tokio_test::{assert_pending, assert_ready, task};

    fn scope(project: &str) -> ScopeKey {
        ScopeKey::new("elasticcacheparameters", OwnerId::project(project))
    }

    #[tokio::test]
    async fn test_same_key_blocks_until_release() {
        let locks = LockCoordinator::new();
        let key = scope("p-1");
        let first = locks.lock_scope(&key).await;

        let mut second = task::spawn(locks.lock_scope(&key));
        assert_pending!(second.poll());

        drop(first);
        assert!(second.is_woken());
        let guard = assert_ready!(second.poll());
        assert_eq!(guard.key(), &LockKey::Scope(key.clone()));
    }

    #[tokio::test]
    async fn test_different_keys_do_not_contend() {
        let locks = LockCoordinator::new();
        let (held, other) = (scope("p-1"), scope("p-2"));
        let _held = locks.lock_scope(&held).await;

        let mut other = task::spawn(locks.lock_scope(&other));
        let _other = assert_ready!(other.poll());

        let mut row = task::spawn(locks.lock_entity("row-1"));
        let _row = assert_ready!(row.poll());
        assert_eq!(locks.active_keys(), 3);
    }

    #[tokio::test]
    async fn test_entries_removed_after_release() {
        let locks = LockCoordinator::new();
        {
            let _scope = locks.lock_scope(&scope("p-1")).await;
            let _row = locks.lock_entity("row-1").await;
            assert_eq!(locks.active_keys(), 2);
            assert!(locks.is_locked(&LockKey::Entity("row-1".into())));
        }
        assert_eq!(locks.active_keys(), 0);
        assert_eq!(locks.table.len(), 0);
        assert!(!locks.is_locked(&LockKey::Entity("row-1".into())));
    }

    #[tokio::test]
    async fn test_entry_survives_while_waiter_pending() {
        let locks = LockCoordinator::new();
        let first = locks.lock_entity("row-1").await;
        let mut waiter = task::spawn(locks.lock_entity("row-1"));
        assert_pending!(waiter.poll());

        drop(first);
        assert_eq!(locks.active_keys(), 1);

        let second = assert_ready!(waiter.poll());
        drop(second);
        assert_eq!(locks.active_keys(), 0);
    }

    #[tokio::test]
    async fn test_timeout_reports_lock_key() {
        let locks = LockCoordinator::new();
        let _held = locks.lock_scope(&scope("p-1")).await;

        let err = locks
            .lock_scope_timeout(&scope("p-1"), Duration::from_millis(10))
            .await
            .unwrap_err();
        assert!(matches!(err, ReconcileError::LockTimeout { .. }));
        assert!(err.to_string().contains("scope:elasticcacheparameters:p-1"));
        assert_eq!(locks.active_keys(), 1);
    }
}
