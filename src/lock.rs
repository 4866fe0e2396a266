//! Named non-blocking locks guarding crawl and harvest invocations
//!
//! A [`LockRegistry`] hands out one lock per key (`"{provider}-{crawl_type}"`).
//! Locks are created on first use and live as long as the registry. Callers
//! never wait: if another invocation already holds the key, the work is
//! skipped and [`LockOutcome::Busy`] is returned.

use crate::Result;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::Mutex as AsyncMutex;

/// Outcome of a lock-gated invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockOutcome {
    /// The lock was acquired and the work ran to completion
    Completed,
    /// The lock was acquired but the work returned an error (already logged)
    Failed,
    /// Another invocation holds the lock; the work did not run
    Busy,
}

impl LockOutcome {
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Busy)
    }
}

/// Registry of per-key locks
#[derive(Debug, Default)]
pub struct LockRegistry {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl LockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the lock for `key`, creating it on first use
    fn lock_for(&self, key: &str) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// Runs `work` while holding the lock for `key`
    ///
    /// Returns [`LockOutcome::Busy`] immediately, without calling `work`, when
    /// the lock is already held. The guard is dropped when `work` finishes,
    /// fails or unwinds.
    pub async fn try_run_exclusive<F, Fut>(&self, key: &str, work: F) -> LockOutcome
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        let lock = self.lock_for(key);
        let Ok(_guard) = lock.try_lock_owned() else {
            tracing::info!("{} is already running, skipping", key);
            return LockOutcome::Busy;
        };

        tracing::debug!("Acquired lock {}", key);
        match work().await {
            Ok(()) => LockOutcome::Completed,
            Err(e) => {
                tracing::error!("{} failed: {}", key, e);
                LockOutcome::Failed
            }
        }
    }

    /// Whether the lock for `key` is currently held
    pub fn is_held(&self, key: &str) -> bool {
        let locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks
            .get(key)
            .map(|lock| lock.try_lock().is_err())
            .unwrap_or(false)
    }

    /// Number of distinct keys seen so far
    pub fn len(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
