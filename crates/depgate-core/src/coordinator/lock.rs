//! Process-wide package operation lock.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{Error, Result};

/// Serializes package operations.
///
/// Clones share one underlying lock; hand the same handle to every
/// coordinator that touches the same project system. Waiters are served in
/// arrival order.
#[derive(Debug, Clone, Default)]
pub struct OperationLock {
    inner: Arc<Mutex<()>>,
}

impl OperationLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for the lock, giving up if `cancel` fires first.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<OperationLockGuard> {
        let waiting = Instant::now();
        let guard = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            guard = self.inner.clone().lock_owned() => guard,
        };
        debug!(waited_ms = waiting.elapsed().as_millis() as u64, "package operation lock acquired");
        Ok(OperationLockGuard {
            _guard: guard,
            acquired_at: Instant::now(),
        })
    }

    /// Whether an operation currently holds the lock.
    pub fn is_held(&self) -> bool {
        self.inner.try_lock().is_err()
    }
}

/// Held for the duration of one operation; releases the lock when dropped.
#[derive(Debug)]
pub struct OperationLockGuard {
    _guard: OwnedMutexGuard<()>,
    acquired_at: Instant,
}

impl Drop for OperationLockGuard {
    fn drop(&mut self) {
        debug!(
            held_ms = self.acquired_at.elapsed().as_millis() as u64,
            "package operation lock released"
        );
    }
}
