use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::errors::DebounceError;

/// One-shot settleable result shared by every caller of one burst.
///
/// The cell is created lazily on the first call of a burst that wraps a
/// deferred operation, and each subsequent call in the same burst receives a
/// clone of the same cell. When the single underlying execution settles, all
/// waiters observe the identical value or rejection.
///
/// Settlement is first-write-wins: once a value or rejection is stored, later
/// settlement attempts are dropped.
pub struct ResultCell<T> {
    inner: Arc<CellInner<T>>,
}

struct CellInner<T> {
    slot: Mutex<Option<Result<T, DebounceError>>>,
    settled: Condvar,
}

impl<T> Clone for ResultCell<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Clone> ResultCell<T> {
    pub(crate) fn new() -> Self {
        Self {
            inner: Arc::new(CellInner {
                slot: Mutex::new(None),
                settled: Condvar::new(),
            }),
        }
    }

    pub(crate) fn settle(&self, outcome: Result<T, DebounceError>) {
        let mut slot = self.lock_slot();
        if slot.is_none() {
            *slot = Some(outcome);
            self.inner.settled.notify_all();
        }
    }

    /// Blocks until the burst settles and returns its outcome.
    pub fn wait(&self) -> Result<T, DebounceError> {
        let mut slot = self.lock_slot();
        loop {
            if let Some(outcome) = slot.as_ref() {
                return outcome.clone();
            }
            slot = self
                .inner
                .settled
                .wait(slot)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Like [`ResultCell::wait`], but gives up after `timeout` and returns
    /// `None` if the burst has not settled by then.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<Result<T, DebounceError>> {
        let deadline = Instant::now() + timeout;
        let mut slot = self.lock_slot();
        loop {
            if let Some(outcome) = slot.as_ref() {
                return Some(outcome.clone());
            }
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            let (guard, _) = self
                .inner
                .settled
                .wait_timeout(slot, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
            slot = guard;
        }
    }

    /// Returns the settled outcome without blocking, `None` while pending.
    pub fn try_get(&self) -> Option<Result<T, DebounceError>> {
        self.lock_slot().as_ref().cloned()
    }

    fn lock_slot(&self) -> MutexGuard<'_, Option<Result<T, DebounceError>>> {
        self.inner
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
