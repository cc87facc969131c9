//! A cheap, clonable, cancellable handle standing in for the per-request
//! `context.Context` the rest of this design was originally built around.
//!
//! A [`CancelToken`] carries an optional deadline and can be cancelled early.
//! Its identity (compared with [`CancelToken::same`]) is what [`crate::Lock`]
//! uses to decide whether a second `lock()` call is a re-entrant acquisition
//! by the same logical caller, rather than a competing one.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::Instant;

struct Inner {
    cancelled: AtomicBool,
    notify: Notify,
    deadline: Option<Instant>,
}

/// Cancellable handle propagated through dispatch and locking.
#[derive(Clone)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    /// A token with no deadline; only cancelled by an explicit [`Self::cancel`] or drop.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                cancelled: AtomicBool::new(false),
                notify: Notify::new(),
                deadline: None,
            }),
        }
    }

    /// A token that is automatically considered cancelled once `d` elapses.
    pub fn with_deadline(d: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                cancelled: AtomicBool::new(false),
                notify: Notify::new(),
                deadline: Some(Instant::now() + d),
            }),
        }
    }

    /// Whether this token carries its own deadline (as opposed to relying on
    /// a caller-supplied fallback, e.g. the lock watchdog's 5s default).
    pub fn has_deadline(&self) -> bool {
        self.inner.deadline.is_some()
    }

    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        if self.inner.cancelled.load(Ordering::SeqCst) {
            return true;
        }
        matches!(self.inner.deadline, Some(d) if Instant::now() >= d)
    }

    /// Resolves once this token is cancelled or its deadline passes.
    pub async fn cancelled(&self) {
        if self.is_cancelled() {
            return;
        }
        match self.inner.deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = self.inner.notify.notified() => {},
                    _ = tokio::time::sleep_until(deadline) => {},
                }
            },
            None => {
                self.inner.notify.notified().await;
            },
        }
    }

    /// Identity comparison: true iff `self` and `other` are handles onto the
    /// same underlying token, used for lock re-entrancy.
    pub fn same(&self, other: &CancelToken) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cancel_wakes_waiters() {
        let token = CancelToken::new();
        let waiter = token.clone();
        let handle = tokio::spawn(async move {
            waiter.cancelled().await;
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        token.cancel();
        handle.await.unwrap();
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn deadline_expires_on_its_own() {
        let token = CancelToken::with_deadline(Duration::from_millis(20));
        assert!(!token.is_cancelled());
        token.cancelled().await;
        assert!(token.is_cancelled());
    }

    #[test]
    fn same_identifies_clones_only() {
        let a = CancelToken::new();
        let b = a.clone();
        let c = CancelToken::new();
        assert!(a.same(&b));
        assert!(!a.same(&c));
    }
}
