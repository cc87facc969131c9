//! Context-scoped, re-entrant mutual exclusion with a watchdog that force
//! releases a lock whose owning [`CancelToken`] is cancelled or expired.
//!
//! Grounded on the original `lock/lock.go`'s single-slot channel mutex, with
//! re-entrancy and the watchdog added per the session framework design: the
//! bare channel-mutex has neither.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex as AsyncMutex, OwnedSemaphorePermit, Semaphore};
use tracing::warn;

use crate::cancel::CancelToken;
use crate::error::{Error, Result};

/// Fallback release window for a lock acquired under a token with no deadline
/// of its own.
pub const WATCHDOG_TIMEOUT: Duration = Duration::from_secs(5);

struct Holder {
    token: CancelToken,
    depth: usize,
    // Held for as long as this holder owns the exclusion; dropping it
    // releases the semaphore permit.
    _permit: OwnedSemaphorePermit,
}

struct Inner {
    sem: Arc<Semaphore>,
    holder: AsyncMutex<Option<Holder>>,
}

/// A cheaply clonable handle onto a shared re-entrant lock.
#[derive(Clone)]
pub struct Lock {
    inner: Arc<Inner>,
}

impl Default for Lock {
    fn default() -> Self {
        Self::new()
    }
}

impl Lock {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                sem: Arc::new(Semaphore::new(1)),
                holder: AsyncMutex::new(None),
            }),
        }
    }

    /// Acquire the lock under `token`. Re-entrant: a second call with a token
    /// for which [`CancelToken::same`] holds simply increments the depth.
    pub async fn lock(&self, token: &CancelToken) -> Result<()> {
        {
            let mut holder = self.inner.holder.lock().await;
            if let Some(h) = holder.as_mut() {
                if h.token.same(token) {
                    h.depth += 1;
                    return Ok(());
                }
            }
        }

        let permit = tokio::select! {
            biased;
            () = token.cancelled() => return Err(Error::CtxCancelled),
            res = self.inner.sem.clone().acquire_owned() => {
                // `Inner` never exposes `sem` for anyone to `close()`.
                #[allow(clippy::expect_used)]
                res.expect("lock semaphore is never closed")
            },
        };

        {
            let mut holder = self.inner.holder.lock().await;
            *holder = Some(Holder {
                token: token.clone(),
                depth: 1,
                _permit: permit,
            });
        }

        self.spawn_watchdog(token.clone());
        Ok(())
    }

    /// As [`Self::lock`], but panics on failure (cancelled token). Mirrors
    /// the original's `MustLock`, for call sites that have already proven the
    /// token cannot be cancelled.
    #[allow(clippy::expect_used)]
    pub async fn must_lock(&self, token: &CancelToken) {
        self.lock(token)
            .await
            .expect("Lock::must_lock: acquisition failed");
    }

    /// Release one level of a (possibly re-entrant) acquisition. Panics if
    /// the lock is not currently held — matching the original's "unlocking an
    /// already-unlocked lock is a programmer error" invariant.
    pub async fn unlock(&self) {
        let mut holder = self.inner.holder.lock().await;
        match holder.as_mut() {
            None => panic!("Lock::unlock called while not held"),
            Some(h) if h.depth > 1 => h.depth -= 1,
            Some(_) => *holder = None,
        }
    }

    fn spawn_watchdog(&self, token: CancelToken) {
        let inner = self.inner.clone();
        tokio::spawn(async move {
            if token.has_deadline() {
                token.cancelled().await;
            } else {
                tokio::select! {
                    () = token.cancelled() => {},
                    () = tokio::time::sleep(WATCHDOG_TIMEOUT) => {},
                }
            }

            let mut holder = inner.holder.lock().await;
            if let Some(h) = holder.as_ref() {
                if h.token.same(&token) {
                    warn!("lock watchdog: force-releasing lock whose owning context expired");
                    *holder = None;
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reentrant_lock_same_token() {
        let lock = Lock::new();
        let token = CancelToken::new();
        lock.lock(&token).await.unwrap();
        lock.lock(&token).await.unwrap();
        lock.unlock().await;
        lock.unlock().await;

        // Fully released: a different token can now acquire immediately.
        let other = CancelToken::new();
        assert!(
            tokio::time::timeout(Duration::from_millis(50), lock.lock(&other))
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn contending_token_blocks_until_release() {
        let lock = Lock::new();
        let a = CancelToken::new();
        let b = CancelToken::new();
        lock.lock(&a).await.unwrap();

        let lock2 = lock.clone();
        let b2 = b.clone();
        let waiter = tokio::spawn(async move { lock2.lock(&b2).await });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        lock.unlock().await;
        waiter.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn watchdog_releases_after_cancellation() {
        let lock = Lock::new();
        let token = CancelToken::new();
        lock.lock(&token).await.unwrap();
        token.cancel();

        // Give the watchdog task a chance to run once its select wakes.
        tokio::time::advance(Duration::from_millis(10)).await;
        tokio::task::yield_now().await;

        let other = CancelToken::new();
        assert!(
            tokio::time::timeout(Duration::from_millis(100), lock.lock(&other))
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    #[should_panic(expected = "not held")]
    async fn unlock_without_holding_panics() {
        let lock = Lock::new();
        lock.unlock().await;
    }
}
