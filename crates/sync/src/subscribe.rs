//! Bounded fan-out publish/subscribe.
//!
//! Grounded directly on the original `lock/subscribe.go`: each subscriber has
//! a small bounded queue (capacity 2), publish is non-blocking per
//! subscriber, and one slow subscriber never stalls delivery to the others.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc;

use crate::cancel::CancelToken;
use crate::error::{Error, Result};
use crate::lock::Lock;

const SUBSCRIBER_CAPACITY: usize = 2;

static NEXT_SUBSCRIPTION_ID: AtomicU64 = AtomicU64::new(1);

/// A single subscriber's receiving end, returned by [`Subscribable::subscribe`].
pub struct Subscription<T> {
    id: u64,
    parent: Subscribable<T>,
    rx: mpsc::Receiver<T>,
}

impl<T> Subscription<T> {
    pub async fn recv(&mut self) -> Option<T> {
        self.rx.recv().await
    }

    pub async fn unsubscribe(&self, token: &CancelToken) -> Result<()> {
        self.parent.unsubscribe(token, self.id).await
    }
}

struct Entry<T> {
    tx: mpsc::Sender<T>,
}

struct Inner<T> {
    lock: Lock,
    subscribers: std::sync::Mutex<HashMap<u64, Entry<T>>>,
}

impl<T> Inner<T> {
    #[allow(clippy::expect_used)]
    fn subscribers(&self) -> std::sync::MutexGuard<'_, HashMap<u64, Entry<T>>> {
        self.subscribers.lock().expect("subscribers mutex poisoned")
    }
}

/// A publish/subscribe topic with bounded, independently backpressured
/// subscriber queues.
pub struct Subscribable<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for Subscribable<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> Default for Subscribable<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + 'static> Subscribable<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                lock: Lock::new(),
                subscribers: std::sync::Mutex::new(HashMap::new()),
            }),
        }
    }

    pub async fn subscribe(&self, token: &CancelToken) -> Result<Subscription<T>> {
        self.inner.lock.lock(token).await?;
        let id = NEXT_SUBSCRIPTION_ID.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(SUBSCRIBER_CAPACITY);
        self.inner.subscribers().insert(id, Entry { tx });
        self.inner.lock.unlock().await;
        Ok(Subscription {
            id,
            parent: self.clone(),
            rx,
        })
    }

    pub async fn unsubscribe(&self, token: &CancelToken, id: u64) -> Result<()> {
        self.inner.lock.lock(token).await?;
        let removed = self.inner.subscribers().remove(&id);
        self.inner.lock.unlock().await;
        removed.map(|_| ()).ok_or(Error::SubscriptionNotFound)
    }

    /// Publish `value` to every current subscriber. A subscriber whose queue
    /// is full does not block or prevent delivery to the others; its failure
    /// is collected and returned as part of an aggregated error.
    pub async fn publish(&self, token: &CancelToken, value: T) -> Result<()> {
        self.inner.lock.lock(token).await?;
        let senders: Vec<(u64, mpsc::Sender<T>)> = self
            .inner
            .subscribers()
            .iter()
            .map(|(id, entry)| (*id, entry.tx.clone()))
            .collect();
        self.inner.lock.unlock().await;

        let mut failures = Vec::new();
        for (id, tx) in senders {
            if token.is_cancelled() {
                return Err(Error::CtxCancelled);
            }
            if let Err(_err) = tx.try_send(value.clone()) {
                failures.push(id);
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(Error::message(format!(
                "publish: subscriber(s) full: {}",
                failures
                    .iter()
                    .map(u64::to_string)
                    .collect::<Vec<_>>()
                    .join(", ")
            )))
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_reaches_all_subscribers() {
        let topic: Subscribable<u32> = Subscribable::new();
        let token = CancelToken::new();
        let mut a = topic.subscribe(&token).await.unwrap();
        let mut b = topic.subscribe(&token).await.unwrap();

        topic.publish(&token, 7).await.unwrap();

        assert_eq!(a.recv().await, Some(7));
        assert_eq!(b.recv().await, Some(7));
    }

    #[tokio::test]
    async fn slow_subscriber_does_not_block_others() {
        let topic: Subscribable<u32> = Subscribable::new();
        let token = CancelToken::new();
        let mut slow = topic.subscribe(&token).await.unwrap();
        let mut fast = topic.subscribe(&token).await.unwrap();

        // Fill the slow subscriber's capacity-2 queue without draining it.
        topic.publish(&token, 1).await.unwrap();
        topic.publish(&token, 2).await.unwrap();

        // Drain the fast one so only `slow` is full going into the 3rd publish.
        assert_eq!(fast.recv().await, Some(1));
        assert_eq!(fast.recv().await, Some(2));

        let result = topic.publish(&token, 3).await;
        assert!(result.is_err(), "expected aggregated failure for slow subscriber");

        // The fast subscriber still received the third value.
        assert_eq!(fast.recv().await, Some(3));
        // The slow one is genuinely full and never got it.
        assert_eq!(slow.recv().await, Some(1));
        assert_eq!(slow.recv().await, Some(2));
    }

    #[tokio::test]
    async fn unsubscribe_stops_future_delivery() {
        let topic: Subscribable<u32> = Subscribable::new();
        let token = CancelToken::new();
        let sub = topic.subscribe(&token).await.unwrap();
        sub.unsubscribe(&token).await.unwrap();
        assert_eq!(topic.subscriber_count(), 0);

        let double = topic.unsubscribe(&token, 999).await;
        assert!(matches!(double, Err(Error::SubscriptionNotFound)));
    }
}
