//! Large-message offload: when an outbound body is too big to put straight
//! on the wire, it is deposited here under a fresh UUID and the client
//! retrieves it over HTTP instead.
//!
//! Grounded directly on the original `http.go`: a map guarded by a
//! channel-as-mutex, with each insertion scheduling its own TTL eviction, and
//! retrieval consuming the entry on first read regardless of whether the TTL
//! has elapsed. The Rust version replaces the channel-as-mutex with a
//! `DashMap` (the teacher's concurrent-map crate of choice) and the
//! `time.AfterFunc` callback with a `tokio::spawn` + `sleep`.

use std::time::Duration;

use dashmap::DashMap;
use tracing::trace;
use uuid::Uuid;

/// How long an offloaded message survives before being evicted, even if
/// never retrieved.
pub const OFFLOAD_TTL: Duration = Duration::from_secs(5);

/// The size, in encoded octets, above which an outbound payload is offloaded
/// rather than sent inline.
pub const OFFLOAD_THRESHOLD: usize = 100_000;

#[derive(Default)]
pub struct MessageStore {
    entries: DashMap<Uuid, Vec<u8>>,
}

impl MessageStore {
    pub fn new() -> std::sync::Arc<Self> {
        std::sync::Arc::new(Self::default())
    }

    /// Deposit `bytes` under a fresh UUID, scheduling eviction after
    /// [`OFFLOAD_TTL`]. Returns the id the client should fetch over HTTP.
    pub fn put(self: &std::sync::Arc<Self>, bytes: Vec<u8>) -> Uuid {
        let id = Uuid::new_v4();
        self.entries.insert(id, bytes);

        let store = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(OFFLOAD_TTL).await;
            if store.entries.remove(&id).is_some() {
                trace!(%id, "offload entry evicted after ttl");
            }
        });

        id
    }

    /// Consume and return the entry for `id`, if it is still present. A
    /// second call for the same id always misses, whether because it was
    /// already consumed or because the TTL evicted it first.
    pub fn take(&self, id: Uuid) -> Option<Vec<u8>> {
        self.entries.remove(&id).map(|(_, bytes)| bytes)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_then_take_round_trips_once() {
        let store = MessageStore::new();
        let id = store.put(b"hello".to_vec());
        assert_eq!(store.take(id), Some(b"hello".to_vec()));
        assert_eq!(store.take(id), None);
    }

    #[tokio::test(start_paused = true)]
    async fn entry_evicts_after_ttl() {
        let store = MessageStore::new();
        let id = store.put(b"bye".to_vec());
        tokio::time::advance(OFFLOAD_TTL + Duration::from_millis(100)).await;
        tokio::task::yield_now().await;
        assert_eq!(store.take(id), None);
    }
}
