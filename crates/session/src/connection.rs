//! Per-socket read/write pumps.
//!
//! Grounded on the teacher's `gateway/src/ws.rs` `handle_connection` (split
//! socket, dedicated write-loop task forwarding a channel to the socket,
//! handshake-then-message-loop shape) generalised to this framework's
//! bounded-queue, ping/pong, and offload requirements, which the teacher's
//! unbounded-`mpsc` version doesn't need. Liveness and backpressure policy
//! (force-close on a full queue or a missed pong) come from `conn.go` and
//! this framework's own design rather than the teacher directly.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::extract::ws::{Message as WsMessage, WebSocket};
use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::{Mutex, mpsc};
use tokio::time::Instant;
use tracing::{debug, trace, warn};

use qws_wire::{PreparedPayload, RawMessage};

/// Capacity of the per-connection outbound queue. A client slow enough to
/// fill this is disconnected rather than allowed to back-pressure the rest
/// of the system.
pub const OUTBOUND_QUEUE_CAPACITY: usize = 50;

/// How long a connection may go without traffic (application frames or a
/// pong) before it is considered dead.
pub const LIVENESS_TIMEOUT: Duration = Duration::from_secs(10);

const PING_PAYLOAD: &[u8] = b"keepalive";

enum Outbound {
    Payload(PreparedPayload),
    Close,
}

struct Inner {
    tx: mpsc::Sender<Outbound>,
    closed: AtomicBool,
    last_activity: Mutex<Instant>,
    ip: String,
}

/// A handle onto one client's socket. Cheap to clone; all clones share the
/// same outbound queue and closed flag.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<Inner>,
}

impl Connection {
    /// Split `socket`, start its read and write pumps, and return a handle
    /// plus the stream of successfully decoded inbound frames. Decode
    /// failures are logged and dropped (they never reach the returned
    /// channel); a raw frame that doesn't even parse as JSON is likewise
    /// dropped rather than closing the connection.
    pub fn spawn(
        socket: WebSocket,
        ip: String,
        liveness_timeout: Duration,
    ) -> (Self, mpsc::Receiver<RawMessage>) {
        let (out_tx, out_rx) = mpsc::channel(OUTBOUND_QUEUE_CAPACITY);
        let (in_tx, in_rx) = mpsc::channel(32);

        let inner = Arc::new(Inner {
            tx: out_tx,
            closed: AtomicBool::new(false),
            last_activity: Mutex::new(Instant::now()),
            ip,
        });
        let conn = Self { inner: inner.clone() };

        let (ws_tx, ws_rx) = socket.split();
        tokio::spawn(write_pump(inner.clone(), ws_tx, out_rx, liveness_timeout));
        tokio::spawn(read_pump(inner, ws_rx, in_tx));

        (conn, in_rx)
    }

    /// Enqueue a prepared payload for sending. Non-blocking: if the queue is
    /// already full, the connection is force-closed and `false` is returned.
    pub fn send_prepared(&self, payload: PreparedPayload) -> bool {
        if self.inner.closed.load(Ordering::Acquire) {
            return false;
        }
        match self.inner.tx.try_send(Outbound::Payload(payload)) {
            Ok(()) => true,
            Err(_) => {
                warn!(ip = %self.inner.ip, "outbound queue full, closing connection");
                self.close();
                false
            },
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    pub fn ip(&self) -> &str {
        &self.inner.ip
    }

    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::Release);
        let _ = self.inner.tx.try_send(Outbound::Close);
    }

    /// A `Connection` with no socket behind it at all: no pumps are spawned,
    /// sent payloads are simply dropped. Lets unit tests exercise `UserConn`
    /// machinery (close hooks, identity) that needs a `Connection` handle
    /// without standing up a real `WebSocket`.
    #[cfg(test)]
    pub(crate) fn new_for_test() -> Self {
        let (tx, _rx) = mpsc::channel(OUTBOUND_QUEUE_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                tx,
                closed: AtomicBool::new(false),
                last_activity: Mutex::new(Instant::now()),
                ip: "test".to_string(),
            }),
        }
    }
}

async fn write_pump(
    inner: Arc<Inner>,
    mut ws_tx: impl Sink<WsMessage, Error = axum::Error> + Unpin,
    mut out_rx: mpsc::Receiver<Outbound>,
    liveness_timeout: Duration,
) {
    let mut ticker = tokio::time::interval(liveness_timeout / 2);
    ticker.tick().await; // interval's first tick fires immediately

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let idle = inner.last_activity.lock().await.elapsed();
                if idle > liveness_timeout {
                    debug!(ip = %inner.ip, "connection idle past liveness timeout, closing");
                    break;
                }
                if ws_tx.send(WsMessage::Ping(PING_PAYLOAD.to_vec())).await.is_err() {
                    break;
                }
            },
            item = out_rx.recv() => {
                match item {
                    Some(Outbound::Payload(payload)) => {
                        if ws_tx.send(WsMessage::Text(payload.as_str().to_string().into())).await.is_err() {
                            break;
                        }
                    },
                    Some(Outbound::Close) | None => break,
                }
            },
        }
    }

    inner.closed.store(true, Ordering::Release);
    let _ = ws_tx.close().await;
}

async fn read_pump(
    inner: Arc<Inner>,
    mut ws_rx: impl Stream<Item = Result<WsMessage, axum::Error>> + Unpin,
    in_tx: mpsc::Sender<RawMessage>,
) {
    while let Some(frame) = ws_rx.next().await {
        let frame = match frame {
            Ok(frame) => frame,
            Err(err) => {
                debug!(ip = %inner.ip, error = %err, "read error, closing connection");
                break;
            },
        };

        match frame {
            WsMessage::Text(text) => {
                touch(&inner).await;
                match serde_json::from_str::<RawMessage>(&text) {
                    Ok(raw) => {
                        if in_tx.send(raw).await.is_err() {
                            break;
                        }
                    },
                    Err(err) => {
                        trace!(ip = %inner.ip, error = %err, "dropping undecodable frame");
                    },
                }
            },
            WsMessage::Pong(_) => touch(&inner).await,
            WsMessage::Close(_) => break,
            WsMessage::Binary(_) | WsMessage::Ping(_) => touch(&inner).await,
        }
    }

    inner.closed.store(true, Ordering::Release);
}

async fn touch(inner: &Inner) {
    *inner.last_activity.lock().await = Instant::now();
}
