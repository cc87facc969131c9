//! `UserConn`: one live connection's session state — identity, routing, and
//! close-hook lifecycle layered on top of a bare [`Connection`].
//!
//! Grounded on the original `conn.go`/`user.go` for identity formatting and
//! on `closehook.go` for the close-hook contract, generalised per the
//! design's requirement for an addressable, reverse-order, timeout-bounded
//! hook mechanism (the original compares hooks by function-pointer identity,
//! which Rust closures do not support — see [`CloseHookToken`]).

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::{Mutex, mpsc};
use tracing::warn;

use qws_sync::{CancelToken, safe_spawn};
use qws_wire::codes::{info_kind, out_cmd};
use qws_wire::{Message, MessageStore, PreparedPayload, RawMessage, encode_outbound};

use crate::cmd_router::CmdRouter;
use crate::connection::Connection;
use crate::error::{Error, Result};
use crate::router::Router;
use crate::user::{AdminLevel, User, parse_name};

/// How long a single inbound message's dispatch may run before it is
/// abandoned.
pub const DISPATCH_TIMEOUT: Duration = Duration::from_secs(2);

/// How long a single close hook may run before it is abandoned.
pub const CLOSE_HOOK_TIMEOUT: Duration = Duration::from_secs(1);

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A hook invoked, in reverse registration order, when a [`UserConn`]
/// closes.
pub type CloseHook = Arc<dyn Fn(CancelToken, UserConn) -> BoxFuture<'static, ()> + Send + Sync>;

/// Opaque handle returned by [`UserConn::add_close_hook`], required to
/// remove it again via [`UserConn::remove_close_hook`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CloseHookToken(u64);

struct Hooks {
    next_token: u64,
    entries: Vec<(u64, CloseHook)>,
}

impl Default for Hooks {
    fn default() -> Self {
        Self {
            next_token: 1,
            entries: Vec::new(),
        }
    }
}

struct Inner {
    conn: Connection,
    user: Arc<User>,
    s_id: i64,
    copy: i64,
    in_lobby: AtomicI64,
    ghosted: AtomicBool,
    router: Router,
    cmd_router: Arc<CmdRouter>,
    store: Arc<MessageStore>,
    hooks: Mutex<Hooks>,
    closed: AtomicBool,
}

/// A live session: the authenticated identity (`user`) plus the socket
/// (`conn`) and dispatch machinery (`router`, `cmd_router`) serving it.
/// Cheap to clone; all clones share the same underlying state.
#[derive(Clone)]
pub struct UserConn {
    inner: Arc<Inner>,
}

impl UserConn {
    pub fn new(
        conn: Connection,
        user: Arc<User>,
        s_id: i64,
        copy: i64,
        router: Router,
        cmd_router: Arc<CmdRouter>,
        store: Arc<MessageStore>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                conn,
                user,
                s_id,
                copy,
                in_lobby: AtomicI64::new(0),
                ghosted: AtomicBool::new(false),
                router,
                cmd_router,
                store,
                hooks: Mutex::new(Hooks::default()),
                closed: AtomicBool::new(false),
            }),
        }
    }

    pub fn connection(&self) -> &Connection {
        &self.inner.conn
    }

    pub fn user(&self) -> &Arc<User> {
        &self.inner.user
    }

    pub fn s_id(&self) -> i64 {
        self.inner.s_id
    }

    pub fn copy(&self) -> i64 {
        self.inner.copy
    }

    pub fn user_id(&self) -> i64 {
        self.inner.user.id
    }

    pub fn admin_level(&self) -> AdminLevel {
        self.inner.user.admin_level()
    }

    pub fn is_guest(&self) -> bool {
        self.inner.user.id == 0
    }

    /// True for a synthetic connection with no underlying socket (e.g. a
    /// server-driven bot participant).
    pub fn is_bot(&self) -> bool {
        false
    }

    pub fn is_ghosted(&self) -> bool {
        self.inner.ghosted.load(Ordering::Acquire)
    }

    pub fn set_ghosted(&self, ghosted: bool) {
        self.inner.ghosted.store(ghosted, Ordering::Release);
    }

    pub fn in_lobby(&self) -> i64 {
        self.inner.in_lobby.load(Ordering::Acquire)
    }

    pub fn set_in_lobby(&self, lobby: i64) {
        self.inner.in_lobby.store(lobby, Ordering::Release);
    }

    pub fn router(&self) -> &Router {
        &self.inner.router
    }

    pub fn cmd_router(&self) -> &Arc<CmdRouter> {
        &self.inner.cmd_router
    }

    /// Bare user name.
    pub fn name(&self) -> String {
        self.inner.user.name.clone()
    }

    /// Display name with a `(copy)` disambiguator appended when this user
    /// has more than one live session, or is an unregistered Guest.
    pub fn print_name(&self) -> String {
        let name = self.name();
        if self.copy() > 1 || name == "Guest" {
            format!("{name}({})", self.copy())
        } else {
            name
        }
    }

    /// `print_name()` for guests, the bare `name()` otherwise.
    pub fn filter_name(&self) -> String {
        if self.is_guest() {
            self.print_name()
        } else {
            self.name()
        }
    }

    /// The structured `{from, copy, admin}` form used in chat/user-list
    /// payloads.
    pub fn user_name(&self) -> Value {
        serde_json::json!({
            "from": self.name(),
            "copy": self.copy(),
            "admin": self.admin_level() as i32,
        })
    }

    /// The name this connection's blocklist checks should be keyed by: the
    /// full display name (with `(copy)`) for guests/bots, the bare name for
    /// registered users.
    pub fn blocklist_key(&self) -> String {
        if self.is_guest() {
            self.print_name()
        } else {
            self.name()
        }
    }

    fn encode_and_send(&self, message: &Message) {
        match encode_outbound(message, &self.inner.store) {
            Ok(payload) => {
                self.inner.conn.send_prepared(payload);
            },
            Err(err) => warn!(error = %err, "failed to encode outbound message"),
        }
    }

    pub fn send(&self, cmd: i16, data: impl Serialize) {
        match serde_json::to_value(data) {
            Ok(value) => self.encode_and_send(&Message::push(cmd, Some(value))),
            Err(err) => warn!(error = %err, "failed to serialise outbound data"),
        }
    }

    pub fn send_prepared(&self, payload: PreparedPayload) -> bool {
        self.inner.conn.send_prepared(payload)
    }

    pub fn send_response(&self, id: u32, data: Option<Value>) {
        self.encode_and_send(&Message::response(id, data));
    }

    pub fn send_info(&self, kind: i32, text: impl Into<String>) {
        self.encode_and_send(&Message::info(out_cmd::CHAT_MESSAGE, kind, text));
    }

    /// Send the full slash-command catalogue as a chat/info frame of kind
    /// `HELP_CATALOGUE`.
    pub fn send_catalogue(&self, catalogue: &CmdRouter) {
        let message = Message::push(
            out_cmd::CHAT_MESSAGE,
            Some(serde_json::json!({
                "type": info_kind::HELP_CATALOGUE,
                "message": catalogue,
            })),
        );
        self.encode_and_send(&message);
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire) || self.inner.conn.is_closed()
    }

    /// Register `hook` to run when this connection closes. Fails if the
    /// connection has already closed.
    pub async fn add_close_hook(&self, hook: CloseHook) -> Result<CloseHookToken> {
        if self.inner.closed.load(Ordering::Acquire) {
            return Err(Error::Closed);
        }
        let mut hooks = self.inner.hooks.lock().await;
        let token = hooks.next_token;
        hooks.next_token += 1;
        hooks.entries.push((token, hook));
        Ok(CloseHookToken(token))
    }

    pub async fn remove_close_hook(&self, token: CloseHookToken) {
        let mut hooks = self.inner.hooks.lock().await;
        hooks.entries.retain(|(t, _)| *t != token.0);
    }

    /// Close the connection: mark closed, run every registered close hook
    /// (reverse registration order, each in its own timeout-bounded task,
    /// panic-isolated), then close the socket. A second call is a no-op.
    pub async fn close(&self) {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        let entries = {
            let mut hooks = self.inner.hooks.lock().await;
            std::mem::take(&mut hooks.entries)
        };

        let mut handles = Vec::with_capacity(entries.len());
        for (_, hook) in entries.into_iter().rev() {
            let token = CancelToken::with_deadline(CLOSE_HOOK_TIMEOUT);
            let conn = self.clone();
            let fut = hook(token, conn);
            handles.push(safe_spawn(
                async move {
                    let _ = tokio::time::timeout(CLOSE_HOOK_TIMEOUT, fut).await;
                },
                |panic_msg| warn!(panic = %panic_msg, "close hook panicked"),
            ));
        }

        for handle in handles {
            let _ = handle.await;
        }

        self.inner.conn.close();
    }

    /// Drive this connection: dispatch each inbound frame in its own
    /// timeout-bounded, panic-isolated task, until the inbound channel
    /// closes (the read pump exited), then close the connection.
    pub async fn run(self, mut inbound: mpsc::Receiver<RawMessage>) {
        while let Some(message) = inbound.recv().await {
            let conn_for_task = self.clone();
            let conn_for_panic = self.clone();
            let token = CancelToken::with_deadline(DISPATCH_TIMEOUT);

            safe_spawn(
                async move {
                    let router = conn_for_task.router().clone();
                    let _ = tokio::time::timeout(
                        DISPATCH_TIMEOUT,
                        router.dispatch(&token, &conn_for_task, &message),
                    )
                    .await;
                },
                move |panic_msg| {
                    warn!(panic = %panic_msg, "handler panicked");
                    conn_for_panic.send_info(info_kind::ERROR, "Something went wrong...");
                },
            );
        }

        self.close().await;
    }
}

/// Parse a stored display name back into its formatted name and copy
/// number. Thin re-export of [`crate::user::parse_name`] kept alongside
/// `UserConn` since that's where it's consumed.
pub fn parse_display_name(display: &str) -> (String, i64) {
    parse_name(display)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_user(id: i64, name: &str) -> Arc<User> {
        Arc::new(User::new(id, name))
    }

    #[test]
    fn parse_display_name_reexport_matches() {
        assert_eq!(parse_display_name("Bob(3)"), (String::from("Bob"), 3));
    }

    #[test]
    fn guest_detection_by_id() {
        let guest = test_user(0, "Guest");
        let registered = test_user(42, "Alice");
        assert_eq!(guest.id, 0);
        assert_eq!(registered.id, 42);
    }

    fn test_conn() -> UserConn {
        UserConn::new(
            Connection::new_for_test(),
            test_user(0, "Guest"),
            1,
            1,
            Router::new(),
            Arc::new(CmdRouter::new()),
            MessageStore::new(),
        )
    }

    /// Testable property 4 / scenario S6: close hooks run in reverse
    /// registration order, exactly once each, and a panicking hook does not
    /// prevent the others from running.
    #[tokio::test]
    async fn close_hooks_run_lifo_and_survive_a_panic() {
        let conn = test_conn();
        let order = Arc::new(Mutex::new(Vec::<&'static str>::new()));

        for label in ["H1", "H2", "H3"] {
            let order = order.clone();
            conn.add_close_hook(Arc::new(move |_token: CancelToken, _conn: UserConn| -> BoxFuture<'static, ()> {
                let order = order.clone();
                Box::pin(async move {
                    if label == "H2" {
                        panic!("H2 deliberately panics");
                    }
                    order.lock().await.push(label);
                })
            }))
            .await
            .unwrap();
        }

        conn.close().await;

        assert_eq!(*order.lock().await, vec!["H3", "H1"]);
        assert!(conn.is_closed());
        let noop: CloseHook =
            Arc::new(|_t: CancelToken, _c: UserConn| -> BoxFuture<'static, ()> { Box::pin(async {}) });
        assert!(matches!(conn.add_close_hook(noop).await, Err(Error::Closed)));
    }
}
