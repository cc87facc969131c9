//! Shared server state handed to every axum handler.
//!
//! Grounded on the teacher's `state.rs` `GatewayState`/`AppState` split
//! (immutable shared services behind one `Arc`), narrowed to this server's
//! own services: the command dispatch tables (built once at startup), the
//! server-wide user list, the large-message offload store, and a session id
//! counter.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use qws_session::{CmdRouter, Router, UserList};
use qws_wire::MessageStore;

use crate::config::GatewayConfig;

pub struct AppState {
    pub config: GatewayConfig,
    pub store: Arc<MessageStore>,
    pub router: Router,
    pub cmd_router: Arc<CmdRouter>,
    pub users: Arc<UserList>,
    next_session_id: AtomicI64,
}

impl AppState {
    pub fn new(
        config: GatewayConfig,
        router: Router,
        cmd_router: CmdRouter,
        users: Arc<UserList>,
        store: Arc<MessageStore>,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            store,
            router,
            cmd_router: Arc::new(cmd_router),
            users,
            next_session_id: AtomicI64::new(1),
        })
    }

    pub fn next_session_id(&self) -> i64 {
        self.next_session_id.fetch_add(1, Ordering::Relaxed)
    }
}
