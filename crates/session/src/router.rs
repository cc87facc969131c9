//! Command-code dispatch table.
//!
//! Grounded directly on the original `router.go`. One behavioural deviation
//! from that file, made deliberately: the lobby-fallback rewrite there uses
//! `cmd > LobbyCmds` (strictly greater, so the sentinel itself is exempt);
//! this implementation follows the specification's explicit "code ≥ 100"
//! wording instead, so a message addressed to the sentinel code is also
//! funnelled through the catch-all lobby handler when one is registered.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, warn};

use qws_sync::CancelToken;
use qws_wire::RawMessage;
use qws_wire::codes::LOBBY_CMDS;

use crate::error::{Error, Result};
use crate::handlers::Handler;
use crate::user_conn::UserConn;

#[derive(Default)]
struct Table {
    routes: HashMap<i16, Arc<dyn Handler>>,
}

/// Maps command codes to [`Handler`]s, with a catch-all sentinel for the
/// lobby command space.
#[derive(Clone)]
pub struct Router {
    table: Arc<Mutex<Table>>,
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Router {
    pub fn new() -> Self {
        Self {
            table: Arc::new(Mutex::new(Table::default())),
        }
    }

    /// Register `handler` at `code`. Fails if `code` is already registered.
    pub async fn handle(&self, code: i16, handler: impl Handler + 'static) -> Result<()> {
        let mut table = self.table.lock().await;
        if table.routes.contains_key(&code) {
            return Err(Error::AlreadyRegistered(code));
        }
        table.routes.insert(code, Arc::new(handler));
        Ok(())
    }

    pub async fn remove_command(&self, code: i16) {
        self.table.lock().await.routes.remove(&code);
    }

    /// Dispatch `m` to the registered handler for its command code, applying
    /// the lobby-catch-all rewrite and, if the handler never answered a
    /// request, synthesising an empty correlated response.
    pub async fn dispatch(&self, token: &CancelToken, conn: &UserConn, m: &RawMessage) {
        let handler = {
            let table = self.table.lock().await;
            if table.routes.is_empty() {
                debug!("router: no handlers registered");
                None
            } else {
                let mut code = m.cmd;
                if code >= LOBBY_CMDS && table.routes.contains_key(&LOBBY_CMDS) {
                    code = LOBBY_CMDS;
                }
                match table.routes.get(&code) {
                    Some(handler) => Some(handler.clone()),
                    None => {
                        debug!(cmd = code, "router: no matching handler");
                        None
                    },
                }
            }
        };

        let Some(handler) = handler else {
            if m.wants_response() {
                let id = m.take_id();
                conn.send_response(id, None);
            }
            return;
        };

        handler.serve(token, conn, m).await;

        if m.wants_response() {
            let id = m.take_id();
            warn!(id, "router: handler never answered a request, synthesising empty response");
            conn.send_response(id, None);
        }
    }
}
