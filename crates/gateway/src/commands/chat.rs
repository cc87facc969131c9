//! Chat command: `{"cmd": CHAT_MESSAGE, "data": {"text": "..."}}` is either
//! broadcast verbatim or, if `text` starts with `/`, handed off to the
//! connection's own [`CmdRouter`].
//!
//! Grounded on the original `lobby.go`'s chat handler (blocklist-aware
//! broadcast, slash-command sniffing) narrowed to this server's single
//! server-wide broadcast domain — no lobbies are modelled here.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use qws_session::handlers::PlainHandler;
use qws_session::{CmdRouter, Command, NullCommandLog, Result, Router, UserConn, UserList};
use qws_sync::CancelToken;
use qws_wire::RawMessage;
use qws_wire::codes::{in_cmd, info_kind, out_cmd};

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

#[derive(Deserialize)]
struct ChatIn {
    text: String,
}

#[derive(Serialize)]
struct ChatOut<'a> {
    from: &'a str,
    copy: i64,
    text: &'a str,
}

pub async fn register_router(router: &Router, users: Arc<UserList>) -> Result<()> {
    router
        .handle(
            in_cmd::CHAT_MESSAGE,
            PlainHandler::new(move |token: &CancelToken, conn: &UserConn, m: &RawMessage| -> BoxFuture<'_, ()> {
                let users = users.clone();
                Box::pin(handle_chat(token.clone(), conn.clone(), m.data.clone(), users))
            }),
        )
        .await?;
    Ok(())
}

async fn handle_chat(token: CancelToken, conn: UserConn, data: serde_json::Value, users: Arc<UserList>) {
    let ChatIn { text } = match serde_json::from_value(data) {
        Ok(t) => t,
        Err(err) => {
            conn.send_info(info_kind::ERROR, format!("bad chat payload: {err}"));
            return;
        },
    };

    if let Some(line) = text.strip_prefix('/') {
        let mut log = NullCommandLog;
        conn.cmd_router().serve(&token, &conn, &format!("/{line}"), &mut log).await;
        return;
    }

    if text.trim().is_empty() {
        return;
    }

    let from = conn.filter_name();
    users.broadcast(
        out_cmd::CHAT_MESSAGE,
        ChatOut {
            from: &from,
            copy: conn.copy(),
            text: &text,
        },
    );
}

pub fn register_commands(cmd_router: &mut CmdRouter, users: Arc<UserList>) {
    cmd_router.global.push(Command {
        base: "/block".to_string(),
        params: "target".to_string(),
        help: "stop receiving chat from a user".to_string(),
        handler: Arc::new(move |_token: &CancelToken, conn: &UserConn, params: &[String]| -> BoxFuture<'_, String> {
            let users = users.clone();
            let conn = conn.clone();
            let target = params.first().cloned().unwrap_or_default();
            Box::pin(async move {
                if target.is_empty() {
                    return "usage: /block <name>".to_string();
                }
                if users.members().iter().any(|c| c.filter_name() == target) {
                    conn.user().block(target.clone());
                    format!("blocked {target}")
                } else {
                    format!("no such user: {target}")
                }
            })
        }),
    });
}
