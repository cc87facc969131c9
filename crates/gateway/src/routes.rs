//! HTTP surface: health check, the WebSocket upgrade, and the large-message
//! offload fetch.
//!
//! Grounded on the teacher's `gateway/src/server.rs`: `health_handler` and
//! `ws_upgrade_handler`'s `ConnectInfo`/`WebSocketUpgrade`/`on_upgrade` shape,
//! and `apply_middleware_stack`'s layer ordering, narrowed to this server's
//! own concerns — no auth gate, no web UI, no TLS.

use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;

use axum::Router;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{ConnectInfo, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use serde_json::json;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use uuid::Uuid;

use qws_session::{CloseHook, Connection, User, UserConn};
use qws_sync::CancelToken;
use qws_wire::codes::out_cmd;

use crate::state::AppState;

pub fn build_app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/ws", get(ws_handler))
        .route("/offload/{id}", get(offload_handler))
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::new())
        .with_state(state)
}

async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    axum::Json(json!({
        "status": "ok",
        "connections": state.users.len(),
    }))
}

async fn offload_handler(State(state): State<Arc<AppState>>, Path(id): Path<Uuid>) -> impl IntoResponse {
    match state.store.take(id) {
        Some(bytes) => (StatusCode::OK, bytes).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| accept_connection(socket, addr, state))
}

/// Stand up a [`UserConn`] for a freshly upgraded socket: a guest identity (no
/// auth is implemented), a fresh session id, registration in the server-wide
/// user list, and the dispatch loop.
async fn accept_connection(socket: axum::extract::ws::WebSocket, addr: SocketAddr, state: Arc<AppState>) {
    let (conn, inbound) = Connection::spawn(socket, addr.to_string(), state.config.liveness_timeout());
    let user = Arc::new(User::new(0, "Guest"));
    let s_id = state.next_session_id();

    let user_conn = UserConn::new(
        conn,
        user,
        s_id,
        1,
        state.router.clone(),
        state.cmd_router.clone(),
        state.store.clone(),
    );
    state.users.add(user_conn.clone());
    info!(s_id, ip = %addr, "connection accepted");

    user_conn.send(out_cmd::SESSION_ID, json!({ "s_id": s_id }));

    let cleanup_state = state.clone();
    let cleanup_hook: CloseHook = Arc::new(
        move |_token: CancelToken, conn: UserConn| -> Pin<Box<dyn Future<Output = ()> + Send + 'static>> {
            let state = cleanup_state.clone();
            Box::pin(async move {
                state.users.remove(conn.s_id());
                info!(s_id = conn.s_id(), "connection removed from user list");
            })
        },
    );
    if let Err(err) = user_conn.add_close_hook(cleanup_hook).await {
        warn!(s_id, error = %err, "failed to register cleanup hook on already-closed connection");
    }

    user_conn.run(inbound).await;
}
