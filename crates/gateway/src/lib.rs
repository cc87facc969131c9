//! Demo WebSocket gateway built on `qws_session`/`qws_wire`/`qws_sync`: HTTP
//! bootstrap, command table wiring, and configuration/telemetry glue around
//! the session framework's core.
//!
//! Split into a library and a thin binary (`main.rs`) the way the teacher
//! splits its gateway crate from its `cli` entry point, so the integration
//! suite under `tests/` can build the router/app the same way the binary
//! does without going through a subprocess.

pub mod commands;
pub mod config;
pub mod routes;
pub mod state;
pub mod telemetry;

use std::sync::Arc;

use qws_session::{Router, UserList};
use qws_wire::MessageStore;

use config::GatewayConfig;
use state::AppState;

/// Build a fully wired `AppState` — command tables registered, user list and
/// offload store constructed — ready to hand to `routes::build_app`.
pub async fn build_state(config: GatewayConfig) -> anyhow::Result<Arc<AppState>> {
    let store = MessageStore::new();
    let router = Router::new();
    let users = Arc::new(UserList::new(store.clone()));
    let cmd_router = commands::register(&router, users.clone()).await?;

    Ok(AppState::new(config, router, cmd_router, users, store))
}
