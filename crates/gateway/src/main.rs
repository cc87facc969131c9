//! Gateway binary entry point: parse configuration, bootstrap tracing, wire up
//! the command tables, and serve.
//!
//! Grounded on the teacher's `cli/main.rs` (`Cli::parse`, `init_telemetry`,
//! then dispatch into the gateway's own startup) and `gateway/src/server.rs`'s
//! `TcpListener::bind` + `axum::serve(..).into_make_service_with_connect_info`
//! pattern.

use std::net::SocketAddr;

use clap::Parser;
use tracing::info;

use qws_gateway::config::GatewayConfig;
use qws_gateway::{build_state, routes, telemetry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = GatewayConfig::parse();
    telemetry::init(&config);

    info!(version = env!("CARGO_PKG_VERSION"), "qws-gateway starting");

    let state = build_state(config).await?;

    let app = routes::build_app(state.clone());
    let addr = state.config.addr();
    info!(%addr, "binding listener");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;

    Ok(())
}
