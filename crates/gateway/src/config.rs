//! Runtime configuration: CLI flags and environment variables, with defaults
//! tuned for local development.
//!
//! Grounded on the teacher's `cli/main.rs` `Cli` struct (global `clap` flags
//! doubling as environment overrides) generalised to this server's own knobs
//! — bind address, liveness timeout, and the protocol-level limits the
//! session framework exposes as constants ([`qws_session::connection`],
//! [`qws_wire::offload`]).

use std::time::Duration;

use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(name = "qws-gateway", about = "Real-time session gateway")]
pub struct GatewayConfig {
    /// Address to bind the HTTP/WebSocket listener to.
    #[arg(long, env = "QWS_BIND", default_value = "0.0.0.0")]
    pub bind: String,

    /// Port to listen on.
    #[arg(long, env = "QWS_PORT", default_value_t = 8080)]
    pub port: u16,

    /// Seconds a connection may go without traffic before it's considered
    /// dead.
    #[arg(long, env = "QWS_LIVENESS_TIMEOUT_SECS", default_value_t = 10)]
    pub liveness_timeout_secs: u64,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "QWS_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Emit logs as JSON instead of human-readable text.
    #[arg(long, env = "QWS_JSON_LOGS", default_value_t = false)]
    pub json_logs: bool,
}

impl GatewayConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }

    pub fn liveness_timeout(&self) -> Duration {
        Duration::from_secs(self.liveness_timeout_secs)
    }
}
