//! Tracing bootstrap.
//!
//! Grounded on the teacher's `cli/main.rs` `init_telemetry`: an `EnvFilter`
//! defaulting to the configured log level, switching between a
//! human-readable and a JSON formatter.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::GatewayConfig;

pub fn init(config: &GatewayConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        registry.with(fmt::layer().json().with_target(true)).init();
    } else {
        registry.with(fmt::layer().with_target(false).with_ansi(true)).init();
    }
}
