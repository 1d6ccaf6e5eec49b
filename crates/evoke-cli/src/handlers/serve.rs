//! `evoke serve` - run the SSE server.

use std::time::Duration;

use anyhow::Result;
use evoke_axum::{ServerConfig, start_server};
use evoke_core::PipelineConfig;

/// Build the server configuration from command-line options.
pub fn build_config(
    port: u16,
    throttle_ms: u64,
    heartbeat_secs: u64,
    cors_origins: Vec<String>,
) -> ServerConfig {
    let pipeline = PipelineConfig::with_defaults()
        .throttle_interval(Duration::from_millis(throttle_ms))
        .heartbeat_interval(Duration::from_secs(heartbeat_secs));
    let config = ServerConfig::with_defaults()
        .with_port(port)
        .with_pipeline(pipeline);
    if cors_origins.is_empty() {
        config
    } else {
        config.with_allowed_origins(cors_origins)
    }
}

pub async fn execute(
    port: u16,
    throttle_ms: u64,
    heartbeat_secs: u64,
    cors_origins: Vec<String>,
) -> Result<()> {
    let config = build_config(port, throttle_ms, heartbeat_secs, cors_origins);
    tracing::info!(
        port = config.port,
        throttle_ms,
        heartbeat_secs,
        "Starting evoke server"
    );
    start_server(config).await
}
