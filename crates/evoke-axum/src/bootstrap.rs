//! Axum server bootstrap - the composition root.
//!
//! This module is the only place where the hub, the run registry and the
//! result store are instantiated for the web adapter.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use evoke_core::{EventHub, InMemoryResultStore, PipelineConfig, ResultStore, RunRegistry};
use tokio::net::TcpListener;

/// Default port for the HTTP server.
pub const DEFAULT_PORT: u16 = 3000;

/// Default delay between replayed agent events for demo runs.
pub const DEFAULT_DEMO_STEP_DELAY: Duration = Duration::from_millis(300);

/// CORS configuration for the web server.
#[derive(Debug, Clone, Default)]
pub enum CorsConfig {
    /// Allow all origins (development mode).
    #[default]
    AllowAll,
    /// Allow specific origins (production mode).
    AllowOrigins(Vec<String>),
}

/// Server configuration for the Axum adapter.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port for the HTTP server.
    pub port: u16,
    /// CORS configuration.
    pub cors: CorsConfig,
    /// Throttle and heartbeat timing.
    pub pipeline: PipelineConfig,
    /// Delay between replayed agent events when a run does not set one.
    pub demo_step_delay: Duration,
}

impl ServerConfig {
    pub const fn with_defaults() -> Self {
        Self {
            port: DEFAULT_PORT,
            cors: CorsConfig::AllowAll,
            pipeline: PipelineConfig::with_defaults(),
            demo_step_delay: DEFAULT_DEMO_STEP_DELAY,
        }
    }

    #[must_use]
    pub const fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    #[must_use]
    pub const fn with_pipeline(mut self, pipeline: PipelineConfig) -> Self {
        self.pipeline = pipeline;
        self
    }

    /// Set CORS to allow specific origins.
    #[must_use]
    pub fn with_allowed_origins(mut self, origins: Vec<String>) -> Self {
        self.cors = CorsConfig::AllowOrigins(origins);
        self
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Application context for the Axum adapter.
pub struct AxumContext {
    /// Channel registry every SSE connection and producer shares.
    pub hub: Arc<EventHub>,
    /// Runs currently producing progress, by project.
    pub runs: Arc<RunRegistry>,
    /// Where finished runs are persisted.
    pub store: Arc<dyn ResultStore>,
    pub pipeline: PipelineConfig,
    pub demo_step_delay: Duration,
}

impl std::fmt::Debug for AxumContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AxumContext")
            .field("hub", &self.hub)
            .field("active_runs", &self.runs.active_count())
            .field("pipeline", &self.pipeline)
            .finish_non_exhaustive()
    }
}

/// Wire up the context with an in-memory store.
pub fn bootstrap(config: &ServerConfig) -> AxumContext {
    bootstrap_with_store(config, Arc::new(InMemoryResultStore::new()))
}

/// Wire up the context around an externally provided store.
pub fn bootstrap_with_store(config: &ServerConfig, store: Arc<dyn ResultStore>) -> AxumContext {
    tracing::debug!(
        throttle_ms = config.pipeline.throttle_interval.as_millis(),
        heartbeat_secs = config.pipeline.heartbeat_interval.as_secs(),
        "Axum bootstrap"
    );
    AxumContext {
        hub: Arc::new(EventHub::new()),
        runs: Arc::new(RunRegistry::new()),
        store,
        pipeline: config.pipeline,
        demo_step_delay: config.demo_step_delay,
    }
}

/// Serve `ctx` on an already bound listener until the server fails.
pub async fn serve(listener: TcpListener, ctx: AxumContext, cors: &CorsConfig) -> Result<()> {
    let app = crate::routes::create_router(ctx, cors);
    axum::serve(listener, app)
        .await
        .context("HTTP server terminated")
}

/// Start the web server on the configured port.
pub async fn start_server(config: ServerConfig) -> Result<()> {
    let ctx = bootstrap(&config);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    tracing::info!("evoke server listening on http://{}", addr);
    serve(listener, ctx, &config.cors).await
}
