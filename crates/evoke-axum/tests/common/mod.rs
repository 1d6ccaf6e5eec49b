//! Shared helpers for evoke-axum integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use evoke_axum::bootstrap::{AxumContext, CorsConfig, ServerConfig, bootstrap_with_store, serve};
use evoke_core::{EventHub, InMemoryResultStore, PipelineConfig, RunRegistry};
use tokio::net::TcpListener;

/// Short intervals so timing-dependent tests finish quickly.
pub fn test_config() -> ServerConfig {
    ServerConfig::with_defaults()
        .with_port(0)
        .with_pipeline(
            PipelineConfig::with_defaults()
                .throttle_interval(Duration::from_millis(20))
                .heartbeat_interval(Duration::from_millis(100)),
        )
}

/// Context plus handles to the pieces tests inspect.
pub struct TestContext {
    pub ctx: AxumContext,
    pub hub: Arc<EventHub>,
    pub runs: Arc<RunRegistry>,
    pub store: Arc<InMemoryResultStore>,
}

pub fn test_context(config: &ServerConfig) -> TestContext {
    let store = Arc::new(InMemoryResultStore::new());
    let ctx = bootstrap_with_store(config, store.clone());
    TestContext {
        hub: Arc::clone(&ctx.hub),
        runs: Arc::clone(&ctx.runs),
        ctx,
        store,
    }
}

/// A server bound to an ephemeral local port.
pub struct TestServer {
    pub base_url: String,
    pub hub: Arc<EventHub>,
    pub runs: Arc<RunRegistry>,
    pub store: Arc<InMemoryResultStore>,
}

pub async fn spawn_server(config: &ServerConfig) -> TestServer {
    let TestContext {
        ctx,
        hub,
        runs,
        store,
    } = test_context(config);
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test listener");
    let addr = listener.local_addr().expect("Listener has no address");

    tokio::spawn(async move { serve(listener, ctx, &CorsConfig::AllowAll).await });

    TestServer {
        base_url: format!("http://{addr}"),
        hub,
        runs,
        store,
    }
}

/// Poll `condition` until it holds or `timeout` elapses.
pub async fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
