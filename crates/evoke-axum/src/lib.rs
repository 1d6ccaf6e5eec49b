//! Axum adapter for evoke.
//!
//! Serves per-project SSE streams backed by the core [`EventHub`] and a
//! small HTTP API to start runs and read their latest progress.
//!
//! [`EventHub`]: evoke_core::EventHub

#![deny(unsafe_code)]
#![deny(unused_crate_dependencies)]

// Silence unused dev-dependency warnings for crates only used by tests/
#[cfg(test)]
use async_trait as _;
#[cfg(test)]
use evoke_client as _;
#[cfg(test)]
use reqwest as _;
#[cfg(test)]
use tokio_util as _;
#[cfg(test)]
use tower as _;

pub mod bootstrap;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod sse;
pub mod state;

// Re-export primary types
pub use bootstrap::{
    AxumContext, CorsConfig, ServerConfig, bootstrap, bootstrap_with_store, serve, start_server,
};
pub use error::HttpError;
pub use routes::create_router;
pub use state::AppState;
