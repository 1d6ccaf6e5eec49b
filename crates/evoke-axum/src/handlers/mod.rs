//! HTTP request handlers for the Axum web server.
//!
//! Each submodule contains handlers for a specific API area.

pub mod events;
pub mod runs;
