//! SSE events handlers - per-project progress streaming.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use serde::Serialize;

use crate::sse::{STREAM_HEADERS, subscribe};
use crate::state::AppState;

/// Open the event stream for a project.
///
/// The first record is a `connected` acknowledgement; after that every
/// event published on the project's channel is forwarded as it happens.
/// Clients should refetch full state (see `progress`) after connecting.
pub async fn stream(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
) -> impl IntoResponse {
    let sse = subscribe(
        Arc::clone(&state.hub),
        project_id,
        state.pipeline.heartbeat_interval,
    );
    (STREAM_HEADERS, sse)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionsResponse {
    pub project_id: String,
    pub connections: usize,
}

/// Number of open connections for a project.
pub async fn connections(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
) -> Json<ConnectionsResponse> {
    let connections = state.hub.connection_count(&project_id);
    Json(ConnectionsResponse {
        project_id,
        connections,
    })
}
