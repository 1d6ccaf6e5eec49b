//! Run handlers - start a code agent run and read its progress.

use std::sync::Arc;
use std::time::Duration;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use evoke_core::{AgentEvent, CodeAgentJob, JobRequest, ProgressSnapshot, ScriptedAgent};
use serde::{Deserialize, Serialize};

use crate::error::HttpError;
use crate::state::AppState;

/// Request body for starting a run.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartRunRequest {
    pub prompt: String,
    #[serde(default)]
    pub first_conversation: bool,
    /// Agent events to replay instead of the built-in demo script.
    #[serde(default)]
    pub script: Option<Vec<AgentEvent>>,
    /// Delay between replayed events, in milliseconds.
    #[serde(default)]
    pub step_delay_ms: Option<u64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunStarted {
    pub project_id: String,
    pub status: &'static str,
}

/// Unregisters the run when dropped, including when the run task panics.
struct ActiveRun {
    state: AppState,
    project_id: String,
}

impl Drop for ActiveRun {
    fn drop(&mut self) {
        self.state.runs.remove(&self.project_id);
    }
}

/// Start a run for a project. Responds before the run finishes.
pub async fn start(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    Json(req): Json<StartRunRequest>,
) -> Result<(StatusCode, Json<RunStarted>), HttpError> {
    if req.prompt.trim().is_empty() {
        return Err(HttpError::BadRequest("Prompt must not be empty".to_string()));
    }

    let mut agent = ScriptedAgent::demo(&req.prompt);
    if let Some(script) = req.script {
        agent = agent.with_script(script);
    }
    let delay = req
        .step_delay_ms
        .map_or(state.demo_step_delay, Duration::from_millis);
    let agent = agent.with_step_delay(delay);

    let job = CodeAgentJob::new(
        Arc::new(agent),
        Arc::clone(&state.store),
        state.hub.clone(),
    )
    .with_config(state.pipeline);
    let progress = job.progress_manager(&project_id);
    state.runs.register(&project_id, progress.clone())?;

    let request = JobRequest::new(project_id.clone(), req.prompt)
        .first_conversation(req.first_conversation);
    let guard = ActiveRun {
        state: Arc::clone(&state),
        project_id: project_id.clone(),
    };
    tokio::spawn(async move {
        if let Err(e) = job.run_with_progress(request, progress).await {
            tracing::error!(project_id = %guard.project_id, error = %e, "Run failed");
        }
        drop(guard);
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(RunStarted {
            project_id,
            status: "started",
        }),
    ))
}

/// Latest progress snapshot of the project's active run.
pub async fn progress(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
) -> Result<Json<ProgressSnapshot>, HttpError> {
    state
        .runs
        .snapshot(&project_id)
        .map(Json)
        .ok_or_else(|| HttpError::NotFound(format!("No active run for project {project_id}")))
}
