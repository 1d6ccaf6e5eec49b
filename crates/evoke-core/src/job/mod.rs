//! Code agent job driver.
//!
//! One [`CodeAgentJob::run`] call takes a prompt through the full generation
//! flow and reports every phase as a progress step on the project's channel:
//!
//! ```text
//!   analyzingRequest → [generatingProjectName] → thinking ⇄ tool steps
//!     → generatingFragmentTitle → generatingFinalResponse
//!     → generatingSandboxUrl → savingResult
//! ```
//!
//! The run is the only producer for its channel; agent events are consumed
//! on the same task that drives the agent.

mod registry;

use std::collections::BTreeMap;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;

pub use registry::RunRegistry;

use crate::agent::AgentProgressBridge;
use crate::config::PipelineConfig;
use crate::events::AppEvent;
use crate::ports::{
    AgentError, AgentOutcome, AgentRuntime, ChannelPublisher, Fragment, GenerationTask,
    NewMessage, ResultStore, StoreError,
};
use crate::progress::{ProgressManager, StepOptions, StepResult, StepType, labels};

/// Title used when the fragment title cannot be generated.
pub const FALLBACK_FRAGMENT_TITLE: &str = "Fragment";

/// Errors that abort a job run.
#[derive(Debug, Error)]
pub enum JobError {
    /// Persisting the outcome failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Another run is already producing progress for this channel.
    #[error("A run is already active for project {0}")]
    RunAlreadyActive(String),
}

/// Input of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRequest {
    pub project_id: String,
    pub prompt: String,
    /// Whether this is the project's first message; triggers naming.
    pub first_conversation: bool,
}

impl JobRequest {
    pub fn new(project_id: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            prompt: prompt.into(),
            first_conversation: false,
        }
    }

    #[must_use]
    pub const fn first_conversation(mut self, first: bool) -> Self {
        self.first_conversation = first;
        self
    }
}

/// What a finished run produced.
#[derive(Debug, Clone, PartialEq)]
pub struct JobOutput {
    pub sandbox_url: String,
    pub title: String,
    pub summary: String,
    pub files: BTreeMap<String, String>,
    /// The stored assistant message, as broadcast in `message_created`.
    pub message: serde_json::Value,
}

/// Drives code agent runs against the injected ports.
#[derive(Clone)]
pub struct CodeAgentJob {
    runtime: Arc<dyn AgentRuntime>,
    store: Arc<dyn ResultStore>,
    publisher: Arc<dyn ChannelPublisher>,
    config: PipelineConfig,
}

impl CodeAgentJob {
    pub fn new(
        runtime: Arc<dyn AgentRuntime>,
        store: Arc<dyn ResultStore>,
        publisher: Arc<dyn ChannelPublisher>,
    ) -> Self {
        Self {
            runtime,
            store,
            publisher,
            config: PipelineConfig::with_defaults(),
        }
    }

    #[must_use]
    pub const fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// A progress manager for `project_id` configured for this job.
    pub fn progress_manager(&self, project_id: &str) -> ProgressManager {
        ProgressManager::builder(project_id, Arc::clone(&self.publisher))
            .throttle_interval(self.config.throttle_interval)
            .build()
    }

    /// Run with a fresh progress manager.
    pub async fn run(&self, request: JobRequest) -> Result<JobOutput, JobError> {
        let progress = self.progress_manager(&request.project_id);
        self.run_with_progress(request, progress).await
    }

    /// Run, reporting through an existing (typically registered) manager.
    pub async fn run_with_progress(
        &self,
        request: JobRequest,
        progress: ProgressManager,
    ) -> Result<JobOutput, JobError> {
        let project_id = request.project_id.as_str();
        tracing::info!(project_id, first = request.first_conversation, "Starting code agent run");

        progress.add_step(labels::ANALYZING_REQUEST, StepOptions::thinking());

        if request.first_conversation {
            self.name_project(project_id, &request.prompt, &progress).await?;
        }

        progress.add_step(labels::THINKING, StepOptions::thinking());
        let outcome = self.run_agent(&request.prompt, &progress).await;

        let title_step =
            progress.add_step(labels::GENERATING_FRAGMENT_TITLE, StepOptions::thinking());
        let title = match self
            .generate(GenerationTask::FragmentTitle, &outcome.summary, None)
            .await
        {
            Ok(title) if !title.trim().is_empty() => title,
            Ok(_) => FALLBACK_FRAGMENT_TITLE.to_string(),
            Err(e) => {
                tracing::warn!(project_id, error = %e, "Fragment title generation failed");
                FALLBACK_FRAGMENT_TITLE.to_string()
            }
        };
        progress.complete_step(&title_step, StepResult::content("done"));

        let response_step =
            progress.add_step(labels::GENERATING_FINAL_RESPONSE, StepOptions::thinking());
        let response = self
            .generate(GenerationTask::FinalResponse, &outcome.summary, None)
            .await
            .unwrap_or_else(|e| {
                tracing::warn!(project_id, error = %e, "Final response generation failed");
                String::new()
            });
        progress.complete_step(&response_step, StepResult::content(response.clone()));

        let url_step = progress.add_step(
            labels::GENERATING_SANDBOX_URL,
            StepOptions::of_type(StepType::Default),
        );
        let sandbox_url = match self.runtime.sandbox_url().await {
            Ok(url) => Some(url),
            Err(e) => {
                tracing::warn!(project_id, error = %e, "Sandbox URL unavailable");
                progress.fail_step(&url_step, Some(e.to_string()));
                None
            }
        };

        let save_step =
            progress.add_step(labels::SAVING_RESULT, StepOptions::of_type(StepType::Default));
        let message = match &sandbox_url {
            Some(url) if outcome.is_usable() => NewMessage::result(
                response,
                Fragment {
                    sandbox_url: url.clone(),
                    title: title.clone(),
                    files: outcome.files.clone(),
                },
            ),
            _ => NewMessage::error(),
        };
        let stored = match self.store.save_message(project_id, message).await {
            Ok(stored) => stored,
            Err(e) => {
                progress.fail_step(&save_step, Some(e.to_string()));
                progress.flush();
                return Err(e.into());
            }
        };
        self.publisher
            .publish(project_id, &AppEvent::message_created(stored.clone()));
        progress.complete_step(&save_step, StepResult::default());
        progress.flush();

        tracing::info!(project_id, files = outcome.files.len(), "Code agent run finished");
        Ok(JobOutput {
            sandbox_url: sandbox_url.unwrap_or_default(),
            title,
            summary: outcome.summary,
            files: outcome.files,
            message: stored,
        })
    }

    async fn name_project(
        &self,
        project_id: &str,
        prompt: &str,
        progress: &ProgressManager,
    ) -> Result<(), JobError> {
        let step = progress.add_step(labels::GENERATING_PROJECT_NAME, StepOptions::thinking());
        let name = match self
            .generate(GenerationTask::ProjectName, prompt, Some(progress))
            .await
        {
            Ok(name) if !name.trim().is_empty() => name.trim().to_string(),
            Ok(_) => {
                progress.fail_step(&step, None);
                return Ok(());
            }
            Err(e) => {
                tracing::warn!(project_id, error = %e, "Project name generation failed");
                progress.fail_step(&step, Some(e.to_string()));
                return Ok(());
            }
        };
        progress.complete_step(&step, StepResult::content(name.clone()));

        let stored = self.store.rename_project(project_id, &name).await?;
        self.publisher
            .publish(project_id, &AppEvent::project_name_updated(stored));
        Ok(())
    }

    /// Run the coding agent, feeding its events to the progress bridge.
    ///
    /// Runtime failures degrade to an empty outcome.
    async fn run_agent(&self, prompt: &str, progress: &ProgressManager) -> AgentOutcome {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut bridge = AgentProgressBridge::new(progress.clone());
        let drain = async {
            while let Some(event) = rx.recv().await {
                bridge.handle(&event);
            }
        };
        let (result, ()) = tokio::join!(self.runtime.run_code_agent(prompt, tx), drain);
        result.unwrap_or_else(|e| {
            tracing::warn!(channel = %progress.channel(), error = %e, "Code agent run failed");
            AgentOutcome::default()
        })
    }

    /// Run a generation task, streaming deltas into the current step if
    /// `progress` is given.
    async fn generate(
        &self,
        task: GenerationTask,
        input: &str,
        progress: Option<&ProgressManager>,
    ) -> Result<String, AgentError> {
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        let drain = async {
            while let Some(delta) = rx.recv().await {
                if let Some(progress) = progress {
                    progress.append_content(&delta);
                }
            }
        };
        let (result, ()) = tokio::join!(self.runtime.generate(task, input, tx), drain);
        result
    }
}

impl std::fmt::Debug for CodeAgentJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodeAgentJob")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{AgentEvent, ScriptedAgent};
    use crate::hub::{EventHub, EventSink, SinkError};
    use crate::ports::{InMemoryResultStore, MockResultStore};
    use crate::progress::StepStatus;
    use serde_json::json;
    use std::sync::Mutex;

    fn record(hub: &EventHub, channel: &str) -> Arc<Mutex<Vec<AppEvent>>> {
        let received = Arc::new(Mutex::new(Vec::new()));
        let captured = received.clone();
        let sink: Arc<dyn EventSink> = Arc::new(move |msg: &str| -> Result<(), SinkError> {
            captured.lock().unwrap().push(serde_json::from_str(msg).unwrap());
            Ok(())
        });
        hub.add_connection(channel, sink);
        received
    }

    fn job(agent: ScriptedAgent, store: Arc<dyn ResultStore>, hub: &Arc<EventHub>) -> CodeAgentJob {
        CodeAgentJob::new(Arc::new(agent), store, hub.clone())
    }

    #[tokio::test]
    async fn test_successful_run_saves_result_and_notifies() {
        let hub = Arc::new(EventHub::new());
        let events = record(&hub, "p1");
        let store = Arc::new(InMemoryResultStore::new());
        let job = job(ScriptedAgent::demo("a landing page"), store.clone(), &hub);

        let output = job
            .run(JobRequest::new("p1", "a landing page").first_conversation(true))
            .await
            .unwrap();

        assert_eq!(output.title, "Landing Page");
        assert_eq!(output.sandbox_url, "https://3000-demo.sandbox.local");
        assert_eq!(output.message["type"], "RESULT");
        assert_eq!(store.project_name("p1").as_deref(), Some("A Landing Page"));
        assert_eq!(store.messages("p1").len(), 1);

        let events = events.lock().unwrap();
        assert!(events.contains(&AppEvent::project_name_updated("A Landing Page")));
        assert!(
            events
                .iter()
                .any(|e| matches!(e, AppEvent::MessageCreated { message } if message["type"] == "RESULT"))
        );
        let Some(AppEvent::ProgressUpdate { progress }) = events.last() else {
            panic!("run must end with a progress snapshot");
        };
        assert!(progress.steps.iter().all(|s| !s.is_in_progress()));
        let labels_seen: Vec<&str> = progress.steps.iter().map(|s| s.label.as_str()).collect();
        assert!(labels_seen.contains(&labels::EXECUTING_COMMAND));
        assert!(labels_seen.contains(&labels::UPDATING_FILES));
        assert_eq!(labels_seen.last(), Some(&labels::SAVING_RESULT));
    }

    #[tokio::test]
    async fn test_run_without_files_saves_error_message() {
        let hub = Arc::new(EventHub::new());
        let store = Arc::new(InMemoryResultStore::new());
        let agent = ScriptedAgent::new(vec![AgentEvent::text("hmm")])
            .with_summary("<task_summary>nothing</task_summary>")
            .with_sandbox_url("https://sandbox.local");
        let job = job(agent, store.clone(), &hub);

        let output = job.run(JobRequest::new("p1", "do nothing")).await.unwrap();

        assert_eq!(output.message["type"], "ERROR");
        assert_eq!(output.message["content"], NewMessage::ERROR_CONTENT);
        assert_eq!(output.title, FALLBACK_FRAGMENT_TITLE);
        assert_eq!(store.project_name("p1"), None);
    }

    #[tokio::test]
    async fn test_store_failure_propagates() {
        let hub = Arc::new(EventHub::new());
        let mut store = MockResultStore::new();
        store
            .expect_save_message()
            .times(1)
            .returning(|_, _| Err(StoreError::Storage("disk full".into())));
        store.expect_rename_project().never();
        let job = job(ScriptedAgent::demo("x"), Arc::new(store), &hub);
        let progress = job.progress_manager("p1");

        let err = job
            .run_with_progress(JobRequest::new("p1", "x"), progress.clone())
            .await
            .unwrap_err();

        assert!(matches!(err, JobError::Store(StoreError::Storage(_))));
        let snapshot = progress.snapshot();
        let last = snapshot.steps.last().unwrap();
        assert_eq!(last.label, labels::SAVING_RESULT);
        assert_eq!(last.status, StepStatus::Error);
    }

    #[tokio::test]
    async fn test_first_conversation_renames_through_store() {
        let hub = Arc::new(EventHub::new());
        let mut store = MockResultStore::new();
        store
            .expect_rename_project()
            .withf(|id, name| id == "p1" && name == "Todo App")
            .times(1)
            .returning(|_, name| Ok(name.to_string()));
        store
            .expect_save_message()
            .returning(|_, message| Ok(json!({"type": message.kind})));
        let agent = ScriptedAgent::demo("x").with_generation(GenerationTask::ProjectName, "Todo App");
        let job = job(agent, Arc::new(store), &hub);
        let progress = job.progress_manager("p1");

        job.run_with_progress(JobRequest::new("p1", "x").first_conversation(true), progress.clone())
            .await
            .unwrap();

        let snapshot = progress.snapshot();
        let naming = snapshot
            .steps
            .iter()
            .find(|s| s.label == labels::GENERATING_PROJECT_NAME)
            .unwrap();
        assert_eq!(naming.status, StepStatus::Completed);
        assert_eq!(naming.content.as_deref(), Some("Todo App"));
    }

    #[tokio::test]
    async fn test_missing_sandbox_url_saves_error_message() {
        let hub = Arc::new(EventHub::new());
        let store = Arc::new(InMemoryResultStore::new());
        let agent = ScriptedAgent::new(vec![AgentEvent::tool_call(
            "createOrUpdateFiles",
            json!({"files": [{"path": "a.ts", "content": "x"}]}),
        )])
        .with_summary("<task_summary>done</task_summary>");
        let job = job(agent, store, &hub);
        let progress = job.progress_manager("p1");

        let output = job
            .run_with_progress(JobRequest::new("p1", "x"), progress.clone())
            .await
            .unwrap();

        assert_eq!(output.message["type"], "ERROR");
        let snapshot = progress.snapshot();
        let url_step = snapshot
            .steps
            .iter()
            .find(|s| s.label == labels::GENERATING_SANDBOX_URL)
            .unwrap();
        assert_eq!(url_step.status, StepStatus::Error);
    }
}
