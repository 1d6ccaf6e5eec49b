//! Agent runtime port.
//!
//! Abstracts the LLM agent framework and its sandbox. The job driver only
//! sees lifecycle events and final outputs; model calls, tool execution and
//! sandbox I/O all happen behind this trait.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::agent::AgentEvent;

/// Errors reported by the agent runtime.
#[derive(Debug, Error)]
pub enum AgentError {
    /// The model provider failed or returned an unusable response.
    #[error("Model error: {0}")]
    Model(String),

    /// The sandbox could not be created or reached.
    #[error("Sandbox error: {0}")]
    Sandbox(String),

    /// The run exceeded its iteration budget without finishing.
    #[error("Agent stopped after {0} iterations without a summary")]
    IterationLimit(u32),
}

/// One-shot text generation tasks run around the main coding agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationTask {
    ProjectName,
    FragmentTitle,
    FinalResponse,
}

/// Final state of a coding agent run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentOutcome {
    /// The agent's task summary; empty when it never finished.
    pub summary: String,
    /// Files written in the sandbox, keyed by path.
    pub files: BTreeMap<String, String>,
}

impl AgentOutcome {
    /// Whether the run produced something worth presenting.
    #[must_use]
    pub fn is_usable(&self) -> bool {
        !self.summary.trim().is_empty() && !self.files.is_empty()
    }
}

/// Port for the external agent framework.
#[async_trait]
pub trait AgentRuntime: Send + Sync {
    /// Run the coding agent to completion, reporting lifecycle events.
    ///
    /// Events must be sent in the order they happen. The sender is dropped
    /// when the run ends.
    async fn run_code_agent(
        &self,
        prompt: &str,
        events: mpsc::UnboundedSender<AgentEvent>,
    ) -> Result<AgentOutcome, AgentError>;

    /// Run a one-shot generation, streaming text deltas as they arrive.
    async fn generate(
        &self,
        task: GenerationTask,
        input: &str,
        deltas: mpsc::UnboundedSender<String>,
    ) -> Result<String, AgentError>;

    /// Public URL of the sandbox preview.
    async fn sandbox_url(&self) -> Result<String, AgentError>;
}
