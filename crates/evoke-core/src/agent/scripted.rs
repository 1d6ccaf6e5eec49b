use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::mpsc;

use super::{AgentEvent, ToolArgs, ToolKind};
use crate::ports::{AgentError, AgentOutcome, AgentRuntime, GenerationTask};

/// Deterministic [`AgentRuntime`] that replays a fixed list of events.
///
/// Files written by `createOrUpdateFiles` calls in the script become the
/// outcome's files. Generations without a configured text fail with
/// [`AgentError::Model`].
#[derive(Debug, Clone, Default)]
pub struct ScriptedAgent {
    script: Vec<AgentEvent>,
    step_delay: Duration,
    summary: String,
    generations: HashMap<GenerationTask, String>,
    sandbox_url: Option<String>,
}

impl ScriptedAgent {
    pub fn new(script: Vec<AgentEvent>) -> Self {
        Self {
            script,
            ..Self::default()
        }
    }

    /// A short run that scaffolds a page, for demos.
    pub fn demo(prompt: &str) -> Self {
        let script = vec![
            AgentEvent::text("Planning the page layout. "),
            AgentEvent::text("Installing dependencies first."),
            AgentEvent::tool_call("terminal", json!({"command": "npm install lucide-react"})),
            AgentEvent::tool_output("added 1 package in 2s"),
            AgentEvent::text("Writing the page component."),
            AgentEvent::tool_call(
                "createOrUpdateFiles",
                json!({"files": [{
                    "path": "app/page.tsx",
                    "content": "export default function Page() { return <main /> }"
                }]}),
            ),
            AgentEvent::tool_output("ok"),
            AgentEvent::text("<task_summary>Created the page.</task_summary>"),
        ];
        Self::new(script)
            .with_summary("<task_summary>Created the page.</task_summary>")
            .with_generation(GenerationTask::ProjectName, title_from_prompt(prompt))
            .with_generation(GenerationTask::FragmentTitle, "Landing Page")
            .with_generation(
                GenerationTask::FinalResponse,
                "I built a landing page with a single component.",
            )
            .with_sandbox_url("https://3000-demo.sandbox.local")
    }

    /// Replace the event script, keeping generations and sandbox settings.
    #[must_use]
    pub fn with_script(mut self, script: Vec<AgentEvent>) -> Self {
        self.script = script;
        self
    }

    #[must_use]
    pub const fn with_step_delay(mut self, delay: Duration) -> Self {
        self.step_delay = delay;
        self
    }

    #[must_use]
    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }

    #[must_use]
    pub fn with_generation(mut self, task: GenerationTask, text: impl Into<String>) -> Self {
        self.generations.insert(task, text.into());
        self
    }

    #[must_use]
    pub fn with_sandbox_url(mut self, url: impl Into<String>) -> Self {
        self.sandbox_url = Some(url.into());
        self
    }

    async fn pause(&self) {
        if !self.step_delay.is_zero() {
            tokio::time::sleep(self.step_delay).await;
        }
    }

    fn written_files(&self) -> BTreeMap<String, String> {
        let mut files = BTreeMap::new();
        for event in &self.script {
            let AgentEvent::ToolCallStarted { tool, args } = event else {
                continue;
            };
            if ToolKind::from_name(tool) != Some(ToolKind::CreateOrUpdateFiles) {
                continue;
            }
            for file in ToolArgs::parse(args).files.unwrap_or_default() {
                files.insert(file.path, file.content.unwrap_or_default());
            }
        }
        files
    }
}

#[async_trait]
impl AgentRuntime for ScriptedAgent {
    async fn run_code_agent(
        &self,
        prompt: &str,
        events: mpsc::UnboundedSender<AgentEvent>,
    ) -> Result<AgentOutcome, AgentError> {
        tracing::debug!(events = self.script.len(), prompt_len = prompt.len(), "Replaying script");
        for event in &self.script {
            self.pause().await;
            if events.send(event.clone()).is_err() {
                tracing::debug!("Event receiver dropped, stopping replay");
                break;
            }
        }
        Ok(AgentOutcome {
            summary: self.summary.clone(),
            files: self.written_files(),
        })
    }

    async fn generate(
        &self,
        task: GenerationTask,
        _input: &str,
        deltas: mpsc::UnboundedSender<String>,
    ) -> Result<String, AgentError> {
        let text = self
            .generations
            .get(&task)
            .ok_or_else(|| AgentError::Model(format!("No scripted output for {task:?}")))?;
        for chunk in text.split_inclusive(' ') {
            self.pause().await;
            // Streaming is optional for the caller.
            let _ = deltas.send(chunk.to_string());
        }
        Ok(text.clone())
    }

    async fn sandbox_url(&self) -> Result<String, AgentError> {
        self.sandbox_url
            .clone()
            .ok_or_else(|| AgentError::Sandbox("No sandbox configured".to_string()))
    }
}

/// First few words of the prompt, capitalized.
fn title_from_prompt(prompt: &str) -> String {
    let words: Vec<String> = prompt
        .split_whitespace()
        .take(3)
        .map(|word| {
            let mut chars = word.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_uppercase().chain(chars).collect()
            })
        })
        .collect();
    if words.is_empty() {
        "Untitled Project".to_string()
    } else {
        words.join(" ")
    }
}
