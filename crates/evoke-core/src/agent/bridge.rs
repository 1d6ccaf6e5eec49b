use super::{AgentEvent, ToolArgs, ToolKind};
use crate::progress::{
    ProgressManager, StepId, StepOptions, StepResult, StepType, labels,
};

/// Tool output longer than this many characters is truncated in step content.
pub const MAX_TOOL_OUTPUT_CHARS: usize = 500;

/// Output prefixes that mark a tool call as failed.
const FAILURE_PREFIXES: [&str; 2] = ["Command failed:", "Error:"];

/// Feeds agent lifecycle events into a [`ProgressManager`].
///
/// Holds the id of the step opened by the last tool call so its outcome can
/// be recorded when the tool finishes.
#[derive(Debug)]
pub struct AgentProgressBridge {
    progress: ProgressManager,
    tool_step: Option<StepId>,
}

impl AgentProgressBridge {
    pub const fn new(progress: ProgressManager) -> Self {
        Self {
            progress,
            tool_step: None,
        }
    }

    pub fn handle(&mut self, event: &AgentEvent) {
        match event {
            AgentEvent::TextDelta { text } => {
                self.progress.append_content(text);
            }
            AgentEvent::ToolCallStarted { tool, args } => self.tool_started(tool, args),
            AgentEvent::ToolCallFinished { output } => self.tool_finished(output),
        }
    }

    fn tool_started(&mut self, tool: &str, args: &serde_json::Value) {
        let Some(kind) = ToolKind::from_name(tool) else {
            tracing::debug!(tool, "Ignoring call to unknown tool");
            return;
        };
        let args = ToolArgs::parse(args);
        let step = match kind {
            ToolKind::Terminal => args.command.map(|command| {
                (
                    labels::EXECUTING_COMMAND,
                    StepOptions::of_type(StepType::Command).with_detail(command),
                )
            }),
            ToolKind::CreateOrUpdateFiles => args.files.map(|files| {
                let paths: Vec<&str> = files.iter().map(|f| f.path.as_str()).collect();
                (
                    labels::UPDATING_FILES,
                    StepOptions::of_type(StepType::File).with_detail(paths.join(", ")),
                )
            }),
            ToolKind::ReadFiles => args.file_paths.map(|paths| {
                (
                    labels::READING_FILES,
                    StepOptions::of_type(StepType::File).with_detail(paths.join(", ")),
                )
            }),
        };

        match step {
            Some((label, options)) => {
                self.tool_step = Some(self.progress.add_step(label, options));
            }
            None => tracing::debug!(tool, "Tool call without usable arguments"),
        }
    }

    fn tool_finished(&mut self, output: &str) {
        if let Some(id) = self.tool_step.take() {
            if FAILURE_PREFIXES.iter().any(|p| output.starts_with(p)) {
                self.progress.fail_step(&id, Some(output.to_string()));
            } else {
                self.progress
                    .complete_step(&id, StepResult::content(truncate_output(output)));
            }
        }
        self.progress
            .add_step(labels::THINKING, StepOptions::thinking());
    }
}

fn truncate_output(output: &str) -> String {
    match output.char_indices().nth(MAX_TOOL_OUTPUT_CHARS) {
        Some((end, _)) => format!("{}...", &output[..end]),
        None => output.to_string(),
    }
}
