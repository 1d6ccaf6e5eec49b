//! Agent lifecycle events and their mapping onto progress steps.
//!
//! The agent framework reports what it is doing as a stream of
//! [`AgentEvent`]s. [`AgentProgressBridge`] turns that stream into progress
//! operations; [`ScriptedAgent`] is a deterministic runtime that replays a
//! fixed event list.

mod bridge;
mod scripted;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

pub use bridge::{AgentProgressBridge, MAX_TOOL_OUTPUT_CHARS};
pub use scripted::ScriptedAgent;

// ── Lifecycle events ───────────────────────────────────────────────

/// One lifecycle signal from a running agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    /// A chunk of streamed model text.
    TextDelta { text: String },

    /// The model finished emitting a tool call.
    ToolCallStarted {
        tool: String,
        #[serde(default)]
        args: serde_json::Value,
    },

    /// A tool finished; `output` is its textual result.
    ToolCallFinished { output: String },
}

impl AgentEvent {
    pub fn text(text: impl Into<String>) -> Self {
        Self::TextDelta { text: text.into() }
    }

    pub fn tool_call(tool: impl Into<String>, args: serde_json::Value) -> Self {
        Self::ToolCallStarted {
            tool: tool.into(),
            args,
        }
    }

    pub fn tool_output(output: impl Into<String>) -> Self {
        Self::ToolCallFinished {
            output: output.into(),
        }
    }
}

// ── Tools ──────────────────────────────────────────────────────────

/// Tools the coding agent can call in its sandbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKind {
    Terminal,
    CreateOrUpdateFiles,
    ReadFiles,
}

impl ToolKind {
    /// Resolve a tool by its wire name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "terminal" => Some(Self::Terminal),
            "createOrUpdateFiles" => Some(Self::CreateOrUpdateFiles),
            "readFiles" => Some(Self::ReadFiles),
            _ => None,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Terminal => "terminal",
            Self::CreateOrUpdateFiles => "createOrUpdateFiles",
            Self::ReadFiles => "readFiles",
        }
    }
}

/// A file written by `createOrUpdateFiles`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct FileArg {
    pub path: String,
    #[serde(default)]
    pub content: Option<String>,
}

/// Union of the arguments accepted by the known tools.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ToolArgs {
    pub command: Option<String>,
    pub files: Option<Vec<FileArg>>,
    #[serde(rename = "filePaths")]
    pub file_paths: Option<Vec<String>>,
}

impl ToolArgs {
    /// Lenient parse. Each field is read on its own, so a malformed field
    /// only drops that field.
    pub fn parse(value: &serde_json::Value) -> Self {
        Self {
            command: field(value, "command"),
            files: field(value, "files"),
            file_paths: field(value, "filePaths"),
        }
    }
}

fn field<T: DeserializeOwned>(value: &serde_json::Value, key: &str) -> Option<T> {
    value
        .get(key)
        .and_then(|v| T::deserialize(v).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_agent_event_wire_format() {
        let event: AgentEvent = serde_json::from_value(json!({
            "type": "tool_call_started",
            "tool": "terminal",
            "args": {"command": "npm install"}
        }))
        .unwrap();
        assert_eq!(event, AgentEvent::tool_call("terminal", json!({"command": "npm install"})));

        let delta: AgentEvent =
            serde_json::from_value(json!({"type": "text_delta", "text": "hi"})).unwrap();
        assert_eq!(delta, AgentEvent::text("hi"));
    }

    #[test]
    fn test_tool_kind_from_name() {
        assert_eq!(ToolKind::from_name("terminal"), Some(ToolKind::Terminal));
        assert_eq!(ToolKind::from_name("readFiles"), Some(ToolKind::ReadFiles));
        assert_eq!(ToolKind::from_name("browse"), None);
        assert_eq!(ToolKind::CreateOrUpdateFiles.name(), "createOrUpdateFiles");
    }

    #[test]
    fn test_tool_args_malformed_field_keeps_others() {
        let args = ToolArgs::parse(&json!({"command": "ls", "files": "x"}));
        assert_eq!(args.command.as_deref(), Some("ls"));
        assert_eq!(args.files, None);

        let args = ToolArgs::parse(&json!({"files": [{"path": "a.ts"}], "filePaths": 3}));
        assert_eq!(args.files.map(|f| f.len()), Some(1));
        assert_eq!(args.file_paths, None);
    }

    #[test]
    fn test_tool_args_parse_is_lenient() {
        let args = ToolArgs::parse(&json!({"filePaths": ["a.ts", "b.ts"]}));
        assert_eq!(args.file_paths, Some(vec!["a.ts".to_string(), "b.ts".to_string()]));

        assert_eq!(ToolArgs::parse(&json!("not an object")), ToolArgs::default());
        assert_eq!(ToolArgs::parse(&json!({"command": 42})), ToolArgs::default());
    }
}
