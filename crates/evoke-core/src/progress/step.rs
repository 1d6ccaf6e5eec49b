//! Progress step types.
//!
//! A step is one unit of visible work inside a job run. Steps are created
//! `in-progress`, accumulate content while they are current, and end up
//! `completed` or `error` (or are pruned entirely, see
//! [`SuppressionPolicy`](super::SuppressionPolicy)).

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque identifier of a step, unique within one run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepId(String);

impl StepId {
    /// Generate a fresh identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// Borrow the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StepId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Status of a progress step.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StepStatus {
    /// Known but not started.
    #[default]
    Pending,
    /// The current step of the run.
    InProgress,
    /// Finished successfully.
    Completed,
    /// Finished with an error (terminal for this step only).
    Error,
}

impl StepStatus {
    /// Wire representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in-progress",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }
}

/// Kind of a progress step.
///
/// Only consulted by the suppression policy; display is driven by the label.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepType {
    #[default]
    Default,
    Thinking,
    Command,
    File,
}

/// One unit of visible work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressStep {
    /// Stable identifier for the lifetime of the step.
    pub id: StepId,
    /// Semantic step kind, used as a lookup key for localized text.
    pub label: String,
    /// Current status.
    pub status: StepStatus,
    /// Creation time in milliseconds since the Unix epoch.
    pub timestamp: u64,
    /// Short supplementary text (command line, file list, error summary).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Accumulated body (model thinking text or tool output).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Step kind.
    #[serde(rename = "type", default)]
    pub step_type: StepType,
}

impl ProgressStep {
    /// Create a new in-progress step stamped with the current time.
    pub fn start(label: impl Into<String>, options: StepOptions) -> Self {
        Self {
            id: StepId::generate(),
            label: label.into(),
            status: StepStatus::InProgress,
            timestamp: now_millis(),
            detail: options.detail,
            content: options.content,
            step_type: options.step_type,
        }
    }

    /// Whether this step is the current one.
    #[must_use]
    pub fn is_in_progress(&self) -> bool {
        self.status == StepStatus::InProgress
    }

    /// Whether the step has accumulated any content.
    #[must_use]
    pub fn has_content(&self) -> bool {
        self.content.as_deref().is_some_and(|c| !c.is_empty())
    }

    /// Apply a partial update onto this step.
    pub fn apply(&mut self, update: &StepUpdate) {
        if let Some(ref label) = update.label {
            self.label.clone_from(label);
        }
        if let Some(status) = update.status {
            self.status = status;
        }
        if let Some(ref detail) = update.detail {
            self.detail.clone_from(detail);
        }
        if let Some(ref content) = update.content {
            self.content.clone_from(content);
        }
        if let Some(step_type) = update.step_type {
            self.step_type = step_type;
        }
    }
}

fn now_millis() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or_default()
}

/// Options for creating a step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct StepOptions {
    pub detail: Option<String>,
    pub content: Option<String>,
    #[serde(rename = "type", default)]
    pub step_type: StepType,
}

impl StepOptions {
    /// Options for a step of the given type.
    #[must_use]
    pub fn of_type(step_type: StepType) -> Self {
        Self {
            step_type,
            ..Self::default()
        }
    }

    /// Options for a `thinking` step.
    #[must_use]
    pub fn thinking() -> Self {
        Self::of_type(StepType::Thinking)
    }

    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    #[must_use]
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }
}

/// Partial step update.
///
/// `detail` and `content` are `Option<Option<String>>`:
/// - `None` = don't change this field
/// - `Some(None)` = clear the field
/// - `Some(Some(value))` = set the field to value
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct StepUpdate {
    pub label: Option<String>,
    pub status: Option<StepStatus>,
    pub detail: Option<Option<String>>,
    pub content: Option<Option<String>>,
    #[serde(rename = "type")]
    pub step_type: Option<StepType>,
}

impl StepUpdate {
    /// An update that only changes the status.
    #[must_use]
    pub fn status(status: StepStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_detail(mut self, detail: Option<String>) -> Self {
        self.detail = Some(detail);
        self
    }

    #[must_use]
    pub fn with_content(mut self, content: Option<String>) -> Self {
        self.content = Some(content);
        self
    }

    /// Whether this update changes the status (and must bypass throttling).
    #[must_use]
    pub const fn changes_status(&self) -> bool {
        self.status.is_some()
    }
}

/// Result fields recorded when a step completes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct StepResult {
    pub detail: Option<String>,
    pub content: Option<String>,
}

impl StepResult {
    #[must_use]
    pub fn content(content: impl Into<String>) -> Self {
        Self {
            detail: None,
            content: Some(content.into()),
        }
    }

    /// Fold into a completion update; absent fields leave the step unchanged.
    #[must_use]
    pub fn into_update(self) -> StepUpdate {
        StepUpdate {
            status: Some(StepStatus::Completed),
            detail: self.detail.map(Some),
            content: self.content.map(Some),
            ..StepUpdate::default()
        }
    }
}
