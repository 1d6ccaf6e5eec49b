//! Result store port.
//!
//! The relational data store is external; the job driver only needs to
//! rename a project and persist the final assistant message.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

/// Errors reported by the result store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The project does not exist.
    #[error("Project not found: {0}")]
    ProjectNotFound(String),

    /// Storage backend error.
    #[error("Storage error: {0}")]
    Storage(String),
}

/// Kind of assistant message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageKind {
    Result,
    Error,
}

/// Generated code fragment attached to a result message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fragment {
    pub sandbox_url: String,
    pub title: String,
    pub files: BTreeMap<String, String>,
}

/// A message to persist at the end of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMessage {
    pub content: String,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fragment: Option<Fragment>,
}

impl NewMessage {
    /// Message content shown when a run failed to produce anything.
    pub const ERROR_CONTENT: &'static str = "Functions.error";

    #[must_use]
    pub fn error() -> Self {
        Self {
            content: Self::ERROR_CONTENT.to_string(),
            kind: MessageKind::Error,
            fragment: None,
        }
    }

    pub fn result(content: impl Into<String>, fragment: Fragment) -> Self {
        Self {
            content: content.into(),
            kind: MessageKind::Result,
            fragment: Some(fragment),
        }
    }
}

/// Port for the external data store.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Rename a project, returning the stored name.
    async fn rename_project(&self, project_id: &str, name: &str) -> Result<String, StoreError>;

    /// Persist an assistant message, returning the stored message object.
    async fn save_message(
        &self,
        project_id: &str,
        message: NewMessage,
    ) -> Result<serde_json::Value, StoreError>;
}

#[derive(Debug, Default)]
struct ProjectRecord {
    name: Option<String>,
    messages: Vec<serde_json::Value>,
}

/// In-process store used by the demo server and tests.
///
/// Projects are created on first use.
#[derive(Debug, Default)]
pub struct InMemoryResultStore {
    projects: Mutex<HashMap<String, ProjectRecord>>,
}

impl InMemoryResultStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current project name, if it was ever renamed.
    pub fn project_name(&self, project_id: &str) -> Option<String> {
        let projects = self.projects.lock().unwrap_or_else(PoisonError::into_inner);
        projects.get(project_id).and_then(|p| p.name.clone())
    }

    /// Messages saved for a project, oldest first.
    pub fn messages(&self, project_id: &str) -> Vec<serde_json::Value> {
        let projects = self.projects.lock().unwrap_or_else(PoisonError::into_inner);
        projects
            .get(project_id)
            .map(|p| p.messages.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ResultStore for InMemoryResultStore {
    async fn rename_project(&self, project_id: &str, name: &str) -> Result<String, StoreError> {
        let mut projects = self.projects.lock().unwrap_or_else(PoisonError::into_inner);
        let record = projects.entry(project_id.to_string()).or_default();
        record.name = Some(name.to_string());
        Ok(name.to_string())
    }

    async fn save_message(
        &self,
        project_id: &str,
        message: NewMessage,
    ) -> Result<serde_json::Value, StoreError> {
        let mut stored = serde_json::to_value(&message)
            .map_err(|e| StoreError::Storage(format!("Failed to encode message: {e}")))?;
        if let Some(object) = stored.as_object_mut() {
            object.insert("id".into(), json!(uuid::Uuid::new_v4().to_string()));
            object.insert("projectId".into(), json!(project_id));
            object.insert("role".into(), json!("ASSISTANT"));
            object.insert("createdAt".into(), json!(chrono::Utc::now().to_rfc3339()));
        }

        let mut projects = self.projects.lock().unwrap_or_else(PoisonError::into_inner);
        projects
            .entry(project_id.to_string())
            .or_default()
            .messages
            .push(stored.clone());
        Ok(stored)
    }
}
