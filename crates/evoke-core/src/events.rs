//! Canonical wire events delivered over a channel.
//!
//! # Wire Format
//!
//! Events are serialized with a `type` tag:
//!
//! ```json
//! { "type": "progress_update", "progress": { "currentStep": "…", "steps": [] } }
//! ```
//!
//! Progress updates are produced by the progress manager; the other variants
//! are one-shot notifications routed through the same hub.

use serde::{Deserialize, Serialize};

use crate::progress::ProgressSnapshot;

/// Events sent to subscribers of a channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppEvent {
    /// Acknowledgement sent once when a subscription opens.
    Connected {
        #[serde(rename = "projectId")]
        project_id: String,
    },

    /// Full progress snapshot of the running job.
    ProgressUpdate { progress: ProgressSnapshot },

    /// A message (the job's persisted result) was created.
    MessageCreated {
        /// Message object as returned by the data store.
        message: serde_json::Value,
    },

    /// The project was renamed.
    ProjectNameUpdated { name: String },
}

impl AppEvent {
    pub fn connected(project_id: impl Into<String>) -> Self {
        Self::Connected {
            project_id: project_id.into(),
        }
    }

    pub const fn progress_update(progress: ProgressSnapshot) -> Self {
        Self::ProgressUpdate { progress }
    }

    pub const fn message_created(message: serde_json::Value) -> Self {
        Self::MessageCreated { message }
    }

    pub fn project_name_updated(name: impl Into<String>) -> Self {
        Self::ProjectNameUpdated { name: name.into() }
    }

    /// The wire discriminant.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Connected { .. } => "connected",
            Self::ProgressUpdate { .. } => "progress_update",
            Self::MessageCreated { .. } => "message_created",
            Self::ProjectNameUpdated { .. } => "project_name_updated",
        }
    }
}
