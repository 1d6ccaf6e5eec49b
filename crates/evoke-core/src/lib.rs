//! Core of the evoke progress pipeline.
//!
//! Turns the lifecycle of a long-running code agent run into a stream of
//! progress snapshots and fans them out to every client watching the
//! project. Transport adapters (SSE server, client) live in their own
//! crates and depend only on the types and ports defined here.

#![deny(unused_crate_dependencies)]

pub mod agent;
pub mod config;
pub mod events;
pub mod hub;
pub mod job;
pub mod ports;
pub mod progress;

// Re-export commonly used types for convenience
pub use agent::{AgentEvent, AgentProgressBridge, ScriptedAgent, ToolArgs, ToolKind};
pub use config::{DEFAULT_HEARTBEAT_INTERVAL, PipelineConfig};
pub use events::AppEvent;
pub use hub::{EventHub, EventSink, SinkError};
pub use job::{CodeAgentJob, JobError, JobOutput, JobRequest, RunRegistry};
pub use ports::{
    AgentError, AgentOutcome, AgentRuntime, ChannelPublisher, Fragment, GenerationTask,
    InMemoryResultStore, MessageKind, NewMessage, NoopPublisher, ResultStore, StoreError,
};
pub use progress::{
    DEFAULT_THROTTLE_INTERVAL, ProgressManager, ProgressSnapshot, ProgressState, ProgressStep,
    StepId, StepOptions, StepResult, StepStatus, StepType, StepUpdate, SuppressionPolicy,
};
