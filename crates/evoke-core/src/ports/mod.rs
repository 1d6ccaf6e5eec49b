//! Port definitions (trait abstractions) for external systems.
//!
//! Ports define the interfaces that the core expects from its collaborators:
//! the push transport, the agent framework and the data store. They contain
//! no implementation details beyond in-memory doubles.

pub mod agent_runtime;
pub mod publisher;
pub mod result_store;

pub use agent_runtime::{AgentError, AgentOutcome, AgentRuntime, GenerationTask};
pub use publisher::{ChannelPublisher, NoopPublisher};
pub use result_store::{
    Fragment, InMemoryResultStore, MessageKind, NewMessage, ResultStore, StoreError,
};

#[cfg(test)]
pub use result_store::MockResultStore;
