//! Channel publisher port.
//!
//! Producers (progress managers, job completion notifiers) publish events
//! for a channel without knowing how or whether anyone is listening.

use crate::events::AppEvent;

/// Trait for publishing events to every subscriber of a channel.
///
/// # Implementations
///
/// - [`EventHub`](crate::hub::EventHub) - fans out to registered sinks
/// - [`NoopPublisher`] - for tests and contexts without subscribers
pub trait ChannelPublisher: Send + Sync {
    /// Publish an event to `channel`.
    ///
    /// Must not block and must not fail; delivery is best-effort.
    fn publish(&self, channel: &str, event: &AppEvent);
}

/// A publisher that discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopPublisher;

impl NoopPublisher {
    pub const fn new() -> Self {
        Self
    }
}

impl ChannelPublisher for NoopPublisher {
    fn publish(&self, _channel: &str, _event: &AppEvent) {
        // Intentionally do nothing
    }
}
