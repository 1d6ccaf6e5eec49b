//! Channel registry and fan-out.
//!
//! The hub maps a channel (project/job id) to the sinks of the connections
//! currently open for it. It knows nothing about progress semantics; any
//! serializable payload can be broadcast.
//!
//! Delivery is best-effort and in order per sink. There is no backlog: a
//! sink registered after an event was sent never sees that event.

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, PoisonError, RwLock};

use serde::Serialize;
use thiserror::Error;

use crate::events::AppEvent;
use crate::ports::ChannelPublisher;

/// Errors a sink can report while delivering a message.
#[derive(Debug, Error)]
pub enum SinkError {
    /// The underlying connection is gone.
    #[error("Sink closed")]
    Closed,

    /// Delivery failed for another reason.
    #[error("Delivery failed: {0}")]
    Failed(String),
}

/// One open client connection able to receive serialized events.
pub trait EventSink: Send + Sync {
    /// Deliver a pre-serialized message. Must not block.
    fn send(&self, message: &str) -> Result<(), SinkError>;
}

impl<F> EventSink for F
where
    F: Fn(&str) -> Result<(), SinkError> + Send + Sync,
{
    fn send(&self, message: &str) -> Result<(), SinkError> {
        self(message)
    }
}

fn same_sink(a: &Arc<dyn EventSink>, b: &Arc<dyn EventSink>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

/// Process-wide registry of channel subscribers.
///
/// Constructed once by the composition root and shared via `Arc`.
#[derive(Default)]
pub struct EventHub {
    channels: RwLock<HashMap<String, Vec<Arc<dyn EventSink>>>>,
}

impl EventHub {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `sink` under `channel`. Returns false if it was already registered.
    pub fn add_connection(&self, channel: &str, sink: Arc<dyn EventSink>) -> bool {
        let mut channels = self.channels.write().unwrap_or_else(PoisonError::into_inner);
        let sinks = channels.entry(channel.to_string()).or_default();
        if sinks.iter().any(|s| same_sink(s, &sink)) {
            return false;
        }
        sinks.push(sink);
        tracing::debug!(channel, connections = sinks.len(), "Connection added");
        true
    }

    /// Unregister `sink`; drops the channel entry once it has no sinks left.
    pub fn remove_connection(&self, channel: &str, sink: &Arc<dyn EventSink>) -> bool {
        let mut channels = self.channels.write().unwrap_or_else(PoisonError::into_inner);
        let Some(sinks) = channels.get_mut(channel) else {
            return false;
        };
        let before = sinks.len();
        sinks.retain(|s| !same_sink(s, sink));
        let removed = sinks.len() != before;
        let remaining = sinks.len();
        if remaining == 0 {
            channels.remove(channel);
        }
        if removed {
            tracing::debug!(channel, connections = remaining, "Connection removed");
        }
        removed
    }

    /// Serialize `data` once and deliver it to every sink of `channel`.
    ///
    /// Returns the number of sinks that accepted the message. A sink that
    /// errors or panics is logged and skipped; this never fails.
    pub fn send_event<T: Serialize + ?Sized>(&self, channel: &str, data: &T) -> usize {
        let sinks = {
            let channels = self.channels.read().unwrap_or_else(PoisonError::into_inner);
            match channels.get(channel) {
                Some(sinks) if !sinks.is_empty() => sinks.clone(),
                _ => return 0,
            }
        };

        let message = match serde_json::to_string(data) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!(channel, "Failed to serialize event: {}", e);
                return 0;
            }
        };

        let mut delivered = 0;
        for sink in &sinks {
            match catch_unwind(AssertUnwindSafe(|| sink.send(&message))) {
                Ok(Ok(())) => delivered += 1,
                Ok(Err(e)) => tracing::warn!(channel, error = %e, "Error sending event to sink"),
                Err(_) => tracing::warn!(channel, "Sink panicked while sending event"),
            }
        }
        delivered
    }

    /// Number of sinks currently registered for `channel` (0 if unknown).
    pub fn connection_count(&self, channel: &str) -> usize {
        let channels = self.channels.read().unwrap_or_else(PoisonError::into_inner);
        channels.get(channel).map_or(0, Vec::len)
    }

    /// Number of channels with at least one sink.
    pub fn channel_count(&self) -> usize {
        self.channels
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl std::fmt::Debug for EventHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventHub")
            .field("channels", &self.channel_count())
            .finish()
    }
}

impl ChannelPublisher for EventHub {
    fn publish(&self, channel: &str, event: &AppEvent) {
        let delivered = self.send_event(channel, event);
        tracing::trace!(channel, kind = event.kind(), delivered, "Published event");
    }
}
