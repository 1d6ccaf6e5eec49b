//! SSE transport for hub channels.
//!
//! Every connection gets an unbounded queue registered with the
//! [`EventHub`] as a sink. The response stream starts with a `connected`
//! record, then forwards each hub message as one `data:` record. Dropping
//! the stream (client disconnect) unregisters the sink.

use std::convert::Infallible;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use axum::http::HeaderName;
use axum::http::header::CACHE_CONTROL;
use axum::response::sse::{Event, KeepAlive, KeepAliveStream, Sse};
use evoke_core::{AppEvent, EventHub, EventSink, SinkError};
use futures_util::stream::{self, BoxStream, Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

/// Comment text sent on idle connections.
pub const HEARTBEAT_TEXT: &str = "heartbeat";

/// Response headers that keep proxies from caching or buffering the stream.
pub const STREAM_HEADERS: [(HeaderName, &str); 2] = [
    (CACHE_CONTROL, "no-cache, no-transform"),
    (HeaderName::from_static("x-accel-buffering"), "no"),
];

/// Hub sink backed by the connection's outgoing queue.
#[derive(Debug)]
pub struct StreamSink {
    tx: mpsc::UnboundedSender<String>,
}

impl EventSink for StreamSink {
    fn send(&self, message: &str) -> Result<(), SinkError> {
        self.tx
            .send(message.to_string())
            .map_err(|_| SinkError::Closed)
    }
}

/// Unregisters the sink when the response stream is dropped.
struct ConnectionGuard {
    hub: Arc<EventHub>,
    channel: String,
    sink: Arc<dyn EventSink>,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.hub.remove_connection(&self.channel, &self.sink);
        tracing::info!(
            channel = %self.channel,
            connections = self.hub.connection_count(&self.channel),
            "SSE connection closed"
        );
    }
}

/// Event stream that owns its connection's registration.
pub struct ChannelStream {
    inner: BoxStream<'static, Result<Event, Infallible>>,
    _guard: ConnectionGuard,
}

impl Stream for ChannelStream {
    type Item = Result<Event, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }
}

/// Register a connection on `channel` and build its event stream.
pub fn channel_stream(hub: Arc<EventHub>, channel: String) -> ChannelStream {
    let (tx, rx) = mpsc::unbounded_channel();
    let sink: Arc<dyn EventSink> = Arc::new(StreamSink { tx });
    hub.add_connection(&channel, Arc::clone(&sink));
    tracing::info!(
        channel = %channel,
        connections = hub.connection_count(&channel),
        "SSE connection opened"
    );

    // Serializing a plain struct cannot fail; an error just skips the record.
    let connected = Event::default().json_data(AppEvent::connected(&channel)).ok();
    let inner = stream::iter(connected)
        .chain(UnboundedReceiverStream::new(rx).map(|message| Event::default().data(message)))
        .map(Ok)
        .boxed();

    ChannelStream {
        inner,
        _guard: ConnectionGuard { hub, channel, sink },
    }
}

/// SSE response for `channel` with a keep-alive comment every `heartbeat`.
pub fn subscribe(hub: Arc<EventHub>, channel: String, heartbeat: Duration) -> Sse<KeepAliveStream<ChannelStream>> {
    Sse::new(channel_stream(hub, channel)).keep_alive(
        KeepAlive::new()
            .interval(heartbeat)
            .text(HEARTBEAT_TEXT),
    )
}
