//! Reconnecting subscription to a project's event stream.

use evoke_core::{AppEvent, ProgressSnapshot};
use futures_util::StreamExt;
use reqwest::StatusCode;
use reqwest::header::ACCEPT;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::backoff::{ReconnectPolicy, ReconnectState};
use crate::decoder::SseDecoder;

/// Errors reported by the subscriber.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The request or the body stream failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("Unexpected status {0}")]
    Status(u16),

    /// The server closed the stream.
    #[error("Event stream ended")]
    StreamEnded,

    /// Every reconnect attempt failed; the subscription is dead.
    #[error("Gave up after {attempts} reconnect attempts")]
    ReconnectExhausted { attempts: u32 },
}

/// Callbacks for a subscription.
pub trait SubscriptionHandler: Send {
    /// A connection opened. Events published while disconnected are lost,
    /// so the current snapshot is refetched and handed over first; `None`
    /// means the project has no active run.
    fn on_open(&mut self, _progress: Option<ProgressSnapshot>) {}

    fn on_event(&mut self, event: AppEvent);

    /// The connection failed or closed; a reconnect may follow.
    fn on_error(&mut self, _error: &ClientError) {}
}

/// Subscribes to `/api/events/{project_id}` and keeps the stream alive.
///
/// On every (re)connect the latest snapshot is read from
/// `/api/projects/{project_id}/progress`.
#[derive(Debug, Clone)]
pub struct EventSubscriber {
    client: reqwest::Client,
    url: String,
    progress_url: String,
    policy: ReconnectPolicy,
}

impl EventSubscriber {
    pub fn new(base_url: &str, project_id: &str) -> Self {
        let base = base_url.trim_end_matches('/');
        Self {
            client: reqwest::Client::new(),
            url: format!("{base}/api/events/{project_id}"),
            progress_url: format!("{base}/api/projects/{project_id}/progress"),
            policy: ReconnectPolicy::with_defaults(),
        }
    }

    #[must_use]
    pub const fn with_policy(mut self, policy: ReconnectPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn progress_url(&self) -> &str {
        &self.progress_url
    }

    /// Latest snapshot of the project's active run, `None` if there is none.
    pub async fn fetch_progress(&self) -> Result<Option<ProgressSnapshot>, ClientError> {
        let response = self.client.get(&self.progress_url).send().await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => Ok(Some(response.json().await?)),
            status => Err(ClientError::Status(status.as_u16())),
        }
    }

    /// Consume the stream until cancelled or out of reconnect attempts.
    ///
    /// Returns `Ok(())` on cancellation and
    /// [`ClientError::ReconnectExhausted`] when it gives up.
    pub async fn run<H>(&self, handler: &mut H, cancel: &CancellationToken) -> Result<(), ClientError>
    where
        H: SubscriptionHandler + ?Sized,
    {
        let mut state = ReconnectState::new(self.policy);
        let mut decoder = SseDecoder::new();
        loop {
            let error = tokio::select! {
                () = cancel.cancelled() => return Ok(()),
                error = self.connect_once(handler, &mut state, &mut decoder) => error,
            };
            tracing::warn!(url = %self.url, error = %error, "Event stream interrupted");
            handler.on_error(&error);

            let Some(delay) = state.on_failure() else {
                tracing::error!(url = %self.url, attempts = state.attempts(), "Giving up on event stream");
                return Err(ClientError::ReconnectExhausted {
                    attempts: state.attempts(),
                });
            };
            tracing::warn!(
                attempt = state.attempts(),
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "Reconnecting"
            );
            tokio::select! {
                () = cancel.cancelled() => return Ok(()),
                () = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// One connection lifetime. Always ends in the error that ended it.
    async fn connect_once<H>(
        &self,
        handler: &mut H,
        state: &mut ReconnectState,
        decoder: &mut SseDecoder,
    ) -> ClientError
    where
        H: SubscriptionHandler + ?Sized,
    {
        // A partial record from the previous connection is never completed.
        decoder.reset();

        let response = match self
            .client
            .get(&self.url)
            .header(ACCEPT, "text/event-stream")
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return e.into(),
        };
        if !response.status().is_success() {
            return ClientError::Status(response.status().as_u16());
        }

        tracing::debug!(url = %self.url, "Event stream connected");
        state.on_open();

        // The stream is already registered, so pushes racing this fetch are
        // buffered in the body and delivered after the snapshot.
        let progress = match self.fetch_progress().await {
            Ok(progress) => progress,
            Err(e) => {
                tracing::warn!(url = %self.progress_url, error = %e, "Failed to refetch progress");
                None
            }
        };
        handler.on_open(progress);

        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => return e.into(),
            };
            for payload in decoder.push(&chunk) {
                match serde_json::from_str::<AppEvent>(&payload) {
                    Ok(event) => handler.on_event(event),
                    Err(e) => tracing::warn!(error = %e, "Skipping unparsable event"),
                }
            }
        }
        ClientError::StreamEnded
    }
}
