//! Per-job progress manager.
//!
//! Translates irregular lifecycle signals into a flicker-free sequence of
//! snapshots and controls how often they are pushed:
//!
//! - status transitions and new non-thinking steps are emitted immediately
//! - content changes and thinking steps go through an [`EmitThrottle`]; at
//!   most one deferred emission is pending and it always carries the latest
//!   state
//! - an immediate emission cancels a pending deferred one
//!
//! The handle is cheap to clone. All clones share the same state.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::state::{ProgressSnapshot, ProgressState, SuppressionPolicy};
use super::step::{StepId, StepOptions, StepResult, StepStatus, StepType, StepUpdate};
use super::throttle::{EmitThrottle, ThrottleDecision};
use crate::events::AppEvent;
use crate::ports::ChannelPublisher;

struct Inner {
    channel: String,
    publisher: Arc<dyn ChannelPublisher>,
    state: ProgressState,
    throttle: EmitThrottle,
    timer: Option<JoinHandle<()>>,
    /// Bumped whenever the pending timer is replaced or cancelled.
    generation: u64,
}

impl Inner {
    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
        self.throttle.cancel_pending();
        self.generation = self.generation.wrapping_add(1);
    }

    fn send(&mut self) {
        self.throttle.record_emit(Instant::now());
        let event = AppEvent::progress_update(self.state.snapshot());
        self.publisher.publish(&self.channel, &event);
    }
}

/// Handle to the progress of one job run.
#[derive(Clone)]
pub struct ProgressManager {
    inner: Arc<Mutex<Inner>>,
}

impl ProgressManager {
    /// Create a manager for `channel` with the default policy and interval.
    pub fn new(channel: impl Into<String>, publisher: Arc<dyn ChannelPublisher>) -> Self {
        Self::builder(channel, publisher).build()
    }

    /// Start building a manager with a custom interval or suppression policy.
    pub fn builder(
        channel: impl Into<String>,
        publisher: Arc<dyn ChannelPublisher>,
    ) -> ProgressManagerBuilder {
        ProgressManagerBuilder {
            channel: channel.into(),
            publisher,
            throttle_interval: super::DEFAULT_THROTTLE_INTERVAL,
            policy: SuppressionPolicy::default(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The channel snapshots are published on.
    pub fn channel(&self) -> String {
        self.lock().channel.clone()
    }

    /// Close out the current step and start a new in-progress one.
    ///
    /// An empty superseded thinking step is pruned rather than completed.
    /// Thinking steps are emitted through the throttle so a step that is
    /// immediately replaced never reaches the client.
    pub fn add_step(&self, label: impl Into<String>, options: StepOptions) -> StepId {
        let immediate = options.step_type != StepType::Thinking;
        let mut inner = self.lock();
        inner.cancel_timer();
        let id = inner.state.push_step(label, options);
        tracing::debug!(channel = %inner.channel, step_id = %id, "Step started");
        self.emit(&mut inner, immediate);
        id
    }

    /// Merge `update` onto the step with `id`. Unknown ids are ignored.
    ///
    /// Status changes are emitted immediately, anything else is throttled.
    pub fn update_step(&self, id: &StepId, update: StepUpdate) -> bool {
        let mut inner = self.lock();
        if !inner.state.update(id, &update) {
            tracing::trace!(channel = %inner.channel, step_id = %id, "Ignoring update for unknown step");
            return false;
        }
        self.emit(&mut inner, update.changes_status());
        true
    }

    /// Merge `update` onto the in-progress step, if any. Always throttled.
    pub fn update_current_step(&self, update: StepUpdate) -> bool {
        let mut inner = self.lock();
        if !inner.state.update_current(&update) {
            return false;
        }
        self.emit(&mut inner, false);
        true
    }

    /// Append streamed text to the in-progress step, if any. Always throttled.
    pub fn append_content(&self, text: &str) -> bool {
        let mut inner = self.lock();
        if !inner.state.append_content(text) {
            return false;
        }
        self.emit(&mut inner, false);
        true
    }

    /// Mark a step completed, optionally recording its result.
    pub fn complete_step(&self, id: &StepId, result: StepResult) -> bool {
        self.update_step(id, result.into_update())
    }

    /// Mark a step failed with an optional error summary as its detail.
    pub fn fail_step(&self, id: &StepId, error: Option<String>) -> bool {
        self.update_step(id, StepUpdate::status(StepStatus::Error).with_detail(error))
    }

    /// Current snapshot, without emitting.
    pub fn snapshot(&self) -> ProgressSnapshot {
        self.lock().state.snapshot()
    }

    /// Emit the latest state now if a deferred emission is pending.
    ///
    /// Returns whether anything was emitted.
    pub fn flush(&self) -> bool {
        let mut inner = self.lock();
        if !inner.throttle.is_pending() {
            return false;
        }
        inner.cancel_timer();
        inner.send();
        true
    }

    fn emit(&self, inner: &mut Inner, immediate: bool) {
        if immediate {
            inner.cancel_timer();
            inner.send();
            return;
        }
        match inner.throttle.request(Instant::now()) {
            ThrottleDecision::EmitNow => {
                // A starved timer may still be armed; it must not resend this state.
                inner.cancel_timer();
                inner.send();
            }
            ThrottleDecision::AlreadyScheduled => {}
            ThrottleDecision::Schedule(wait) => self.schedule(inner, wait),
        }
    }

    fn schedule(&self, inner: &mut Inner, wait: Duration) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::debug!(channel = %inner.channel, "No runtime for deferred emission, sending now");
            inner.send();
            return;
        };

        inner.generation = inner.generation.wrapping_add(1);
        let generation = inner.generation;
        let shared = Arc::clone(&self.inner);
        inner.timer = Some(runtime.spawn(async move {
            tokio::time::sleep(wait).await;
            let mut inner = shared.lock().unwrap_or_else(PoisonError::into_inner);
            // A newer emission already superseded this timer.
            if inner.generation != generation {
                return;
            }
            inner.timer = None;
            inner.send();
        }));
    }
}

impl std::fmt::Debug for ProgressManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("ProgressManager")
            .field("channel", &inner.channel)
            .field("steps", &inner.state.len())
            .field("pending", &inner.throttle.is_pending())
            .finish()
    }
}

/// Builder for [`ProgressManager`].
pub struct ProgressManagerBuilder {
    channel: String,
    publisher: Arc<dyn ChannelPublisher>,
    throttle_interval: Duration,
    policy: SuppressionPolicy,
}

impl ProgressManagerBuilder {
    #[must_use]
    pub const fn throttle_interval(mut self, interval: Duration) -> Self {
        self.throttle_interval = interval;
        self
    }

    #[must_use]
    pub fn suppression_policy(mut self, policy: SuppressionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn build(self) -> ProgressManager {
        ProgressManager {
            inner: Arc::new(Mutex::new(Inner {
                channel: self.channel,
                publisher: self.publisher,
                state: ProgressState::with_policy(self.policy),
                throttle: EmitThrottle::new(self.throttle_interval),
                timer: None,
                generation: 0,
            })),
        }
    }
}
