//! Emission throttling.
//!
//! Rate-limits progress snapshots to avoid flooding subscribers while a model
//! streams tokens. Unlike a plain rate limiter, a suppressed request is not
//! dropped: it turns into a single deferred emission so the latest state is
//! always delivered.

use std::time::Duration;

use tokio::time::Instant;

/// Default minimum interval between throttled emissions.
pub const DEFAULT_THROTTLE_INTERVAL: Duration = Duration::from_millis(200);

/// Outcome of a throttled emission request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrottleDecision {
    /// Emit right away.
    EmitNow,
    /// Schedule one deferred emission after this delay.
    Schedule(Duration),
    /// A deferred emission is already pending and will carry the latest state.
    AlreadyScheduled,
}

/// Coalescing throttle state: last emission time plus at most one pending timer.
#[derive(Debug, Clone)]
pub struct EmitThrottle {
    last_emit: Option<Instant>,
    min_interval: Duration,
    pending: bool,
}

impl EmitThrottle {
    /// Create a throttle with the specified minimum interval.
    pub const fn new(min_interval: Duration) -> Self {
        Self {
            last_emit: None,
            min_interval,
            pending: false,
        }
    }

    /// The configured minimum interval.
    pub const fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Decide what to do with a throttled emission request at `now`.
    ///
    /// A `Schedule` decision marks the timer as pending; the caller must
    /// eventually call [`record_emit`](Self::record_emit) or
    /// [`cancel_pending`](Self::cancel_pending).
    pub fn request(&mut self, now: Instant) -> ThrottleDecision {
        let elapsed = match self.last_emit {
            Some(last) => now.saturating_duration_since(last),
            None => return ThrottleDecision::EmitNow,
        };
        if elapsed >= self.min_interval {
            return ThrottleDecision::EmitNow;
        }
        if self.pending {
            return ThrottleDecision::AlreadyScheduled;
        }
        self.pending = true;
        ThrottleDecision::Schedule(self.min_interval - elapsed)
    }

    /// Record an emission at `now`. Clears the pending flag.
    pub const fn record_emit(&mut self, now: Instant) {
        self.last_emit = Some(now);
        self.pending = false;
    }

    /// Drop the pending timer flag. Returns whether one was pending.
    pub const fn cancel_pending(&mut self) -> bool {
        let was_pending = self.pending;
        self.pending = false;
        was_pending
    }

    /// Whether a deferred emission is outstanding.
    pub const fn is_pending(&self) -> bool {
        self.pending
    }

    /// Force the next request to emit immediately.
    pub const fn reset(&mut self) {
        self.last_emit = None;
        self.pending = false;
    }
}

impl Default for EmitThrottle {
    fn default() -> Self {
        Self::new(DEFAULT_THROTTLE_INTERVAL)
    }
}
