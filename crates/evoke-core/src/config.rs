//! Pipeline configuration.

use std::time::Duration;

use crate::progress::DEFAULT_THROTTLE_INTERVAL;

/// Default interval between SSE keep-alive comments.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Timing knobs shared by the progress pipeline and its transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Minimum interval between throttled progress snapshots.
    pub throttle_interval: Duration,
    /// Interval between keep-alive comments on idle connections.
    pub heartbeat_interval: Duration,
}

impl PipelineConfig {
    #[must_use]
    pub const fn with_defaults() -> Self {
        Self {
            throttle_interval: DEFAULT_THROTTLE_INTERVAL,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
        }
    }

    #[must_use]
    pub const fn throttle_interval(mut self, interval: Duration) -> Self {
        self.throttle_interval = interval;
        self
    }

    #[must_use]
    pub const fn heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_defaults() {
        let config = PipelineConfig::with_defaults();
        assert_eq!(config.throttle_interval, Duration::from_millis(200));
        assert_eq!(config.heartbeat_interval, Duration::from_secs(30));
        assert_eq!(config, PipelineConfig::default());
    }

    #[test]
    fn test_builder_overrides() {
        let config = PipelineConfig::with_defaults()
            .throttle_interval(Duration::from_millis(50))
            .heartbeat_interval(Duration::from_secs(5));
        assert_eq!(config.throttle_interval, Duration::from_millis(50));
        assert_eq!(config.heartbeat_interval, Duration::from_secs(5));
    }
}
