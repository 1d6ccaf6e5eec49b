//! Registry of active runs.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use super::JobError;
use crate::progress::{ProgressManager, ProgressSnapshot};

/// Tracks the progress manager of the run active on each channel.
///
/// At most one run is active per channel, which keeps a single producer
/// behind every channel's snapshot sequence.
#[derive(Debug, Default)]
pub struct RunRegistry {
    runs: RwLock<HashMap<String, ProgressManager>>,
}

impl RunRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the run for `channel`. Fails if one is already active.
    pub fn register(&self, channel: &str, progress: ProgressManager) -> Result<(), JobError> {
        let mut runs = self.runs.write().unwrap_or_else(PoisonError::into_inner);
        if runs.contains_key(channel) {
            return Err(JobError::RunAlreadyActive(channel.to_string()));
        }
        runs.insert(channel.to_string(), progress);
        tracing::debug!(channel, active = runs.len(), "Run registered");
        Ok(())
    }

    pub fn get(&self, channel: &str) -> Option<ProgressManager> {
        let runs = self.runs.read().unwrap_or_else(PoisonError::into_inner);
        runs.get(channel).cloned()
    }

    /// Latest snapshot of the run active on `channel`.
    pub fn snapshot(&self, channel: &str) -> Option<ProgressSnapshot> {
        self.get(channel).map(|progress| progress.snapshot())
    }

    pub fn remove(&self, channel: &str) -> Option<ProgressManager> {
        let mut runs = self.runs.write().unwrap_or_else(PoisonError::into_inner);
        let removed = runs.remove(channel);
        if removed.is_some() {
            tracing::debug!(channel, active = runs.len(), "Run finished");
        }
        removed
    }

    pub fn is_active(&self, channel: &str) -> bool {
        let runs = self.runs.read().unwrap_or_else(PoisonError::into_inner);
        runs.contains_key(channel)
    }

    pub fn active_count(&self) -> usize {
        self.runs.read().unwrap_or_else(PoisonError::into_inner).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::NoopPublisher;
    use crate::progress::StepOptions;
    use std::sync::Arc;

    fn manager(channel: &str) -> ProgressManager {
        ProgressManager::new(channel, Arc::new(NoopPublisher::new()))
    }

    #[test]
    fn test_register_rejects_second_run() {
        let registry = RunRegistry::new();
        registry.register("p1", manager("p1")).unwrap();

        let err = registry.register("p1", manager("p1")).unwrap_err();
        assert!(matches!(err, JobError::RunAlreadyActive(ref c) if c == "p1"));
        assert!(registry.register("p2", manager("p2")).is_ok());
        assert_eq!(registry.active_count(), 2);
    }

    #[test]
    fn test_snapshot_reflects_live_manager() {
        let registry = RunRegistry::new();
        let progress = manager("p1");
        registry.register("p1", progress.clone()).unwrap();

        progress.add_step("executingCommand", StepOptions::default());

        let snapshot = registry.snapshot("p1").unwrap();
        assert_eq!(snapshot.steps.len(), 1);
        assert!(registry.snapshot("p2").is_none());
    }

    #[test]
    fn test_remove_frees_channel() {
        let registry = RunRegistry::new();
        registry.register("p1", manager("p1")).unwrap();

        assert!(registry.remove("p1").is_some());
        assert!(registry.remove("p1").is_none());
        assert!(!registry.is_active("p1"));
        assert!(registry.register("p1", manager("p1")).is_ok());
    }
}
