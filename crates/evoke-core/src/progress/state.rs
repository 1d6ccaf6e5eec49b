//! Ordered step log for one job run.
//!
//! Pure state with a mutation API and no I/O. After every mutation at most
//! one step is `in-progress`.

use serde::{Deserialize, Serialize};

use super::step::{ProgressStep, StepId, StepOptions, StepStatus, StepType, StepUpdate};

/// Snapshot of a run's progress as delivered to clients.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    /// Id of the in-progress step, or empty when none.
    #[serde(rename = "currentStep")]
    pub current_step: String,
    /// Full ordered list of steps.
    pub steps: Vec<ProgressStep>,
}

/// Decides which superseded steps are pruned instead of completed.
///
/// A step whose type is listed here is removed from the log when a new step
/// replaces it while its content is still absent or empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuppressionPolicy {
    suppress_if_empty: Vec<StepType>,
}

impl SuppressionPolicy {
    /// Never prune.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            suppress_if_empty: Vec::new(),
        }
    }

    /// Also prune empty steps of `step_type`.
    #[must_use]
    pub fn with_type(mut self, step_type: StepType) -> Self {
        if !self.suppress_if_empty.contains(&step_type) {
            self.suppress_if_empty.push(step_type);
        }
        self
    }

    /// Whether a superseded step should be dropped from the log.
    #[must_use]
    pub fn should_prune(&self, step: &ProgressStep) -> bool {
        self.suppress_if_empty.contains(&step.step_type) && !step.has_content()
    }
}

impl Default for SuppressionPolicy {
    fn default() -> Self {
        Self::none().with_type(StepType::Thinking)
    }
}

/// Append-ordered log of steps.
#[derive(Debug, Clone, Default)]
pub struct ProgressState {
    steps: Vec<ProgressStep>,
    policy: SuppressionPolicy,
}

impl ProgressState {
    /// Create an empty log with the default suppression policy.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty log with a custom suppression policy.
    #[must_use]
    pub const fn with_policy(policy: SuppressionPolicy) -> Self {
        Self {
            steps: Vec::new(),
            policy,
        }
    }

    /// Close out the current step and start a new one.
    ///
    /// Every in-progress step is either pruned (per the suppression policy)
    /// or marked completed before the new step is appended.
    pub fn push_step(&mut self, label: impl Into<String>, options: StepOptions) -> StepId {
        let policy = &self.policy;
        self.steps.retain_mut(|step| {
            if !step.is_in_progress() {
                return true;
            }
            if policy.should_prune(step) {
                tracing::trace!(step_id = %step.id, label = %step.label, "Pruning empty step");
                return false;
            }
            step.status = StepStatus::Completed;
            true
        });

        let step = ProgressStep::start(label, options);
        let id = step.id.clone();
        self.steps.push(step);
        id
    }

    /// Merge `update` onto the step with `id`. Returns false if it no longer exists.
    pub fn update(&mut self, id: &StepId, update: &StepUpdate) -> bool {
        let Some(index) = self.steps.iter().position(|s| &s.id == id) else {
            return false;
        };
        self.apply_at(index, update);
        true
    }

    /// Merge `update` onto the current step. Returns false if there is none.
    pub fn update_current(&mut self, update: &StepUpdate) -> bool {
        let Some(index) = self.current_index() else {
            return false;
        };
        self.apply_at(index, update);
        true
    }

    /// Append text to the current step's content. Returns false if there is none.
    pub fn append_content(&mut self, text: &str) -> bool {
        let Some(index) = self.current_index() else {
            return false;
        };
        self.steps[index]
            .content
            .get_or_insert_with(String::new)
            .push_str(text);
        true
    }

    fn apply_at(&mut self, index: usize, update: &StepUpdate) {
        if update.status == Some(StepStatus::InProgress) {
            for (i, step) in self.steps.iter_mut().enumerate() {
                if i != index && step.is_in_progress() {
                    step.status = StepStatus::Completed;
                }
            }
        }
        self.steps[index].apply(update);
    }

    fn current_index(&self) -> Option<usize> {
        self.steps.iter().position(ProgressStep::is_in_progress)
    }

    /// The in-progress step, if any.
    #[must_use]
    pub fn current(&self) -> Option<&ProgressStep> {
        self.current_index().map(|i| &self.steps[i])
    }

    /// Id of the in-progress step, if any.
    #[must_use]
    pub fn current_id(&self) -> Option<&StepId> {
        self.current().map(|s| &s.id)
    }

    /// Look up a step by id.
    #[must_use]
    pub fn get(&self, id: &StepId) -> Option<&ProgressStep> {
        self.steps.iter().find(|s| &s.id == id)
    }

    /// All steps in creation order.
    #[must_use]
    pub fn steps(&self) -> &[ProgressStep] {
        &self.steps
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Copy of the current state for delivery.
    #[must_use]
    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            current_step: self
                .current_id()
                .map(|id| id.as_str().to_string())
                .unwrap_or_default(),
            steps: self.steps.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn in_progress_count(state: &ProgressState) -> usize {
        state.steps().iter().filter(|s| s.is_in_progress()).count()
    }

    #[test]
    fn test_at_most_one_in_progress_after_each_push() {
        let mut state = ProgressState::new();
        let kinds = [
            StepOptions::thinking(),
            StepOptions::of_type(StepType::Command),
            StepOptions::default(),
            StepOptions::thinking().with_content("x"),
            StepOptions::of_type(StepType::File),
            StepOptions::thinking(),
        ];
        for (i, options) in kinds.into_iter().enumerate() {
            state.push_step(format!("step{i}"), options);
            assert_eq!(in_progress_count(&state), 1);
        }
    }

    #[test]
    fn test_empty_thinking_step_is_pruned() {
        let mut state = ProgressState::new();
        let thinking = state.push_step("thinking", StepOptions::thinking());
        state.push_step("next", StepOptions::default());

        assert!(state.get(&thinking).is_none());
        assert_eq!(state.len(), 1);
        assert_eq!(state.steps()[0].label, "next");
    }

    #[test]
    fn test_non_empty_thinking_step_is_completed() {
        let mut state = ProgressState::new();
        let thinking = state.push_step("thinking", StepOptions::thinking());
        assert!(state.append_content("hello"));
        state.push_step("next", StepOptions::default());

        let step = state.get(&thinking).unwrap();
        assert_eq!(step.status, StepStatus::Completed);
        assert_eq!(step.content.as_deref(), Some("hello"));
    }

    #[test]
    fn test_empty_default_step_is_completed_not_pruned() {
        let mut state = ProgressState::new();
        let first = state.push_step("savingResult", StepOptions::default());
        state.push_step("next", StepOptions::default());
        assert_eq!(state.get(&first).unwrap().status, StepStatus::Completed);
    }

    #[test]
    fn test_policy_none_keeps_empty_thinking() {
        let mut state = ProgressState::with_policy(SuppressionPolicy::none());
        let thinking = state.push_step("thinking", StepOptions::thinking());
        state.push_step("next", StepOptions::default());
        assert_eq!(state.get(&thinking).unwrap().status, StepStatus::Completed);
    }

    #[test]
    fn test_policy_can_suppress_other_types() {
        let policy = SuppressionPolicy::default().with_type(StepType::File);
        let mut state = ProgressState::with_policy(policy);
        let file = state.push_step("readingFiles", StepOptions::of_type(StepType::File));
        state.push_step("next", StepOptions::default());
        assert!(state.get(&file).is_none());
    }

    #[test]
    fn test_update_unknown_id_is_noop() {
        let mut state = ProgressState::new();
        state.push_step("a", StepOptions::default());
        let before = state.snapshot();

        assert!(!state.update(&StepId::from("missing"), &StepUpdate::status(StepStatus::Error)));
        assert_eq!(state.snapshot(), before);
    }

    #[test]
    fn test_append_without_current_step_is_noop() {
        let mut state = ProgressState::new();
        assert!(!state.append_content("orphan"));

        let id = state.push_step("a", StepOptions::default());
        state.update(&id, &StepUpdate::status(StepStatus::Completed));
        assert!(!state.append_content("orphan"));
        assert_eq!(state.get(&id).unwrap().content, None);
    }

    #[test]
    fn test_append_accumulates() {
        let mut state = ProgressState::new();
        state.push_step("thinking", StepOptions::thinking());
        for chunk in ["Ana", "lyz", "ing..."] {
            state.append_content(chunk);
        }
        assert_eq!(state.current().unwrap().content.as_deref(), Some("Analyzing..."));
    }

    #[test]
    fn test_reopening_a_step_completes_the_current_one() {
        let mut state = ProgressState::new();
        let first = state.push_step("a", StepOptions::default());
        let second = state.push_step("b", StepOptions::default());

        state.update(&first, &StepUpdate::status(StepStatus::InProgress));

        assert_eq!(in_progress_count(&state), 1);
        assert_eq!(state.current_id(), Some(&first));
        assert_eq!(state.get(&second).unwrap().status, StepStatus::Completed);
    }

    #[test]
    fn test_snapshot_current_step() {
        let mut state = ProgressState::new();
        assert_eq!(state.snapshot().current_step, "");

        let id = state.push_step("a", StepOptions::default());
        assert_eq!(state.snapshot().current_step, id.as_str());

        state.update(&id, &StepUpdate::status(StepStatus::Completed));
        assert_eq!(state.snapshot().current_step, "");
    }

    #[test]
    fn test_snapshot_json_shape() {
        let mut state = ProgressState::new();
        state.push_step("a", StepOptions::default());
        let json = serde_json::to_value(state.snapshot()).unwrap();
        assert!(json["currentStep"].is_string());
        assert_eq!(json["steps"].as_array().unwrap().len(), 1);
    }
}
