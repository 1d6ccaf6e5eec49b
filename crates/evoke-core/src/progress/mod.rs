//! Progress tracking for job runs.
//!
//! [`ProgressState`] is the pure step log, [`EmitThrottle`] decides when a
//! snapshot may be pushed and [`ProgressManager`] ties both to a
//! [`ChannelPublisher`](crate::ports::ChannelPublisher).

mod manager;
mod state;
mod step;
mod throttle;

pub use manager::{ProgressManager, ProgressManagerBuilder};
pub use state::{ProgressSnapshot, ProgressState, SuppressionPolicy};
pub use step::{
    ProgressStep, StepId, StepOptions, StepResult, StepStatus, StepType, StepUpdate,
};
pub use throttle::{DEFAULT_THROTTLE_INTERVAL, EmitThrottle, ThrottleDecision};

/// Step labels emitted by the code agent job.
///
/// These are i18n keys; the client resolves them to display text.
pub mod labels {
    pub const ANALYZING_REQUEST: &str = "analyzingRequest";
    pub const GENERATING_PROJECT_NAME: &str = "generatingProjectName";
    pub const THINKING: &str = "thinking";
    pub const EXECUTING_COMMAND: &str = "executingCommand";
    pub const UPDATING_FILES: &str = "updatingFiles";
    pub const READING_FILES: &str = "readingFiles";
    pub const GENERATING_FRAGMENT_TITLE: &str = "generatingFragmentTitle";
    pub const GENERATING_FINAL_RESPONSE: &str = "generatingFinalResponse";
    pub const GENERATING_SANDBOX_URL: &str = "generatingSandboxUrl";
    pub const SAVING_RESULT: &str = "savingResult";
}
