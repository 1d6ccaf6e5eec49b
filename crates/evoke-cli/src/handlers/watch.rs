//! `evoke watch` - follow a project's progress from the terminal.

use std::collections::HashMap;

use anyhow::{Context, Result};
use evoke_client::{ClientError, EventSubscriber, ReconnectPolicy, SubscriptionHandler};
use evoke_core::{AppEvent, ProgressSnapshot, StepId, StepStatus};
use tokio_util::sync::CancellationToken;

/// Prints step transitions as they arrive.
#[derive(Debug, Default)]
pub struct ProgressPrinter {
    seen: HashMap<StepId, StepStatus>,
}

impl ProgressPrinter {
    /// Lines describing steps that are new or changed status since the last snapshot.
    pub fn changes(&mut self, snapshot: &ProgressSnapshot) -> Vec<String> {
        let mut lines = Vec::new();
        for step in &snapshot.steps {
            if self.seen.get(&step.id) == Some(&step.status) {
                continue;
            }
            self.seen.insert(step.id.clone(), step.status);
            let marker = match step.status {
                StepStatus::Pending => " ",
                StepStatus::InProgress => "…",
                StepStatus::Completed => "✓",
                StepStatus::Error => "✗",
            };
            let line = match &step.detail {
                Some(detail) => format!("{marker} {} ({detail})", step.label),
                None => format!("{marker} {}", step.label),
            };
            lines.push(line);
        }
        lines
    }

    /// Lines for a fresh connection: the whole refetched state.
    pub fn opened(&mut self, progress: Option<&ProgressSnapshot>) -> Vec<String> {
        self.seen.clear();
        match progress {
            Some(snapshot) => self.changes(snapshot),
            None => vec!["no active run".to_string()],
        }
    }

    fn describe(&mut self, event: &AppEvent) -> Vec<String> {
        match event {
            AppEvent::Connected { project_id } => vec![format!("connected to {project_id}")],
            AppEvent::ProgressUpdate { progress } => self.changes(progress),
            AppEvent::ProjectNameUpdated { name } => vec![format!("project renamed: {name}")],
            AppEvent::MessageCreated { message } => {
                let kind = message["type"].as_str().unwrap_or("message");
                vec![format!("{kind}: {}", message["content"].as_str().unwrap_or(""))]
            }
        }
    }
}

impl SubscriptionHandler for ProgressPrinter {
    fn on_open(&mut self, progress: Option<ProgressSnapshot>) {
        for line in self.opened(progress.as_ref()) {
            println!("{line}");
        }
    }

    fn on_event(&mut self, event: AppEvent) {
        for line in self.describe(&event) {
            println!("{line}");
        }
    }

    fn on_error(&mut self, error: &ClientError) {
        eprintln!("connection lost: {error}");
    }
}

pub async fn execute(url: &str, project_id: &str, max_attempts: u32) -> Result<()> {
    let subscriber = EventSubscriber::new(url, project_id)
        .with_policy(ReconnectPolicy::with_defaults().with_max_attempts(max_attempts));

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        }
    });

    tracing::debug!(url = subscriber.url(), "Watching project");
    subscriber
        .run(&mut ProgressPrinter::default(), &cancel)
        .await
        .with_context(|| format!("Lost event stream for project {project_id}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use evoke_core::{NoopPublisher, ProgressManager, StepOptions, StepResult};
    use std::sync::Arc;

    #[test]
    fn test_changes_reports_only_transitions() {
        let progress = ProgressManager::new("p1", Arc::new(NoopPublisher::new()));
        let mut printer = ProgressPrinter::default();

        let id = progress.add_step(
            "executingCommand",
            StepOptions::default().with_detail("npm install"),
        );
        assert_eq!(
            printer.changes(&progress.snapshot()),
            vec!["… executingCommand (npm install)".to_string()]
        );
        assert!(printer.changes(&progress.snapshot()).is_empty());

        progress.complete_step(&id, StepResult::default());
        assert_eq!(
            printer.changes(&progress.snapshot()),
            vec!["✓ executingCommand (npm install)".to_string()]
        );
    }

    #[test]
    fn test_reopen_replays_refetched_state() {
        let progress = ProgressManager::new("p1", Arc::new(NoopPublisher::new()));
        progress.add_step("savingResult", StepOptions::default());
        let mut printer = ProgressPrinter::default();
        printer.changes(&progress.snapshot());

        let snapshot = progress.snapshot();
        assert_eq!(
            printer.opened(Some(&snapshot)),
            vec!["… savingResult".to_string()]
        );
        assert!(printer.changes(&snapshot).is_empty());
    }

    #[test]
    fn test_open_without_run_says_so() {
        let mut printer = ProgressPrinter::default();
        assert_eq!(printer.opened(None), vec!["no active run".to_string()]);
    }
}
