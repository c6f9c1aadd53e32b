use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use transit_core::RunState;
use transit_engine::RunObserver;

use crate::ui;

/// Spinner on stderr that follows the run's state machine.
pub struct Progress {
    bar: Option<ProgressBar>,
}

impl Progress {
    #[must_use]
    pub fn spinner(message: &str) -> Self {
        if !ui::prefs().progress {
            return Self { bar: None };
        }

        let bar = ProgressBar::new_spinner();
        bar.enable_steady_tick(Duration::from_millis(100));
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg} {elapsed:.dim}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.set_message(message.to_string());
        Self { bar: Some(bar) }
    }

    pub fn set_message(&self, message: &str) {
        if let Some(bar) = &self.bar {
            bar.set_message(message.to_string());
        }
    }

    pub fn finish_ok(&self, message: &str) {
        if let Some(bar) = &self.bar {
            bar.finish_with_message(message.to_string());
        }
    }

    pub fn finish_err(&self, message: &str) {
        if let Some(bar) = &self.bar {
            bar.abandon_with_message(message.to_string());
        }
    }
}

impl RunObserver for Progress {
    fn state_changed(&self, state: &RunState) {
        self.set_message(stage_label(state));
    }
}

/// Operator-facing label for a run state.
#[must_use]
pub const fn stage_label(state: &RunState) -> &'static str {
    match state {
        RunState::Resolving => "resolving environments",
        RunState::PreflightChecking => "probing source and target",
        RunState::BackingUp => "backing up target",
        RunState::SchemaSyncing => "syncing schema",
        RunState::DataTransplanting => "transplanting content data",
        RunState::PostValidating => "verifying target",
        RunState::Completed => "completed",
        RunState::Failed { .. } => "failed",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_spinner_is_inert() {
        let progress = Progress::spinner("resolving");
        assert!(progress.bar.is_none());
        progress.state_changed(&RunState::BackingUp);
        progress.finish_ok("done");
    }

    #[test]
    fn every_stage_has_a_label() {
        assert_eq!(stage_label(&RunState::DataTransplanting), "transplanting content data");
        assert_eq!(
            stage_label(&RunState::Failed {
                reason: "x".into()
            }),
            "failed"
        );
    }
}
