//! Run bookkeeping and the state machine guard.

use chrono::{DateTime, Utc};
use serde::Serialize;
use transit_core::{ArtifactLayout, CoreError, MigrationMode, RunState};

/// One recorded state change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StateChange {
    #[serde(flatten)]
    pub state: RunState,
    pub at: DateTime<Utc>,
}

/// A single migration attempt from `source` to `target`.
#[derive(Debug, Clone)]
pub struct MigrationRun {
    pub id: String,
    pub source: String,
    pub target: String,
    pub mode: MigrationMode,
    pub started_at: DateTime<Utc>,
    state: RunState,
    history: Vec<StateChange>,
    layout: ArtifactLayout,
}

impl MigrationRun {
    #[must_use]
    pub fn new(
        source: impl Into<String>,
        target: impl Into<String>,
        mode: MigrationMode,
        artifacts_root: impl Into<std::path::PathBuf>,
        started_at: DateTime<Utc>,
    ) -> Self {
        let layout = ArtifactLayout::new(artifacts_root, started_at);
        let id = format!("run-{}-{}", layout.stamp(), std::process::id());
        Self {
            id,
            source: source.into(),
            target: target.into(),
            mode,
            started_at,
            state: RunState::Resolving,
            history: vec![StateChange {
                state: RunState::Resolving,
                at: started_at,
            }],
            layout,
        }
    }

    #[must_use]
    pub const fn state(&self) -> &RunState {
        &self.state
    }

    #[must_use]
    pub fn history(&self) -> &[StateChange] {
        &self.history
    }

    #[must_use]
    pub const fn layout(&self) -> &ArtifactLayout {
        &self.layout
    }

    /// Move to `next`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidTransition`] if the state machine forbids it.
    pub fn advance(&mut self, next: RunState) -> Result<(), CoreError> {
        if !self.state.can_transition_to(&next) {
            return Err(CoreError::InvalidTransition {
                run_id: self.id.clone(),
                from: self.state.to_string(),
                to: next.to_string(),
            });
        }
        tracing::debug!(run_id = %self.id, from = %self.state, to = %next, "run state");
        self.history.push(StateChange {
            state: next.clone(),
            at: Utc::now(),
        });
        self.state = next;
        Ok(())
    }

    /// Record a failure. Returns the state the run was in when it failed.
    /// A run that already reached a terminal state is left unchanged.
    pub fn fail(&mut self, reason: impl Into<String>) -> RunState {
        let last = self.state.clone();
        if !last.is_terminal() {
            let failed = RunState::Failed {
                reason: reason.into(),
            };
            self.history.push(StateChange {
                state: failed.clone(),
                at: Utc::now(),
            });
            self.state = failed;
        }
        last
    }
}
