//! Migration mode and run-state enums.
//!
//! All enums use `snake_case` serialization. `RunState::can_transition_to`
//! keeps the orchestrator from skipping a safety gate.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// MigrationMode
// ---------------------------------------------------------------------------

/// What a run moves from source to target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationMode {
    /// Structural changes only (collections, fields, relations).
    SchemaOnly,
    /// Schema first, then content-table data.
    Full,
}

impl MigrationMode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SchemaOnly => "schema_only",
            Self::Full => "full",
        }
    }

    /// Whether this mode needs a database connection on both sides.
    #[must_use]
    pub const fn requires_database(self) -> bool {
        matches!(self, Self::Full)
    }

    /// Whether this mode moves content-table rows.
    #[must_use]
    pub const fn transplants_data(self) -> bool {
        matches!(self, Self::Full)
    }
}

impl fmt::Display for MigrationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// RunState
// ---------------------------------------------------------------------------

/// Lifecycle of a single migration run.
///
/// ```text
/// resolving → preflight_checking → backing_up → schema_syncing → post_validating → completed
///                                               schema_syncing → data_transplanting → post_validating
/// any non-terminal state → failed
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum RunState {
    Resolving,
    PreflightChecking,
    BackingUp,
    SchemaSyncing,
    DataTransplanting,
    PostValidating,
    Completed,
    Failed { reason: String },
}

impl RunState {
    /// Whether no further transition is possible.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed { .. })
    }

    /// Check whether transitioning to `next` is allowed.
    ///
    /// `Failed` is reachable from every non-terminal state.
    #[must_use]
    pub const fn can_transition_to(&self, next: &Self) -> bool {
        if self.is_terminal() {
            return false;
        }
        match (self, next) {
            (_, Self::Failed { .. })
            | (Self::Resolving, Self::PreflightChecking)
            | (Self::PreflightChecking, Self::BackingUp)
            | (Self::BackingUp, Self::SchemaSyncing)
            | (Self::SchemaSyncing, Self::DataTransplanting | Self::PostValidating)
            | (Self::DataTransplanting, Self::PostValidating)
            | (Self::PostValidating, Self::Completed) => true,
            _ => false,
        }
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Resolving => "resolving",
            Self::PreflightChecking => "preflight_checking",
            Self::BackingUp => "backing_up",
            Self::SchemaSyncing => "schema_syncing",
            Self::DataTransplanting => "data_transplanting",
            Self::PostValidating => "post_validating",
            Self::Completed => "completed",
            Self::Failed { .. } => "failed",
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failed { reason } => write!(f, "failed ({reason})"),
            other => f.write_str(other.as_str()),
        }
    }
}
