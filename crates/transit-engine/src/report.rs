//! Structured run outcomes.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use thiserror::Error;
use transit_core::{MigrationMode, RunState};
use transit_schema::ChangeOperation;

use crate::backup::Backup;
use crate::error::MigrationError;
use crate::run::StateChange;
use crate::safety::{PostflightReport, PreflightReport};
use crate::transplant::TransplantResult;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum SchemaSync {
    /// Target already matched; nothing was applied.
    Identical { snapshot_path: PathBuf },
    Applied {
        snapshot_path: PathBuf,
        diff_path: PathBuf,
        changes: Vec<ChangeOperation>,
    },
}

/// A completed run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: String,
    pub source: String,
    pub target: String,
    pub mode: MigrationMode,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub preflight: PreflightReport,
    pub backup: Backup,
    pub schema: SchemaSync,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transplant: Option<TransplantResult>,
    pub postflight: PostflightReport,
    pub warnings: Vec<String>,
    /// Size of the system-table catalog protected during the run.
    pub protected_tables: usize,
    pub history: Vec<StateChange>,
}

impl RunReport {
    #[must_use]
    pub fn succeeded_with_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// An aborted run: what failed, where, and how to recover.
#[derive(Debug, Error, Serialize)]
#[error("run {run_id} failed during {last_state}: {error}")]
pub struct RunFailure {
    pub run_id: String,
    pub source: String,
    pub target: String,
    pub mode: MigrationMode,
    pub error_kind: &'static str,
    #[source]
    #[serde(serialize_with = "display")]
    pub error: MigrationError,
    pub last_state: RunState,
    pub backup: Option<Backup>,
    /// Rendered restore command, present whenever a backup was taken.
    pub recovery: Option<String>,
    pub history: Vec<StateChange>,
}

fn display<S: Serializer>(error: &MigrationError, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(error)
}
