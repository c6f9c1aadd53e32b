//! Drives one migration through its states.
//!
//! ```text
//! resolve → lock → pre-flight → backup → schema sync → [data transplant] → post-flight
//! ```
//!
//! The first error fails the run. There is no compensation beyond the backup,
//! whose path and restore command travel with the failure.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use tracing::Instrument;
use transit_config::{EnvironmentRegistry, TransitConfig};
use transit_core::{ArtifactLayout, Environment, MigrationMode, RunState, SystemCatalog};
use transit_schema::DiffOutcome;

use crate::backup::{Backup, restore_instructions};
use crate::connector::{Connector, Endpoints};
use crate::error::MigrationError;
use crate::lock::TargetLock;
use crate::report::{RunFailure, RunReport, SchemaSync};
use crate::run::MigrationRun;
use crate::safety::{self, PreflightReport};
use crate::transplant::{self, ClearAction, RepairSettings, TransplantResult};

/// Shared view of the backup taken by the current run, readable after the
/// run future has been dropped (e.g. on interrupt).
pub type BackupSlot = Arc<Mutex<Option<Backup>>>;

/// Receives state changes as they happen, for progress display.
pub trait RunObserver: Send + Sync {
    fn state_changed(&self, _state: &RunState) {}
}

#[derive(Debug, Default)]
pub struct NoopObserver;

impl RunObserver for NoopObserver {}

pub struct Orchestrator<C> {
    config: TransitConfig,
    connector: C,
    backup_slot: BackupSlot,
    observer: Arc<dyn RunObserver>,
}

#[derive(Default)]
struct Recovery {
    target: Option<Environment>,
    backup: Option<Backup>,
}

impl<C: Connector> Orchestrator<C> {
    pub fn new(config: TransitConfig, connector: C) -> Self {
        Self {
            config,
            connector,
            backup_slot: Arc::new(Mutex::new(None)),
            observer: Arc::new(NoopObserver),
        }
    }

    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn RunObserver>) -> Self {
        self.observer = observer;
        self
    }

    #[must_use]
    pub fn backup_slot(&self) -> BackupSlot {
        Arc::clone(&self.backup_slot)
    }

    #[must_use]
    pub const fn config(&self) -> &TransitConfig {
        &self.config
    }

    /// Restore command for a backup of `target`, using the configured
    /// container runtime.
    #[must_use]
    pub fn recovery_for(&self, backup: &Backup, target: &Environment) -> String {
        restore_instructions(backup, target, &self.config.database.docker_bin)
    }

    /// Resolve and probe both sides without modifying anything.
    ///
    /// # Errors
    ///
    /// The first resolution or probe failure.
    pub async fn check(
        &self,
        registry: &EnvironmentRegistry,
        source: &str,
        target: &str,
        mode: MigrationMode,
    ) -> Result<PreflightReport, MigrationError> {
        let (source, target) = self.resolve(registry, source, target, mode)?;
        let endpoints = Endpoints::connect(&self.connector, &source, &target)?;
        safety::preflight(&endpoints, &source, &target, mode).await
    }

    /// Run a migration from `source` to `target`.
    ///
    /// # Errors
    ///
    /// [`RunFailure`] with the error, the state the run was in, and the
    /// backup and restore command if a backup had been taken.
    pub async fn migrate(
        &self,
        registry: &EnvironmentRegistry,
        source: &str,
        target: &str,
        mode: MigrationMode,
    ) -> Result<RunReport, RunFailure> {
        if let Ok(mut slot) = self.backup_slot.lock() {
            *slot = None;
        }
        let mut run = MigrationRun::new(source, target, mode, &self.config.artifacts.dir, Utc::now());
        let span = tracing::info_span!(
            "migration",
            run_id = %run.id,
            source,
            target,
            mode = %mode,
            backup = tracing::field::Empty,
        );
        let mut recovery = Recovery::default();

        let outcome = self
            .execute(&mut run, registry, &mut recovery)
            .instrument(span.clone())
            .await;

        match outcome {
            Ok(report) => {
                span.in_scope(|| {
                    tracing::info!(warnings = report.warnings.len(), "migration completed");
                });
                Ok(report)
            }
            Err(error) => {
                let last_state = run.fail(error.to_string());
                self.observer.state_changed(run.state());
                let recovery_text = match (&recovery.backup, &recovery.target) {
                    (Some(backup), Some(target)) => Some(self.recovery_for(backup, target)),
                    _ => None,
                };
                span.in_scope(|| {
                    tracing::error!(%error, state = %last_state, "migration failed");
                });
                Err(RunFailure {
                    run_id: run.id.clone(),
                    source: run.source.clone(),
                    target: run.target.clone(),
                    mode,
                    error_kind: error.kind(),
                    error,
                    last_state,
                    backup: recovery.backup,
                    recovery: recovery_text,
                    history: run.history().to_vec(),
                })
            }
        }
    }

    fn resolve(
        &self,
        registry: &EnvironmentRegistry,
        source: &str,
        target: &str,
        mode: MigrationMode,
    ) -> Result<(Environment, Environment), MigrationError> {
        let source = registry.resolve(source, mode)?;
        let target = registry.resolve(target, mode)?;
        EnvironmentRegistry::check_pair(&source, &target, self.config.policy.shared_database)?;
        Ok((source, target))
    }

    fn advance(&self, run: &mut MigrationRun, next: RunState) -> Result<(), MigrationError> {
        run.advance(next)?;
        self.observer.state_changed(run.state());
        Ok(())
    }

    async fn execute(
        &self,
        run: &mut MigrationRun,
        registry: &EnvironmentRegistry,
        recovery: &mut Recovery,
    ) -> Result<RunReport, MigrationError> {
        self.observer.state_changed(run.state());
        let mode = run.mode;
        let (source, target) = self.resolve(registry, &run.source, &run.target, mode)?;
        recovery.target = Some(target.clone());

        let layout = run.layout().clone();
        layout
            .ensure_dirs()
            .map_err(|source| MigrationError::Artifact {
                path: layout.root().to_path_buf(),
                source,
            })?;
        let _lock = TargetLock::acquire(
            &target.name,
            &layout.lock(&target.name),
            Duration::from_secs(self.config.policy.lock_wait_secs),
        )
        .await?;
        let endpoints = Endpoints::connect(&self.connector, &source, &target)?;

        self.advance(run, RunState::PreflightChecking)?;
        let preflight = safety::preflight(&endpoints, &source, &target, mode).await?;

        self.advance(run, RunState::BackingUp)?;
        let backup = safety::take_backup(&endpoints, &target, &layout).await?;
        tracing::Span::current().record("backup", tracing::field::display(backup.path.display()));
        recovery.backup = Some(backup.clone());
        if let Ok(mut slot) = self.backup_slot.lock() {
            *slot = Some(backup.clone());
        }

        self.advance(run, RunState::SchemaSyncing)?;
        let schema = self.sync_schema(&endpoints, &source, &target, &layout).await?;

        let transplant = if mode.transplants_data() {
            self.advance(run, RunState::DataTransplanting)?;
            Some(self.transplant(&endpoints, &source, &layout).await?)
        } else {
            None
        };

        self.advance(run, RunState::PostValidating)?;
        let postflight = safety::postflight(
            &endpoints,
            &target,
            mode,
            &self.config.database.account_table,
            &self.config.database.settings_table,
        )
        .await?;

        self.advance(run, RunState::Completed)?;

        let mut warnings = transplant.as_ref().map(transplant_warnings).unwrap_or_default();
        warnings.extend(postflight.warnings.iter().cloned());

        Ok(RunReport {
            run_id: run.id.clone(),
            source: source.name,
            target: target.name,
            mode,
            started_at: run.started_at,
            finished_at: Utc::now(),
            preflight,
            backup,
            schema,
            transplant,
            postflight,
            warnings,
            protected_tables: SystemCatalog::entries().len(),
            history: run.history().to_vec(),
        })
    }

    async fn sync_schema(
        &self,
        endpoints: &Endpoints,
        source: &Environment,
        target: &Environment,
        layout: &ArtifactLayout,
    ) -> Result<SchemaSync, MigrationError> {
        let snapshot = endpoints
            .source_api
            .snapshot()
            .await
            .map_err(|e| MigrationError::from_schema(&source.name, e))?;
        let snapshot_path = layout.snapshot(&source.name);
        write_artifact(&snapshot_path, snapshot.to_pretty_json())?;

        let outcome = endpoints
            .target_api
            .diff(&snapshot, self.config.policy.force_diff)
            .await
            .map_err(|e| MigrationError::from_schema(&target.name, e))?;

        match outcome {
            DiffOutcome::Identical => {
                tracing::info!("target schema already matches; apply skipped");
                Ok(SchemaSync::Identical { snapshot_path })
            }
            DiffOutcome::Changes(diff) => {
                let diff_path = layout.diff(&target.name);
                write_artifact(&diff_path, diff.to_pretty_json())?;
                endpoints
                    .target_api
                    .apply(&diff)
                    .await
                    .map_err(|e| MigrationError::from_schema(&target.name, e))?;
                Ok(SchemaSync::Applied {
                    snapshot_path,
                    diff_path,
                    changes: diff.operations(),
                })
            }
        }
    }

    async fn transplant(
        &self,
        endpoints: &Endpoints,
        source: &Environment,
        layout: &ArtifactLayout,
    ) -> Result<TransplantResult, MigrationError> {
        let (Some(source_db), Some(target_db)) = (&endpoints.source_db, &endpoints.target_db) else {
            return Err(MigrationError::Connectivity {
                environment: source.name.clone(),
                detail: "data transplant needs a database on both sides".into(),
            });
        };
        let settings = RepairSettings {
            account_table: self.config.database.account_table.clone(),
            ownership_columns: self.config.database.ownership_columns.clone(),
        };
        let result = transplant::transplant(
            source_db.as_ref(),
            Arc::clone(target_db),
            &source.name,
            &layout.export(&source.name),
            &settings,
        )
        .await?;
        Ok(result)
    }
}

fn transplant_warnings(result: &TransplantResult) -> Vec<String> {
    let mut warnings = Vec::new();
    if result.tables.is_empty() {
        warnings.push("export contained no content tables; no data was moved".to_string());
    }
    let absent: Vec<&str> = result
        .cleared
        .iter()
        .filter(|c| c.action == ClearAction::Absent)
        .map(|c| c.table.as_str())
        .collect();
    if !absent.is_empty() {
        warnings.push(format!("tables missing on target: {}", absent.join(", ")));
    }
    warnings.extend(result.import.warning());
    let repaired = result.repaired_rows();
    if repaired > 0 {
        warnings.push(format!("nulled {repaired} ownership reference(s) to accounts the target lacks"));
    }
    warnings
}

fn write_artifact(path: &Path, body: serde_json::Result<String>) -> Result<(), MigrationError> {
    body.map_err(std::io::Error::other)
        .and_then(|body| std::fs::write(path, body))
        .map_err(|source| MigrationError::Artifact {
            path: path.to_path_buf(),
            source,
        })
}
