//! Pre-flight probes, the mandatory target backup, and post-flight integrity checks.

use chrono::Utc;
use serde::Serialize;
use transit_core::{ArtifactLayout, Environment, MigrationMode};

use crate::backup::{Backup, BackupKind};
use crate::connector::Endpoints;
use crate::error::MigrationError;

/// One probe that passed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeResult {
    pub environment: String,
    pub probe: &'static str,
    pub detail: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PreflightReport {
    pub probes: Vec<ProbeResult>,
}

impl PreflightReport {
    fn passed(&mut self, environment: &str, probe: &'static str, detail: impl Into<String>) {
        self.probes.push(ProbeResult {
            environment: environment.to_string(),
            probe,
            detail: detail.into(),
        });
    }
}

/// Probe both environments before anything is modified.
///
/// # Errors
///
/// [`MigrationError::Connectivity`] for unreachable or unhealthy instances and
/// databases, [`MigrationError::Permission`] when a credential lacks
/// structural access, [`MigrationError::Timeout`] for slow probes.
pub async fn preflight(
    endpoints: &Endpoints,
    source: &Environment,
    target: &Environment,
    mode: MigrationMode,
) -> Result<PreflightReport, MigrationError> {
    let mut report = PreflightReport::default();

    for (env, api) in [(source, &endpoints.source_api), (target, &endpoints.target_api)] {
        api.health()
            .await
            .map_err(|e| MigrationError::from_schema(&env.name, e))?;
        report.passed(&env.name, "api_health", env.api.base_url.clone());

        api.probe_structural_access()
            .await
            .map_err(|e| MigrationError::from_schema(&env.name, e))?;
        report.passed(&env.name, "structural_access", "snapshot readable");
    }

    for (env, db) in [(source, &endpoints.source_db), (target, &endpoints.target_db)] {
        match db {
            Some(db) => {
                db.ping().await.map_err(|e| match e {
                    transit_db::DbError::Timeout { .. } => MigrationError::from_db(&env.name, e),
                    other => MigrationError::Connectivity {
                        environment: env.name.clone(),
                        detail: other.to_string(),
                    },
                })?;
                report.passed(&env.name, "database", db.describe());
            }
            None if mode.requires_database() => {
                return Err(MigrationError::Connectivity {
                    environment: env.name.clone(),
                    detail: "no database configured for a full migration".into(),
                });
            }
            None => {}
        }
    }

    tracing::info!(probes = report.probes.len(), "pre-flight passed");
    Ok(report)
}

/// Take the mandatory backup of the target. Nothing may be modified before
/// this succeeds.
///
/// # Errors
///
/// [`MigrationError::Backup`] if the backup fails or is empty.
pub async fn take_backup(
    endpoints: &Endpoints,
    target: &Environment,
    layout: &ArtifactLayout,
) -> Result<Backup, MigrationError> {
    let backup_error = |reason: String| MigrationError::Backup {
        target: target.name.clone(),
        reason,
    };

    let (path, bytes, kind) = if let Some(db) = &endpoints.target_db {
        let path = layout.full_backup(&target.name);
        let bytes = db
            .backup_full(&path)
            .await
            .map_err(|e| backup_error(e.to_string()))?;
        (path, bytes, BackupKind::Database)
    } else {
        let path = layout.schema_backup(&target.name);
        let snapshot = endpoints
            .target_api
            .snapshot()
            .await
            .map_err(|e| backup_error(e.to_string()))?;
        let body = snapshot
            .to_pretty_json()
            .map_err(|e| backup_error(e.to_string()))?;
        std::fs::write(&path, &body).map_err(|e| backup_error(format!("{}: {e}", path.display())))?;
        (path, body.len() as u64, BackupKind::SchemaSnapshot)
    };

    if bytes == 0 {
        return Err(backup_error(format!("{} is empty", path.display())));
    }
    tracing::info!(path = %path.display(), bytes, kind = ?kind, "target backup taken");
    Ok(Backup {
        path,
        bytes,
        kind,
        taken_at: Utc::now(),
    })
}

/// Post-run integrity counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PostflightReport {
    pub accounts: Option<u64>,
    pub settings: Option<u64>,
    pub warnings: Vec<String>,
}

/// Verify the target still has what makes it usable.
///
/// # Errors
///
/// In full mode, [`MigrationError::IntegrityViolation`] when the account
/// table is empty, and the underlying database error when counts fail.
pub async fn postflight(
    endpoints: &Endpoints,
    target: &Environment,
    mode: MigrationMode,
    account_table: &str,
    settings_table: &str,
) -> Result<PostflightReport, MigrationError> {
    let mut report = PostflightReport::default();
    let Some(db) = &endpoints.target_db else {
        tracing::info!("no target database; post-flight counts skipped");
        return Ok(report);
    };
    let strict = mode.transplants_data();

    match db.count_rows(account_table).await {
        Ok(0) if strict => {
            return Err(MigrationError::IntegrityViolation {
                target: target.name.clone(),
                table: account_table.to_string(),
                accounts: 0,
            });
        }
        Ok(count) => {
            if count == 0 {
                report
                    .warnings
                    .push(format!("{account_table} is empty on '{}'", target.name));
            }
            report.accounts = Some(count);
        }
        Err(e) if strict => return Err(MigrationError::from_db(&target.name, e)),
        Err(e) => report.warnings.push(format!("could not count {account_table}: {e}")),
    }

    match db.count_rows(settings_table).await {
        Ok(count) => {
            if count == 0 {
                report
                    .warnings
                    .push(format!("{settings_table} is empty on '{}'", target.name));
            }
            report.settings = Some(count);
        }
        Err(e) if strict => return Err(MigrationError::from_db(&target.name, e)),
        Err(e) => report.warnings.push(format!("could not count {settings_table}: {e}")),
    }

    for warning in &report.warnings {
        tracing::warn!("{warning}");
    }
    tracing::info!(accounts = ?report.accounts, settings = ?report.settings, "post-flight counts");
    Ok(report)
}
