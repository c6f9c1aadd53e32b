//! Target backups and the recovery text printed whenever a run aborts.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;
use transit_config::EnvironmentRegistry;
use transit_config::registry::{SUFFIX_DB_PASSWORD, SUFFIX_TOKEN};
use transit_core::{DbTarget, Environment};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BackupKind {
    /// Custom-format dump of the whole target database.
    Database,
    /// The target's structural snapshot, for runs without database access.
    SchemaSnapshot,
}

/// A backup taken before any mutation. Never deleted by Transit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Backup {
    pub path: PathBuf,
    pub bytes: u64,
    pub kind: BackupKind,
    pub taken_at: DateTime<Utc>,
}

/// Exact commands to return `target` to the state captured in `backup`.
#[must_use]
pub fn restore_instructions(backup: &Backup, target: &Environment, docker_bin: &str) -> String {
    let path = backup.path.display();
    match (backup.kind, &target.database) {
        (BackupKind::Database, Some(db)) => match &db.target {
            DbTarget::Container { name } => format!(
                "{docker_bin} exec -i {name} pg_restore --clean --if-exists -U {user} -d {database} < {path}",
                user = db.user,
                database = db.database,
            ),
            DbTarget::Host { host, port } => format!(
                "PGPASSWORD=<{prefix}{SUFFIX_DB_PASSWORD}> pg_restore --clean --if-exists -h {host} -p {port} -U {user} -d {database} {path}",
                prefix = env_prefix(&target.name),
                user = db.user,
                database = db.database,
            ),
        },
        (BackupKind::Database, None) => format!(
            "pg_restore --clean --if-exists -d <database> {path}"
        ),
        (BackupKind::SchemaSnapshot, _) => {
            let diff = target.api.url("schema/diff?force=true");
            let apply = target.api.url("schema/apply");
            let token = format!("${}{SUFFIX_TOKEN}", env_prefix(&target.name));
            format!(
                "curl -sf -X POST -H \"Authorization: Bearer {token}\" -H 'Content-Type: application/json' \
                 --data @{path} {diff} > restore-diff.json && \
                 jq '.data' restore-diff.json | curl -sf -X POST -H \"Authorization: Bearer {token}\" \
                 -H 'Content-Type: application/json' --data @- {apply}"
            )
        }
    }
}

/// Names reaching here were resolved through the registry, so the prefix
/// is always valid; the raw name is a readable stand-in otherwise.
fn env_prefix(name: &str) -> String {
    EnvironmentRegistry::prefix_for(name).unwrap_or_else(|_| name.to_ascii_uppercase())
}
