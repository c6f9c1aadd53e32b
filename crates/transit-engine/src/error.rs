//! Unified error taxonomy. Every crate error converges here.

use std::path::PathBuf;

use thiserror::Error;
use transit_config::ConfigError;
use transit_core::CoreError;
use transit_db::DbError;
use transit_schema::SchemaError;

/// Failures inside the data transplant sequence.
#[derive(Debug, Error)]
pub enum TransplantError {
    /// The export manifest lists protected tables; nothing was cleared.
    #[error("Content export of '{environment}' contains system tables: {}", .tables.join(", "))]
    SystemTableInExport {
        environment: String,
        tables: Vec<String>,
    },

    /// The clear path was asked to touch a protected table.
    #[error("Refusing to clear system table '{0}'")]
    SystemTableClear(String),

    #[error("Content export failed: {0}")]
    Export(#[source] DbError),

    #[error("Clearing '{table}' failed: {source}")]
    Clear {
        table: String,
        #[source]
        source: DbError,
    },

    #[error("Import failed: {0}")]
    Import(#[source] DbError),

    /// Triggers could not be switched back on. Foreign keys may be unenforced.
    #[error("Re-enabling triggers on {tables} table(s) failed: {source}")]
    TriggerRestore {
        tables: usize,
        #[source]
        source: DbError,
    },

    #[error("Ownership repair of {table}.{column} failed: {source}")]
    Repair {
        table: String,
        column: String,
        #[source]
        source: DbError,
    },

    #[error("Database error: {0}")]
    Db(#[from] DbError),
}

impl TransplantError {
    /// The tooling error underneath, if any.
    #[must_use]
    pub const fn db_error(&self) -> Option<&DbError> {
        match self {
            Self::Export(e) | Self::Import(e) | Self::Db(e) => Some(e),
            Self::Clear { source, .. }
            | Self::TriggerRestore { source, .. }
            | Self::Repair { source, .. } => Some(source),
            Self::SystemTableInExport { .. } | Self::SystemTableClear(_) => None,
        }
    }
}

/// Every way a migration run can fail.
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// An instance or database could not be reached.
    #[error("'{environment}' is not reachable: {detail}")]
    Connectivity { environment: String, detail: String },

    /// Reachable, but the credential lacks structural access.
    #[error("'{environment}' rejected the credential: {detail}")]
    Permission { environment: String, detail: String },

    /// A structural API call failed or returned something unusable.
    #[error("Schema transport with '{environment}' failed: {source}")]
    Transport {
        environment: String,
        #[source]
        source: SchemaError,
    },

    /// The target rejected the schema diff.
    #[error("Schema apply on '{environment}' failed: {source}")]
    Apply {
        environment: String,
        #[source]
        source: SchemaError,
    },

    #[error(transparent)]
    Transplant(TransplantError),

    /// A database query outside the transplant failed.
    #[error("Database of '{environment}' failed: {source}")]
    Database {
        environment: String,
        #[source]
        source: DbError,
    },

    /// The mandatory backup could not be taken. Nothing was modified.
    #[error("Backup of '{target}' failed: {reason}")]
    Backup { target: String, reason: String },

    /// The target lost every account after migrating.
    #[error("Integrity violation on '{target}': {table} has {accounts} rows after migration")]
    IntegrityViolation {
        target: String,
        table: String,
        accounts: u64,
    },

    #[error("{operation} timed out after {after_secs}s")]
    Timeout { operation: String, after_secs: u64 },

    /// Another run holds the target's advisory lock.
    #[error("Target '{target}' is locked by {holder}")]
    Locked { target: String, holder: String },

    #[error("Could not write artifact {}: {source}", .path.display())]
    Artifact {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    State(#[from] CoreError),
}

impl MigrationError {
    /// Classify a structural API error raised while talking to `environment`.
    #[must_use]
    pub fn from_schema(environment: &str, error: SchemaError) -> Self {
        let environment = environment.to_string();
        match error {
            SchemaError::Unreachable { .. } | SchemaError::Unhealthy { .. } => Self::Connectivity {
                environment,
                detail: error.to_string(),
            },
            SchemaError::PermissionDenied { .. } => Self::Permission {
                environment,
                detail: error.to_string(),
            },
            SchemaError::Timeout { url, after_secs } => Self::Timeout {
                operation: format!("request to {url}"),
                after_secs,
            },
            SchemaError::Apply { .. } => Self::Apply {
                environment,
                source: error,
            },
            other => Self::Transport {
                environment,
                source: other,
            },
        }
    }

    /// Classify a tooling error raised against `environment`'s database.
    #[must_use]
    pub fn from_db(environment: &str, error: DbError) -> Self {
        match error {
            DbError::Timeout {
                operation,
                after_secs,
            } => Self::Timeout {
                operation,
                after_secs,
            },
            other => Self::Database {
                environment: environment.to_string(),
                source: other,
            },
        }
    }

    /// Short machine-readable kind for reports.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::Connectivity { .. } => "connectivity",
            Self::Permission { .. } => "permission",
            Self::Transport { .. } => "transport",
            Self::Apply { .. } => "apply",
            Self::Transplant(_) => "transplant",
            Self::Database { .. } => "database",
            Self::Backup { .. } => "backup",
            Self::IntegrityViolation { .. } => "integrity_violation",
            Self::Timeout { .. } => "timeout",
            Self::Locked { .. } => "locked",
            Self::Artifact { .. } => "artifact",
            Self::State(_) => "state",
        }
    }
}

impl From<TransplantError> for MigrationError {
    fn from(error: TransplantError) -> Self {
        if let Some(DbError::Timeout {
            operation,
            after_secs,
        }) = error.db_error()
        {
            return Self::Timeout {
                operation: operation.clone(),
                after_secs: *after_secs,
            };
        }
        Self::Transplant(error)
    }
}
