//! Content-data transplant: export, clear, import, repair.
//!
//! Steps run strictly in order and each is gated by the one before. The
//! [`TableSet`] discovered from the export's own manifest is the only thing
//! that decides which target tables are touched.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use transit_core::{SystemCatalog, TableSet};
use transit_db::{Database, RestoreLog};

use crate::error::TransplantError;
use crate::fk_guard::ForeignKeySuspension;

/// Tables and columns that ownership repair consults.
#[derive(Debug, Clone)]
pub struct RepairSettings {
    pub account_table: String,
    pub ownership_columns: Vec<String>,
}

/// What happened to one target table during the clear step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "action")]
pub enum ClearAction {
    Truncated,
    /// Truncation was refused; rows were deleted instead.
    Deleted { rows: u64 },
    /// The table does not exist on the target.
    Absent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableClear {
    pub table: String,
    #[serde(flatten)]
    pub action: ClearAction,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum ImportOutcome {
    /// Nothing to import.
    Skipped,
    Clean,
    /// Every error was a duplicate key; the rows already existed.
    DuplicatesOnly { duplicates: usize },
    /// Errors other than duplicate keys. Post-flight decides whether the run fails.
    Errors {
        total: usize,
        duplicates: usize,
        excerpt: Vec<String>,
    },
}

impl ImportOutcome {
    #[must_use]
    pub fn from_log(log: &RestoreLog) -> Self {
        if log.is_clean() {
            Self::Clean
        } else if log.duplicates_only() {
            Self::DuplicatesOnly {
                duplicates: log.duplicate_key_errors,
            }
        } else {
            Self::Errors {
                total: log.total_errors,
                duplicates: log.duplicate_key_errors,
                excerpt: log.other_error_lines.clone(),
            }
        }
    }

    /// Operator-facing warning, if the outcome deserves one.
    #[must_use]
    pub fn warning(&self) -> Option<String> {
        match self {
            Self::Skipped | Self::Clean => None,
            Self::DuplicatesOnly { duplicates } => Some(format!(
                "import reported {duplicates} duplicate-key error(s); those rows already existed on the target"
            )),
            Self::Errors { total, duplicates, .. } => Some(format!(
                "import reported {total} error(s), {duplicates} of them duplicate keys; inspect the import log"
            )),
        }
    }
}

/// Row counts for one target table around the transplant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowDelta {
    pub table: String,
    pub before: u64,
    pub after: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OwnershipRepair {
    pub table: String,
    pub column: String,
    pub rows: u64,
}

/// Everything the data engine did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransplantResult {
    pub export_path: PathBuf,
    pub export_bytes: u64,
    pub tables: TableSet,
    pub cleared: Vec<TableClear>,
    pub import: ImportOutcome,
    pub row_counts: Vec<RowDelta>,
    pub repairs: Vec<OwnershipRepair>,
}

impl TransplantResult {
    #[must_use]
    pub fn repaired_rows(&self) -> u64 {
        self.repairs.iter().map(|r| r.rows).sum()
    }
}

/// Export content tables from `source` into `dest` and read back the
/// tables the artifact actually contains.
///
/// # Errors
///
/// [`TransplantError::Export`] if the dump or manifest read fails;
/// [`TransplantError::SystemTableInExport`] if any protected table slipped in.
pub async fn export_content(
    source: &dyn Database,
    source_name: &str,
    dest: &Path,
) -> Result<(u64, TableSet), TransplantError> {
    let exclusions = SystemCatalog::export_exclusions(source.schema());
    let bytes = source
        .export_data(&exclusions, dest)
        .await
        .map_err(TransplantError::Export)?;
    let tables = source
        .list_export_tables(dest)
        .await
        .map_err(TransplantError::Export)?;

    let contaminated = tables.system_tables();
    if !contaminated.is_empty() {
        return Err(TransplantError::SystemTableInExport {
            environment: source_name.to_string(),
            tables: contaminated.into_iter().map(String::from).collect(),
        });
    }
    tracing::info!(tables = tables.len(), bytes, path = %dest.display(), "content exported");
    Ok((bytes, tables))
}

/// Empty every table in `tables` on the target without touching any other.
///
/// All present tables go in one truncate, so references between them never
/// block it. If something outside the set references one of them, each table
/// is retried alone and the ones still refused are deleted with referential
/// actions suspended.
///
/// # Errors
///
/// [`TransplantError::SystemTableClear`] before anything is touched if the
/// set names a protected table; [`TransplantError::Clear`] if both truncate
/// and delete fail.
pub async fn clear_target_tables(
    target: &dyn Database,
    tables: &TableSet,
) -> Result<Vec<TableClear>, TransplantError> {
    if let Some(table) = tables.iter().find(|t| SystemCatalog::is_system_table(t)) {
        return Err(TransplantError::SystemTableClear(table.to_string()));
    }

    let mut present = Vec::with_capacity(tables.len());
    for table in tables {
        let exists = target
            .table_exists(table)
            .await
            .map_err(|source| TransplantError::Clear {
                table: table.clone(),
                source,
            })?;
        if exists {
            present.push(table.clone());
        } else {
            tracing::warn!(table, "table absent on target; skipped");
        }
    }

    let actions = if present.is_empty() {
        Vec::new()
    } else {
        match target.truncate_tables(&present).await {
            Ok(()) => vec![ClearAction::Truncated; present.len()],
            Err(error) => {
                tracing::warn!(tables = present.len(), %error, "batch truncate refused; clearing table by table");
                clear_one_by_one(target, &present).await?
            }
        }
    };

    let mut actions: BTreeMap<String, ClearAction> = present.into_iter().zip(actions).collect();
    let mut cleared = Vec::with_capacity(tables.len());
    for table in tables {
        let action = actions.remove(table).unwrap_or(ClearAction::Absent);
        tracing::debug!(table, ?action, "cleared");
        cleared.push(TableClear {
            table: table.clone(),
            action,
        });
    }
    Ok(cleared)
}

async fn clear_one_by_one(
    target: &dyn Database,
    tables: &[String],
) -> Result<Vec<ClearAction>, TransplantError> {
    let mut actions = Vec::with_capacity(tables.len());
    for table in tables {
        let action = match target.truncate_tables(std::slice::from_ref(table)).await {
            Ok(()) => ClearAction::Truncated,
            Err(error) => {
                tracing::warn!(table, %error, "truncate refused; deleting rows with referential actions suspended");
                let rows = target
                    .delete_all_rows(table)
                    .await
                    .map_err(|source| TransplantError::Clear {
                        table: table.clone(),
                        source,
                    })?;
                ClearAction::Deleted { rows }
            }
        };
        actions.push(action);
    }
    Ok(actions)
}

/// Restore `artifact` into the target with triggers suspended on `present`.
///
/// # Errors
///
/// [`TransplantError::Import`] if triggers cannot be suspended or the restore
/// cannot run; [`TransplantError::TriggerRestore`] if the re-enable fails.
pub async fn import_content(
    target: Arc<dyn Database>,
    artifact: &Path,
    present: Vec<String>,
) -> Result<ImportOutcome, TransplantError> {
    let count = present.len();
    let guard = ForeignKeySuspension::suspend(Arc::clone(&target), present)
        .await
        .map_err(TransplantError::Import)?;

    let restored = target.restore_data(artifact).await;
    let released = guard.release().await;

    let log = restored.map_err(TransplantError::Import)?;
    released.map_err(|source| TransplantError::TriggerRestore {
        tables: count,
        source,
    })?;

    let outcome = ImportOutcome::from_log(&log);
    match &outcome {
        ImportOutcome::DuplicatesOnly { duplicates } => {
            tracing::warn!(duplicates, "import hit duplicate keys only");
        }
        ImportOutcome::Errors { total, .. } => {
            tracing::warn!(errors = total, "import reported errors");
        }
        ImportOutcome::Clean | ImportOutcome::Skipped => tracing::info!("import clean"),
    }
    Ok(outcome)
}

/// Null creator/updater references that point at accounts the target lacks.
///
/// # Errors
///
/// [`TransplantError::Repair`] on the first failing update.
pub async fn repair_ownership_references(
    target: &dyn Database,
    tables: &[String],
    settings: &RepairSettings,
) -> Result<Vec<OwnershipRepair>, TransplantError> {
    let mut repairs = Vec::new();
    for table in tables {
        if SystemCatalog::is_system_table(table) {
            continue;
        }
        let columns = target.columns(table).await?;
        for column in settings
            .ownership_columns
            .iter()
            .filter(|c| columns.contains(c))
        {
            let rows = target
                .null_dangling_references(table, column, &settings.account_table)
                .await
                .map_err(|source| TransplantError::Repair {
                    table: table.clone(),
                    column: column.clone(),
                    source,
                })?;
            if rows > 0 {
                tracing::info!(table, column, rows, "nulled dangling ownership references");
            }
            repairs.push(OwnershipRepair {
                table: table.clone(),
                column: column.clone(),
                rows,
            });
        }
    }
    Ok(repairs)
}

async fn count_all(target: &dyn Database, tables: &[String]) -> Result<Vec<u64>, TransplantError> {
    let mut counts = Vec::with_capacity(tables.len());
    for table in tables {
        counts.push(target.count_rows(table).await?);
    }
    Ok(counts)
}

/// Full transplant from `source` into `target`.
///
/// # Errors
///
/// The first failing step's [`TransplantError`]. Nothing after it runs.
pub async fn transplant(
    source: &dyn Database,
    target: Arc<dyn Database>,
    source_name: &str,
    export_path: &Path,
    settings: &RepairSettings,
) -> Result<TransplantResult, TransplantError> {
    let (export_bytes, tables) = export_content(source, source_name, export_path).await?;

    let mut result = TransplantResult {
        export_path: export_path.to_path_buf(),
        export_bytes,
        tables: tables.clone(),
        cleared: Vec::new(),
        import: ImportOutcome::Skipped,
        row_counts: Vec::new(),
        repairs: Vec::new(),
    };
    if tables.is_empty() {
        tracing::warn!(source = source_name, "export contains no content tables; target left untouched");
        return Ok(result);
    }

    let mut present = Vec::new();
    for table in &tables {
        if target.table_exists(table).await? {
            present.push(table.clone());
        }
    }
    let before = count_all(target.as_ref(), &present).await?;

    result.cleared = clear_target_tables(target.as_ref(), &tables).await?;
    result.import = import_content(Arc::clone(&target), export_path, present.clone()).await?;

    let after = count_all(target.as_ref(), &present).await?;
    result.row_counts = present
        .iter()
        .zip(before.into_iter().zip(after))
        .map(|(table, (before, after))| RowDelta {
            table: table.clone(),
            before,
            after,
        })
        .collect();

    result.repairs = repair_ownership_references(target.as_ref(), &present, settings).await?;
    Ok(result)
}
