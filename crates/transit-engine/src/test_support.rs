//! In-memory collaborators for engine tests.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use transit_config::{EnvironmentRegistry, TransitConfig};
use transit_core::{Environment, TableSet};
use transit_db::{Database, DbError, RestoreLog};
use transit_schema::{DiffOutcome, SchemaApi, SchemaDiff, SchemaError, SchemaSnapshot};

use crate::connector::Connector;
use crate::error::MigrationError;

fn failed(operation: &str, stderr: &str) -> DbError {
    DbError::CommandFailed {
        operation: operation.to_string(),
        code: 1,
        stderr: stderr.to_string(),
    }
}

#[derive(Debug, Clone)]
struct FakeTable {
    rows: u64,
    columns: Vec<String>,
    triggers: bool,
}

/// `child` references `parent`.
#[derive(Debug, Clone)]
struct ForeignKey {
    child: String,
    parent: String,
}

#[derive(Debug, Default)]
struct DbState {
    tables: BTreeMap<String, FakeTable>,
    export: Vec<String>,
    export_exclusions: Vec<String>,
    import_rows: BTreeMap<String, u64>,
    restore_log: RestoreLog,
    restore_error: Option<String>,
    restore_delay: Option<Duration>,
    restore_saw_triggers_disabled: Option<bool>,
    foreign_keys: Vec<ForeignKey>,
    dangling: BTreeMap<(String, String), u64>,
    fail_backup: bool,
    empty_backup: bool,
    fail_ping: bool,
    fail_async_enable: bool,
    blocking_enables: usize,
    calls: Vec<String>,
}

/// A database whose tables are row counters.
#[derive(Debug)]
pub struct FakeDatabase {
    state: Mutex<DbState>,
}

impl FakeDatabase {
    pub fn with_tables(tables: &[(&str, u64)]) -> Arc<Self> {
        let state = DbState {
            tables: tables
                .iter()
                .map(|(name, rows)| {
                    (
                        (*name).to_string(),
                        FakeTable {
                            rows: *rows,
                            columns: vec!["id".into()],
                            triggers: true,
                        },
                    )
                })
                .collect(),
            ..DbState::default()
        };
        Arc::new(Self {
            state: Mutex::new(state),
        })
    }

    fn state(&self) -> MutexGuard<'_, DbState> {
        self.state.lock().unwrap()
    }

    pub fn set_export(&self, tables: &[&str]) {
        self.state().export = tables.iter().map(ToString::to_string).collect();
    }

    pub fn set_import_rows(&self, rows: &[(&str, u64)]) {
        self.state().import_rows = rows.iter().map(|(t, n)| ((*t).to_string(), *n)).collect();
    }

    pub fn set_restore_log(&self, log: RestoreLog) {
        self.state().restore_log = log;
    }

    pub fn fail_restore(&self, stderr: &str) {
        self.state().restore_error = Some(stderr.to_string());
    }

    pub fn delay_restore(&self, delay: Duration) {
        self.state().restore_delay = Some(delay);
    }

    /// `child` references `parent`. Truncation follows PostgreSQL: refused
    /// unless every referencing table is truncated in the same statement.
    pub fn add_foreign_key(&self, child: &str, parent: &str) {
        self.state().foreign_keys.push(ForeignKey {
            child: child.to_string(),
            parent: parent.to_string(),
        });
    }

    pub fn add_columns(&self, table: &str, columns: &[&str]) {
        if let Some(t) = self.state().tables.get_mut(table) {
            t.columns.extend(columns.iter().map(ToString::to_string));
        }
    }

    pub fn set_dangling(&self, table: &str, column: &str, rows: u64) {
        self.state()
            .dangling
            .insert((table.to_string(), column.to_string()), rows);
    }

    pub fn fail_backup(&self) {
        self.state().fail_backup = true;
    }

    pub fn empty_backup(&self) {
        self.state().empty_backup = true;
    }

    pub fn fail_ping(&self) {
        self.state().fail_ping = true;
    }

    pub fn fail_async_enable(&self) {
        self.state().fail_async_enable = true;
    }

    pub fn rows(&self, table: &str) -> Option<u64> {
        self.state().tables.get(table).map(|t| t.rows)
    }

    pub fn triggers_enabled(&self, table: &str) -> bool {
        self.state().tables.get(table).is_none_or(|t| t.triggers)
    }

    pub fn blocking_enables(&self) -> usize {
        self.state().blocking_enables
    }

    pub fn restore_saw_triggers_disabled(&self) -> Option<bool> {
        self.state().restore_saw_triggers_disabled
    }

    pub fn export_exclusions(&self) -> Vec<String> {
        self.state().export_exclusions.clone()
    }

    pub fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }

    /// Whether any mutating call named `table`.
    pub fn mutated(&self, table: &str) -> bool {
        self.calls().iter().any(|call| {
            call.split_once(':').is_some_and(|(op, subject)| {
                matches!(op, "truncate" | "delete" | "repair")
                    && subject
                        .split(',')
                        .any(|name| name.split('.').next() == Some(table))
            })
        })
    }

    fn record(&self, call: impl Into<String>) {
        self.state().calls.push(call.into());
    }

    fn set_triggers(&self, tables: &[String], enabled: bool) {
        let mut state = self.state();
        for name in tables {
            if let Some(t) = state.tables.get_mut(name) {
                t.triggers = enabled;
            }
        }
    }
}

#[async_trait]
impl Database for FakeDatabase {
    fn describe(&self) -> String {
        "fake-db".into()
    }

    fn schema(&self) -> &str {
        "public"
    }

    async fn ping(&self) -> Result<(), DbError> {
        self.record("ping");
        if self.state().fail_ping {
            return Err(failed("ping", "could not connect to server"));
        }
        Ok(())
    }

    async fn backup_full(&self, dest: &Path) -> Result<u64, DbError> {
        self.record("backup");
        let (fail, empty) = {
            let s = self.state();
            (s.fail_backup, s.empty_backup)
        };
        if fail {
            return Err(failed("backup", "pg_dump: error: connection refused"));
        }
        let body: &[u8] = if empty { b"" } else { b"PGDMP-full-backup" };
        std::fs::write(dest, body)?;
        if empty {
            return Err(DbError::EmptyArtifact(dest.to_path_buf()));
        }
        Ok(body.len() as u64)
    }

    async fn export_data(&self, exclusions: &[String], dest: &Path) -> Result<u64, DbError> {
        self.record("export");
        self.state().export_exclusions = exclusions.to_vec();
        let body = b"PGDMP-content-export";
        std::fs::write(dest, body)?;
        Ok(body.len() as u64)
    }

    async fn list_export_tables(&self, _artifact: &Path) -> Result<TableSet, DbError> {
        let names = self.state().export.clone();
        Ok(TableSet::from_names(names)?)
    }

    async fn table_exists(&self, table: &str) -> Result<bool, DbError> {
        self.record(format!("exists:{table}"));
        Ok(self.state().tables.contains_key(table))
    }

    async fn truncate_tables(&self, tables: &[String]) -> Result<(), DbError> {
        self.record(format!("truncate:{}", tables.join(",")));
        let mut state = self.state();
        if let Some(fk) = state
            .foreign_keys
            .iter()
            .find(|fk| tables.contains(&fk.parent) && !tables.contains(&fk.child))
        {
            return Err(failed(
                "truncate",
                &format!(
                    "ERROR:  cannot truncate a table referenced in a foreign key constraint\n\
                     DETAIL:  Table \"{}\" references \"{}\".",
                    fk.child, fk.parent
                ),
            ));
        }
        for table in tables {
            state
                .tables
                .get_mut(table)
                .ok_or_else(|| failed("truncate", "relation does not exist"))?
                .rows = 0;
        }
        Ok(())
    }

    /// Referential actions are suspended for the delete, so rows in
    /// referencing tables are left alone whatever their `ON DELETE` rule.
    async fn delete_all_rows(&self, table: &str) -> Result<u64, DbError> {
        self.record(format!("delete:{table}"));
        let mut state = self.state();
        let t = state
            .tables
            .get_mut(table)
            .ok_or_else(|| failed("delete", "relation does not exist"))?;
        Ok(std::mem::take(&mut t.rows))
    }

    async fn count_rows(&self, table: &str) -> Result<u64, DbError> {
        self.record(format!("count:{table}"));
        self.rows(table)
            .ok_or_else(|| failed("count", "relation does not exist"))
    }

    async fn columns(&self, table: &str) -> Result<Vec<String>, DbError> {
        Ok(self
            .state()
            .tables
            .get(table)
            .map(|t| t.columns.clone())
            .unwrap_or_default())
    }

    async fn disable_triggers(&self, tables: &[String]) -> Result<(), DbError> {
        self.record(format!("disable:{}", tables.join(",")));
        self.set_triggers(tables, false);
        Ok(())
    }

    async fn enable_triggers(&self, tables: &[String]) -> Result<(), DbError> {
        self.record(format!("enable:{}", tables.join(",")));
        if self.state().fail_async_enable {
            return Err(failed("enable triggers", "server closed the connection"));
        }
        self.set_triggers(tables, true);
        Ok(())
    }

    fn enable_triggers_blocking(&self, tables: &[String]) -> Result<(), DbError> {
        self.state().blocking_enables += 1;
        self.set_triggers(tables, true);
        Ok(())
    }

    async fn restore_data(&self, _artifact: &Path) -> Result<RestoreLog, DbError> {
        self.record("restore");
        let delay = self.state().restore_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let mut state = self.state();
        let exported: Vec<String> = state.export.clone();
        let all_off = exported
            .iter()
            .filter_map(|name| state.tables.get(name))
            .all(|t| !t.triggers);
        state.restore_saw_triggers_disabled = Some(all_off);
        if let Some(stderr) = state.restore_error.clone() {
            return Err(failed("restore", &stderr));
        }
        let imports = state.import_rows.clone();
        for (table, rows) in imports {
            if let Some(t) = state.tables.get_mut(&table) {
                t.rows += rows;
            }
        }
        Ok(state.restore_log.clone())
    }

    async fn null_dangling_references(
        &self,
        table: &str,
        column: &str,
        _account_table: &str,
    ) -> Result<u64, DbError> {
        self.record(format!("repair:{table}.{column}"));
        Ok(self
            .state()
            .dangling
            .get(&(table.to_string(), column.to_string()))
            .copied()
            .unwrap_or(0))
    }
}

#[derive(Debug)]
struct ApiState {
    snapshot: Value,
    diff: Option<Value>,
    unhealthy: bool,
    forbidden: bool,
    apply_status: Option<u16>,
    calls: Vec<String>,
    applied: Vec<Value>,
}

/// A structural API backed by fixed documents.
#[derive(Debug)]
pub struct FakeSchemaApi {
    name: String,
    state: Mutex<ApiState>,
}

pub fn snapshot_doc() -> Value {
    json!({
        "version": 1,
        "directus": "10.10.4",
        "vendor": "postgres",
        "collections": [{"collection": "articles"}, {"collection": "tags"}],
        "fields": [{"collection": "articles", "field": "title"}],
        "relations": []
    })
}

pub fn diff_doc() -> Value {
    json!({
        "hash": "abc123",
        "diff": {
            "collections": [],
            "fields": [{"collection": "articles", "field": "subtitle", "diff": [{"kind": "N"}]}],
            "relations": []
        }
    })
}

impl FakeSchemaApi {
    /// An instance whose diff reports no changes.
    pub fn identical(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            state: Mutex::new(ApiState {
                snapshot: snapshot_doc(),
                diff: None,
                unhealthy: false,
                forbidden: false,
                apply_status: None,
                calls: Vec::new(),
                applied: Vec::new(),
            }),
        })
    }

    /// An instance whose diff returns [`diff_doc`].
    pub fn with_changes(name: &str) -> Arc<Self> {
        let api = Self::identical(name);
        api.state().diff = Some(diff_doc());
        api
    }

    fn state(&self) -> MutexGuard<'_, ApiState> {
        self.state.lock().unwrap()
    }

    pub fn make_unhealthy(&self) {
        self.state().unhealthy = true;
    }

    pub fn forbid(&self) {
        self.state().forbidden = true;
    }

    pub fn reject_apply(&self, status: u16) {
        self.state().apply_status = Some(status);
    }

    pub fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }

    pub fn applied(&self) -> Vec<Value> {
        self.state().applied.clone()
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}.test/{path}", self.name)
    }
}

#[async_trait]
impl SchemaApi for FakeSchemaApi {
    fn environment(&self) -> &str {
        &self.name
    }

    async fn health(&self) -> Result<(), SchemaError> {
        let mut state = self.state();
        state.calls.push("health".into());
        if state.unhealthy {
            return Err(SchemaError::Unhealthy {
                url: self.url("server/health"),
                status: 503,
            });
        }
        Ok(())
    }

    async fn probe_structural_access(&self) -> Result<(), SchemaError> {
        let mut state = self.state();
        state.calls.push("probe".into());
        if state.forbidden {
            return Err(SchemaError::PermissionDenied {
                url: self.url("schema/snapshot"),
                status: 403,
            });
        }
        Ok(())
    }

    async fn snapshot(&self) -> Result<SchemaSnapshot, SchemaError> {
        let doc = {
            let mut state = self.state();
            state.calls.push("snapshot".into());
            state.snapshot.clone()
        };
        SchemaSnapshot::from_value(doc)
    }

    async fn diff(&self, _snapshot: &SchemaSnapshot, force: bool) -> Result<DiffOutcome, SchemaError> {
        let diff = {
            let mut state = self.state();
            state.calls.push(if force { "diff?force" } else { "diff" }.into());
            state.diff.clone()
        };
        match diff {
            None => Ok(DiffOutcome::Identical),
            Some(value) => Ok(DiffOutcome::Changes(SchemaDiff::from_value(value)?)),
        }
    }

    async fn apply(&self, diff: &SchemaDiff) -> Result<(), SchemaError> {
        let mut state = self.state();
        state.calls.push("apply".into());
        if let Some(status) = state.apply_status {
            return Err(SchemaError::Apply {
                url: self.url("schema/apply"),
                status,
                excerpt: "Provided hash does not match".into(),
            });
        }
        state.applied.push(diff.payload().clone());
        Ok(())
    }
}

/// Connector handing out pre-built fakes by environment name.
#[derive(Default)]
pub struct FakeConnector {
    apis: BTreeMap<String, Arc<FakeSchemaApi>>,
    dbs: BTreeMap<String, Arc<FakeDatabase>>,
}

impl FakeConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn api(mut self, name: &str, api: Arc<FakeSchemaApi>) -> Self {
        self.apis.insert(name.to_string(), api);
        self
    }

    pub fn db(mut self, name: &str, db: Arc<FakeDatabase>) -> Self {
        self.dbs.insert(name.to_string(), db);
        self
    }
}

impl Connector for FakeConnector {
    fn schema_api(&self, env: &Environment) -> Result<Arc<dyn SchemaApi>, MigrationError> {
        self.apis
            .get(&env.name)
            .map(|api| Arc::clone(api) as Arc<dyn SchemaApi>)
            .ok_or_else(|| MigrationError::Connectivity {
                environment: env.name.clone(),
                detail: "no fake api".into(),
            })
    }

    fn database(&self, env: &Environment) -> Option<Arc<dyn Database>> {
        env.database.as_ref()?;
        self.dbs
            .get(&env.name)
            .map(|db| Arc::clone(db) as Arc<dyn Database>)
    }
}

/// Registry with `dev` and `stage`, each with or without a database.
pub fn registry(with_databases: bool) -> EnvironmentRegistry {
    let mut vars = vec![
        ("DEV_URL", "http://dev.test"),
        ("DEV_TOKEN", "dev-token"),
        ("STAGE_URL", "http://stage.test"),
        ("STAGE_TOKEN", "stage-token"),
    ];
    if with_databases {
        vars.extend([
            ("DEV_DB_CONTAINER", "pg-dev"),
            ("DEV_DB_USER", "cms"),
            ("DEV_DB_NAME", "cms"),
            ("STAGE_DB_CONTAINER", "pg-stage"),
            ("STAGE_DB_USER", "cms"),
            ("STAGE_DB_NAME", "cms"),
        ]);
    }
    EnvironmentRegistry::from_vars(vars)
}

/// Defaults with artifacts under `root` and no lock wait.
pub fn config(root: &Path) -> TransitConfig {
    let mut config = TransitConfig::default();
    config.artifacts.dir = root.to_path_buf();
    config.policy.lock_wait_secs = 0;
    config
}

/// Target database seeded with system rows plus the given content tables.
pub fn seeded_target(content: &[(&str, u64)]) -> Arc<FakeDatabase> {
    let mut tables = vec![("directus_users", 3), ("directus_settings", 1), ("directus_roles", 2)];
    tables.extend_from_slice(content);
    FakeDatabase::with_tables(&tables)
}
