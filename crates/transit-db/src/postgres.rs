//! Live [`Database`] implementation driving the PostgreSQL client tools.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use transit_config::DatabaseConfig;
use transit_core::{DbConnection, TableSet};

use crate::error::DbError;
use crate::exec::{self, CommandSpec, Executor};
use crate::restore_log::RestoreLog;
use crate::{Database, manifest, sql};

/// `psql`/`pg_dump`/`pg_restore` against one connection.
#[derive(Debug, Clone)]
pub struct PgTooling {
    executor: Executor,
    schema: String,
    staging_dir: String,
    command_timeout: Duration,
    probe_timeout: Duration,
}

impl PgTooling {
    #[must_use]
    pub fn new(connection: DbConnection, config: &DatabaseConfig) -> Self {
        Self {
            executor: Executor::new(connection, config.docker_bin.clone()),
            schema: config.schema.clone(),
            staging_dir: config.staging_dir.clone(),
            command_timeout: config.command_timeout(),
            probe_timeout: config.probe_timeout(),
        }
    }

    fn connection(&self) -> &DbConnection {
        self.executor.connection()
    }

    fn login_args(&self) -> Vec<String> {
        vec![
            "-U".into(),
            self.connection().user.clone(),
            "-d".into(),
            self.connection().database.clone(),
        ]
    }

    /// `pg_dump` invocation for a whole-database backup.
    #[must_use]
    pub fn backup_command(&self) -> CommandSpec {
        let mut args = vec!["--format=custom".to_string()];
        args.extend(self.login_args());
        self.executor.tool("pg_dump", &args)
    }

    /// `pg_dump` invocation for a content export.
    #[must_use]
    pub fn export_command(&self, exclusions: &[String]) -> CommandSpec {
        let mut args = vec![
            "--format=custom".to_string(),
            "--data-only".to_string(),
            format!("--schema={}", self.schema),
        ];
        args.extend(exclusions.iter().map(|p| format!("--exclude-table={p}")));
        args.extend(self.login_args());
        self.executor.tool("pg_dump", &args)
    }

    /// `pg_restore` invocation for a staged data-only artifact.
    #[must_use]
    pub fn restore_command(&self, staged: &str) -> CommandSpec {
        let mut args = vec![
            "--data-only".to_string(),
            "--disable-triggers".to_string(),
            "--no-owner".to_string(),
            "--no-privileges".to_string(),
        ];
        args.extend(self.login_args());
        args.push(staged.to_string());
        self.executor.tool("pg_restore", &args)
    }

    async fn query(&self, operation: &str, statement: &str, limit: Duration) -> Result<String, DbError> {
        let output = exec::run(&self.executor.psql(statement), operation, limit).await?;
        exec::ensure_success(&output, operation)?;
        Ok(output.stdout.trim().to_string())
    }

    async fn scalar_u64(&self, operation: &str, statement: &str, limit: Duration) -> Result<u64, DbError> {
        let out = self.query(operation, statement, limit).await?;
        out.lines()
            .last()
            .and_then(|line| line.trim().parse().ok())
            .ok_or_else(|| DbError::UnexpectedOutput {
                operation: operation.to_string(),
                output: out.clone(),
            })
    }
}

#[async_trait]
impl Database for PgTooling {
    fn describe(&self) -> String {
        self.connection().to_string()
    }

    fn schema(&self) -> &str {
        &self.schema
    }

    async fn ping(&self) -> Result<(), DbError> {
        let out = self.query("ping", "SELECT 1", self.probe_timeout).await?;
        if out == "1" {
            tracing::debug!(database = %self.describe(), "database reachable");
            Ok(())
        } else {
            Err(DbError::UnexpectedOutput {
                operation: "ping".into(),
                output: out,
            })
        }
    }

    async fn backup_full(&self, dest: &Path) -> Result<u64, DbError> {
        let bytes = exec::run_to_file(&self.backup_command(), "backup", dest, self.command_timeout).await?;
        tracing::info!(database = %self.describe(), path = %dest.display(), bytes, "database backup written");
        Ok(bytes)
    }

    async fn export_data(&self, exclusions: &[String], dest: &Path) -> Result<u64, DbError> {
        let bytes = exec::run_to_file(
            &self.export_command(exclusions),
            "content export",
            dest,
            self.command_timeout,
        )
        .await?;
        tracing::info!(database = %self.describe(), path = %dest.display(), bytes, "content export written");
        Ok(bytes)
    }

    async fn list_export_tables(&self, artifact: &Path) -> Result<TableSet, DbError> {
        let staged = self
            .executor
            .stage(artifact, &self.staging_dir, self.probe_timeout)
            .await?;
        let spec = self
            .executor
            .tool("pg_restore", &["--list".to_string(), staged.clone()]);
        let result = exec::run(&spec, "list export", self.probe_timeout).await;
        self.executor.unstage(&staged, self.probe_timeout).await;

        let output = result?;
        exec::ensure_success(&output, "list export")?;
        manifest::table_set(&output.stdout, &self.schema)
    }

    async fn table_exists(&self, table: &str) -> Result<bool, DbError> {
        let out = self
            .query("existence check", &sql::table_exists(&self.schema, table), self.probe_timeout)
            .await?;
        match out.as_str() {
            "t" => Ok(true),
            "f" => Ok(false),
            _ => Err(DbError::UnexpectedOutput {
                operation: "existence check".into(),
                output: out,
            }),
        }
    }

    async fn truncate_tables(&self, tables: &[String]) -> Result<(), DbError> {
        self.query("truncate", &sql::truncate(&self.schema, tables), self.command_timeout)
            .await
            .map(|_| ())
    }

    async fn delete_all_rows(&self, table: &str) -> Result<u64, DbError> {
        self.scalar_u64("delete", &sql::delete_all(&self.schema, table), self.command_timeout)
            .await
    }

    async fn count_rows(&self, table: &str) -> Result<u64, DbError> {
        self.scalar_u64("count", &sql::count_rows(&self.schema, table), self.probe_timeout)
            .await
    }

    async fn columns(&self, table: &str) -> Result<Vec<String>, DbError> {
        let out = self
            .query("column lookup", &sql::columns(&self.schema, table), self.probe_timeout)
            .await?;
        Ok(out
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect())
    }

    async fn disable_triggers(&self, tables: &[String]) -> Result<(), DbError> {
        if tables.is_empty() {
            return Ok(());
        }
        self.query(
            "disable triggers",
            &sql::set_triggers(&self.schema, tables, false),
            self.command_timeout,
        )
        .await
        .map(|_| ())
    }

    async fn enable_triggers(&self, tables: &[String]) -> Result<(), DbError> {
        if tables.is_empty() {
            return Ok(());
        }
        self.query(
            "enable triggers",
            &sql::set_triggers(&self.schema, tables, true),
            self.command_timeout,
        )
        .await
        .map(|_| ())
    }

    fn enable_triggers_blocking(&self, tables: &[String]) -> Result<(), DbError> {
        if tables.is_empty() {
            return Ok(());
        }
        let spec = self.executor.psql(&sql::set_triggers(&self.schema, tables, true));
        exec::run_blocking(&spec, "enable triggers").map(|_| ())
    }

    async fn restore_data(&self, artifact: &Path) -> Result<RestoreLog, DbError> {
        let staged = self
            .executor
            .stage(artifact, &self.staging_dir, self.command_timeout)
            .await?;
        let result = exec::run(&self.restore_command(&staged), "restore", self.command_timeout).await;
        self.executor.unstage(&staged, self.probe_timeout).await;

        let output = result?;
        let log = RestoreLog::parse(&output.stderr, output.code);
        // A failing exit with nothing classifiable means the restore never ran.
        if !output.success() && log.is_clean() {
            exec::ensure_success(&output, "restore")?;
        }
        tracing::info!(
            database = %self.describe(),
            errors = log.total_errors,
            duplicate_keys = log.duplicate_key_errors,
            "restore finished"
        );
        Ok(log)
    }

    async fn null_dangling_references(
        &self,
        table: &str,
        column: &str,
        account_table: &str,
    ) -> Result<u64, DbError> {
        self.scalar_u64(
            "ownership repair",
            &sql::null_dangling(&self.schema, table, column, account_table),
            self.command_timeout,
        )
        .await
    }
}
