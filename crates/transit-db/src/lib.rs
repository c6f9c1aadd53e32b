//! # transit-db
//!
//! PostgreSQL tooling for Transit: whole-database backups, content exports,
//! manifest discovery, table clears, trigger suspension, restores and
//! row counts.
//!
//! Everything runs through the stock client tools (`psql`, `pg_dump`,
//! `pg_restore`), either inside a container via `docker exec` or locally
//! against a host. The [`Database`] trait is the seam the engine depends on;
//! [`PgTooling`] is the live implementation.

pub mod exec;
pub mod manifest;
pub mod postgres;
pub mod restore_log;
pub mod sql;

mod error;

pub use error::DbError;
pub use postgres::PgTooling;
pub use restore_log::RestoreLog;

use std::path::Path;

use async_trait::async_trait;
use transit_core::TableSet;

/// One environment's database. Table names are unqualified; implementations
/// resolve them against their configured content schema.
#[async_trait]
pub trait Database: Send + Sync {
    /// Human-readable descriptor for logs (never includes the password).
    fn describe(&self) -> String;

    /// Content schema table names are resolved against.
    fn schema(&self) -> &str;

    async fn ping(&self) -> Result<(), DbError>;

    /// Full custom-format dump of the whole database to `dest`. Returns bytes written.
    async fn backup_full(&self, dest: &Path) -> Result<u64, DbError>;

    /// Data-only custom-format dump of the content schema, skipping every
    /// table matching `exclusions`. Returns bytes written.
    async fn export_data(&self, exclusions: &[String], dest: &Path) -> Result<u64, DbError>;

    /// Tables physically present in an export artifact, read from its manifest.
    async fn list_export_tables(&self, artifact: &Path) -> Result<TableSet, DbError>;

    async fn table_exists(&self, table: &str) -> Result<bool, DbError>;

    /// One `TRUNCATE ... RESTART IDENTITY` over all of `tables`, without
    /// cascade. Refused as a whole if any other table references one of them.
    async fn truncate_tables(&self, tables: &[String]) -> Result<(), DbError>;

    /// Delete every row of `table` with referential actions and foreign key
    /// checks suspended, so no other table is modified. Used when truncation
    /// is refused. Returns rows removed.
    async fn delete_all_rows(&self, table: &str) -> Result<u64, DbError>;

    async fn count_rows(&self, table: &str) -> Result<u64, DbError>;

    async fn columns(&self, table: &str) -> Result<Vec<String>, DbError>;

    async fn disable_triggers(&self, tables: &[String]) -> Result<(), DbError>;

    async fn enable_triggers(&self, tables: &[String]) -> Result<(), DbError>;

    /// Synchronous re-enable for `Drop` paths where no runtime can be awaited.
    fn enable_triggers_blocking(&self, tables: &[String]) -> Result<(), DbError>;

    /// Data-only restore of an export artifact. Row-level errors do not fail
    /// the call; they are classified in the returned [`RestoreLog`].
    async fn restore_data(&self, artifact: &Path) -> Result<RestoreLog, DbError>;

    /// Null `column` in `table` wherever it points at a missing row of
    /// `account_table`. Returns rows repaired.
    async fn null_dangling_references(
        &self,
        table: &str,
        column: &str,
        account_table: &str,
    ) -> Result<u64, DbError>;
}
