//! SQL text builders. Every identifier is quoted; table names come from
//! export manifests and configuration, never from user SQL.

/// Double-quote an identifier, doubling embedded quotes.
#[must_use]
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Single-quote a string literal, doubling embedded quotes.
#[must_use]
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// `"schema"."table"`
#[must_use]
pub fn qualified(schema: &str, table: &str) -> String {
    format!("{}.{}", quote_ident(schema), quote_ident(table))
}

#[must_use]
pub fn table_exists(schema: &str, table: &str) -> String {
    format!(
        "SELECT to_regclass({}) IS NOT NULL",
        quote_literal(&qualified(schema, table))
    )
}

/// One `TRUNCATE` over every table, never `CASCADE`. Tables referencing
/// each other inside the list are emptied together; a reference from any
/// table outside it makes the whole statement fail.
#[must_use]
pub fn truncate(schema: &str, tables: &[String]) -> String {
    let targets = tables
        .iter()
        .map(|t| qualified(schema, t))
        .collect::<Vec<_>>()
        .join(", ");
    format!("TRUNCATE TABLE {targets} RESTART IDENTITY")
}

/// Delete every row and report how many went. Referential actions are
/// suspended for the statement's transaction, so `ON DELETE CASCADE` and
/// `SET NULL` never reach other tables and no foreign key check fires.
#[must_use]
pub fn delete_all(schema: &str, table: &str) -> String {
    format!(
        "SET LOCAL session_replication_role = replica; \
         WITH removed AS (DELETE FROM {} RETURNING 1) SELECT count(*) FROM removed",
        qualified(schema, table)
    )
}

#[must_use]
pub fn count_rows(schema: &str, table: &str) -> String {
    format!("SELECT count(*) FROM {}", qualified(schema, table))
}

#[must_use]
pub fn columns(schema: &str, table: &str) -> String {
    format!(
        "SELECT column_name FROM information_schema.columns \
         WHERE table_schema = {} AND table_name = {} ORDER BY ordinal_position",
        quote_literal(schema),
        quote_literal(table)
    )
}

/// One statement per table toggling all triggers, including the internal
/// ones that enforce foreign keys.
#[must_use]
pub fn set_triggers(schema: &str, tables: &[String], enabled: bool) -> String {
    let verb = if enabled { "ENABLE" } else { "DISABLE" };
    tables
        .iter()
        .map(|t| format!("ALTER TABLE {} {verb} TRIGGER ALL;", qualified(schema, t)))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Null out `column` wherever it references an account that does not exist.
#[must_use]
pub fn null_dangling(schema: &str, table: &str, column: &str, account_table: &str) -> String {
    let col = quote_ident(column);
    format!(
        "WITH repaired AS (UPDATE {target} AS t SET {col} = NULL \
         WHERE t.{col} IS NOT NULL AND NOT EXISTS \
         (SELECT 1 FROM {accounts} a WHERE a.\"id\" = t.{col}) RETURNING 1) \
         SELECT count(*) FROM repaired",
        target = qualified(schema, table),
        accounts = qualified(schema, account_table),
    )
}
