//! Parser for `pg_restore --list` output.
//!
//! Table-data lines look like
//! `3427; 0 16412 TABLE DATA public articles cms`: dump id, tableoid, oid,
//! the entry kind, then schema, name, and owner. Archives written with
//! `--no-owner` omit the owner column.

use transit_core::TableSet;

use crate::error::DbError;

const TABLE_DATA: &str = "TABLE DATA";

/// One `TABLE DATA` entry from an archive manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    pub schema: String,
    pub table: String,
}

/// Extract every `TABLE DATA` entry. Comment lines (`;`) and other entry
/// kinds (sequences, large objects) are ignored.
#[must_use]
pub fn parse_entries(listing: &str) -> Vec<ManifestEntry> {
    listing
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with(';'))
        .filter_map(parse_line)
        .collect()
}

fn parse_line(line: &str) -> Option<ManifestEntry> {
    let (_, rest) = line.split_once(TABLE_DATA)?;
    let tokens: Vec<&str> = rest.split_whitespace().collect();
    match tokens.as_slice() {
        [schema, table] => Some(ManifestEntry {
            schema: (*schema).to_string(),
            table: (*table).to_string(),
        }),
        [schema, name @ .., _owner] if !name.is_empty() => Some(ManifestEntry {
            schema: (*schema).to_string(),
            table: name.join(" "),
        }),
        _ => None,
    }
}

/// Table names in `schema`, as a validated [`TableSet`].
///
/// # Errors
///
/// Returns [`DbError::Core`] if a manifest name is not a usable identifier.
pub fn table_set(listing: &str, schema: &str) -> Result<TableSet, DbError> {
    let mut set = TableSet::new();
    for entry in parse_entries(listing) {
        if entry.schema == schema {
            set.insert(entry.table)?;
        } else {
            tracing::debug!(schema = %entry.schema, table = %entry.table, "ignoring entry outside content schema");
        }
    }
    Ok(set)
}
