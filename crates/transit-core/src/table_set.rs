//! The set of tables physically present in a content export.
//!
//! A `TableSet` is always discovered from the export artifact's own manifest,
//! never derived from the exclusion list. It is the only input that decides
//! which target tables get cleared.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::catalog::SystemCatalog;
use crate::errors::CoreError;

/// PostgreSQL truncates identifiers beyond this length.
const MAX_IDENTIFIER_LEN: usize = 63;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TableSet {
    tables: BTreeSet<String>,
}

impl TableSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from raw names, validating each one.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidTableName`] for empty, oversized, or
    /// control-character names.
    pub fn from_names<I, S>(names: I) -> Result<Self, CoreError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut set = Self::new();
        for name in names {
            set.insert(name)?;
        }
        Ok(set)
    }

    /// Add a table name. Duplicates are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidTableName`] if the name is not a usable identifier.
    pub fn insert(&mut self, name: impl Into<String>) -> Result<bool, CoreError> {
        let name = name.into();
        validate_name(&name)?;
        Ok(self.tables.insert(name))
    }

    #[must_use]
    pub fn contains(&self, table: &str) -> bool {
        self.tables.contains(table)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.tables.iter().map(String::as_str)
    }

    /// Members that the system catalog protects. Non-empty means the export
    /// is contaminated.
    #[must_use]
    pub fn system_tables(&self) -> Vec<&str> {
        self.iter()
            .filter(|t| SystemCatalog::is_system_table(t))
            .collect()
    }
}

impl<'a> IntoIterator for &'a TableSet {
    type Item = &'a String;
    type IntoIter = std::collections::btree_set::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.tables.iter()
    }
}

fn validate_name(name: &str) -> Result<(), CoreError> {
    if name.is_empty()
        || name.len() > MAX_IDENTIFIER_LEN
        || name.chars().any(char::is_control)
        || name.trim() != name
    {
        return Err(CoreError::InvalidTableName(name.to_string()));
    }
    Ok(())
}
