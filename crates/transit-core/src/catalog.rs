//! Declarative catalog of system tables.
//!
//! System tables hold environment-specific operational state and must survive
//! every migration unchanged. This catalog is the single source consumed by the
//! export exclusion list, the clear guard, the ownership repair guard, and the
//! run summary.

use serde::Serialize;

/// Prefix shared by every platform-owned table.
pub const SYSTEM_PREFIX: &str = "directus_";

/// Why a table is environment-specific.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemCategory {
    Accounts,
    Sessions,
    Settings,
    Automation,
    AccessControl,
    History,
    Files,
    Collaboration,
    Insights,
    Platform,
    Structure,
}

/// One catalog row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CatalogEntry {
    pub table: &'static str,
    pub category: SystemCategory,
}

const fn entry(table: &'static str, category: SystemCategory) -> CatalogEntry {
    CatalogEntry { table, category }
}

static ENTRIES: &[CatalogEntry] = &[
    entry("directus_users", SystemCategory::Accounts),
    entry("directus_sessions", SystemCategory::Sessions),
    entry("directus_settings", SystemCategory::Settings),
    entry("directus_webhooks", SystemCategory::Automation),
    entry("directus_flows", SystemCategory::Automation),
    entry("directus_operations", SystemCategory::Automation),
    entry("directus_permissions", SystemCategory::AccessControl),
    entry("directus_roles", SystemCategory::AccessControl),
    entry("directus_access", SystemCategory::AccessControl),
    entry("directus_policies", SystemCategory::AccessControl),
    entry("directus_revisions", SystemCategory::History),
    entry("directus_activity", SystemCategory::History),
    entry("directus_versions", SystemCategory::History),
    entry("directus_files", SystemCategory::Files),
    entry("directus_folders", SystemCategory::Files),
    entry("directus_translations", SystemCategory::Collaboration),
    entry("directus_comments", SystemCategory::Collaboration),
    entry("directus_shares", SystemCategory::Collaboration),
    entry("directus_notifications", SystemCategory::Collaboration),
    entry("directus_presets", SystemCategory::Collaboration),
    entry("directus_dashboards", SystemCategory::Insights),
    entry("directus_panels", SystemCategory::Insights),
    entry("directus_migrations", SystemCategory::Platform),
    entry("directus_extensions", SystemCategory::Platform),
    entry("directus_collections", SystemCategory::Structure),
    entry("directus_fields", SystemCategory::Structure),
    entry("directus_relations", SystemCategory::Structure),
];

/// Read-only view over the system-table catalog.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCatalog;

impl SystemCatalog {
    /// Every catalogued table.
    #[must_use]
    pub fn entries() -> &'static [CatalogEntry] {
        ENTRIES
    }

    /// Table names only, in catalog order.
    pub fn tables() -> impl Iterator<Item = &'static str> {
        ENTRIES.iter().map(|e| e.table)
    }

    /// The account table ownership references point at.
    #[must_use]
    pub fn account_table() -> &'static str {
        Self::first_of(SystemCategory::Accounts)
    }

    /// The settings table checked after a migration.
    #[must_use]
    pub fn settings_table() -> &'static str {
        Self::first_of(SystemCategory::Settings)
    }

    fn first_of(category: SystemCategory) -> &'static str {
        ENTRIES
            .iter()
            .find(|e| e.category == category)
            .map_or("", |e| e.table)
    }

    /// Whether a table must never be cleared or overwritten.
    ///
    /// Catalogued tables and anything under the system prefix both count, so a
    /// platform upgrade that adds a new system table is still protected.
    #[must_use]
    pub fn is_system_table(table: &str) -> bool {
        let bare = unqualified(table);
        bare.starts_with(SYSTEM_PREFIX) || ENTRIES.iter().any(|e| e.table == bare)
    }

    /// Patterns handed to the dump tool's table-exclusion flags.
    ///
    /// Each catalogued table is listed explicitly, followed by the prefix
    /// wildcard.
    #[must_use]
    pub fn export_exclusions(schema: &str) -> Vec<String> {
        let mut patterns: Vec<String> = ENTRIES
            .iter()
            .map(|e| format!("{schema}.{}", e.table))
            .collect();
        patterns.push(format!("{schema}.{SYSTEM_PREFIX}*"));
        patterns
    }

    /// Whether the exclusion patterns for `schema` would keep `table` out of
    /// an export. Mirrors the dump tool's `*` wildcard semantics.
    #[must_use]
    pub fn excluded_from_export(schema: &str, table: &str) -> bool {
        let qualified = format!("{schema}.{}", unqualified(table));
        Self::export_exclusions(schema)
            .iter()
            .any(|pattern| wildcard_match(pattern, &qualified))
    }
}

/// Strip an optional `schema.` qualifier.
fn unqualified(table: &str) -> &str {
    table.rsplit_once('.').map_or(table, |(_, name)| name)
}

fn wildcard_match(pattern: &str, candidate: &str) -> bool {
    match pattern.split_once('*') {
        None => pattern == candidate,
        Some((head, tail)) => {
            candidate.len() >= head.len() + tail.len()
                && candidate.starts_with(head)
                && candidate.ends_with(tail)
        }
    }
}
