//! Environment registry.
//!
//! Resolves a logical environment name to its connection facts using a fixed
//! naming convention: the name is uppercased (`-` and `.` become `_`) and one
//! of the suffixes below is appended.
//!
//! | variable              | schema mode | full mode                 |
//! |-----------------------|-------------|---------------------------|
//! | `<NAME>_URL`          | required    | required                  |
//! | `<NAME>_TOKEN`        | required    | required                  |
//! | `<NAME>_DB_CONTAINER` | optional    | container or host required|
//! | `<NAME>_DB_HOST`      | optional    | container or host required|
//! | `<NAME>_DB_PORT`      | optional    | optional (5432)           |
//! | `<NAME>_DB_USER`      | optional    | required                  |
//! | `<NAME>_DB_NAME`      | optional    | required                  |
//! | `<NAME>_DB_PASSWORD`  | optional    | optional                  |
//!
//! The registry works on an explicit variable snapshot so nothing downstream
//! reads process-wide state.

use std::collections::{BTreeMap, BTreeSet};

use transit_core::environment::DEFAULT_DB_PORT;
use transit_core::{ApiEndpoint, DbConnection, DbTarget, Environment, MigrationMode};

use crate::error::ConfigError;
use crate::policy::SharedDatabasePolicy;

pub const SUFFIX_URL: &str = "_URL";
pub const SUFFIX_TOKEN: &str = "_TOKEN";
pub const SUFFIX_DB_CONTAINER: &str = "_DB_CONTAINER";
pub const SUFFIX_DB_HOST: &str = "_DB_HOST";
pub const SUFFIX_DB_PORT: &str = "_DB_PORT";
pub const SUFFIX_DB_USER: &str = "_DB_USER";
pub const SUFFIX_DB_NAME: &str = "_DB_NAME";
pub const SUFFIX_DB_PASSWORD: &str = "_DB_PASSWORD";

/// Snapshot of variables from which environments are resolved.
#[derive(Debug, Clone, Default)]
pub struct EnvironmentRegistry {
    vars: BTreeMap<String, String>,
}

impl EnvironmentRegistry {
    /// Build from explicit key/value pairs.
    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: vars
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Snapshot the current process environment. Only the CLI entry point
    /// should call this.
    #[must_use]
    pub fn from_process_env() -> Self {
        Self::from_vars(std::env::vars())
    }

    /// Variable prefix for an environment name (`edit-2` -> `EDIT_2`).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] for empty names or names with
    /// characters outside `[A-Za-z0-9_.-]`.
    pub fn prefix_for(name: &str) -> Result<String, ConfigError> {
        let valid = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
        if !valid {
            return Err(ConfigError::InvalidValue {
                field: "environment name".into(),
                reason: format!("'{name}' must be non-empty and use only letters, digits, '_', '-', '.'"),
            });
        }
        Ok(name
            .chars()
            .map(|c| match c {
                '-' | '.' => '_',
                other => other.to_ascii_uppercase(),
            })
            .collect())
    }

    /// Resolve `name` for the given mode.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] naming the first required variable
    /// that is unset or empty, or [`ConfigError::InvalidValue`] for a bad name
    /// or port.
    pub fn resolve(&self, name: &str, mode: MigrationMode) -> Result<Environment, ConfigError> {
        let prefix = Self::prefix_for(name)?;
        let required = |suffix: &str| self.required(name, &prefix, suffix);

        let base_url = required(SUFFIX_URL)?;
        let token = required(SUFFIX_TOKEN)?;
        let api = ApiEndpoint {
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        };

        let database = if mode.requires_database() {
            Some(self.database(name, &prefix)?)
        } else {
            match self.database(name, &prefix) {
                Ok(conn) => Some(conn),
                Err(ConfigError::MissingField { variable, .. }) => {
                    if self.has_database_vars(&prefix) {
                        tracing::warn!(
                            environment = name,
                            %variable,
                            "database variables are set but incomplete; ignoring them, so no database dump is taken and the backup is a schema snapshot"
                        );
                    } else {
                        tracing::debug!(environment = name, "no database configured; schema-only run without it");
                    }
                    None
                }
                Err(other) => return Err(other),
            }
        };

        Ok(Environment {
            name: name.to_string(),
            api,
            database,
        })
    }

    /// Validate a source/target pair before anything touches either side.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::SameEnvironment`] when both names resolve to one
    /// variable prefix, and [`ConfigError::SharedDatabase`] when they share a
    /// database and `policy` is [`SharedDatabasePolicy::Deny`].
    pub fn check_pair(
        source: &Environment,
        target: &Environment,
        policy: SharedDatabasePolicy,
    ) -> Result<(), ConfigError> {
        if Self::prefix_for(&source.name)? == Self::prefix_for(&target.name)? {
            return Err(ConfigError::SameEnvironment(target.name.clone()));
        }
        if source.shares_database_with(target) {
            let descriptor = target
                .database
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_default();
            match policy {
                SharedDatabasePolicy::Warn => {
                    tracing::warn!(
                        source = %source.name,
                        target = %target.name,
                        %descriptor,
                        "source and target share one physical database; content and schema changes affect both"
                    );
                }
                SharedDatabasePolicy::Deny => {
                    return Err(ConfigError::SharedDatabase {
                        source_env: source.name.clone(),
                        target_env: target.name.clone(),
                        descriptor,
                    });
                }
            }
        }
        Ok(())
    }

    /// Environment names discoverable from `<NAME>_URL` variables, lowercased.
    #[must_use]
    pub fn list(&self) -> Vec<String> {
        let names: BTreeSet<String> = self
            .vars
            .iter()
            .filter(|(_, value)| !value.trim().is_empty())
            .filter_map(|(key, _)| key.strip_suffix(SUFFIX_URL))
            .filter(|stem| !stem.is_empty() && !stem.ends_with("_DB") && !stem.starts_with("TRANSIT_"))
            .filter(|stem| self.get(&format!("{stem}{SUFFIX_TOKEN}")).is_some())
            .map(str::to_ascii_lowercase)
            .collect();
        names.into_iter().collect()
    }

    fn database(&self, name: &str, prefix: &str) -> Result<DbConnection, ConfigError> {
        let target = if let Some(container) = self.get(&format!("{prefix}{SUFFIX_DB_CONTAINER}")) {
            DbTarget::Container {
                name: container.to_string(),
            }
        } else if let Some(host) = self.get(&format!("{prefix}{SUFFIX_DB_HOST}")) {
            DbTarget::Host {
                host: host.to_string(),
                port: self.port(prefix)?,
            }
        } else {
            return Err(ConfigError::MissingField {
                environment: name.to_string(),
                variable: format!("{prefix}{SUFFIX_DB_CONTAINER} (or {prefix}{SUFFIX_DB_HOST})"),
            });
        };

        Ok(DbConnection {
            target,
            user: self.required(name, prefix, SUFFIX_DB_USER)?,
            database: self.required(name, prefix, SUFFIX_DB_NAME)?,
            password: self
                .get(&format!("{prefix}{SUFFIX_DB_PASSWORD}"))
                .map(ToString::to_string),
        })
    }

    fn has_database_vars(&self, prefix: &str) -> bool {
        [
            SUFFIX_DB_CONTAINER,
            SUFFIX_DB_HOST,
            SUFFIX_DB_PORT,
            SUFFIX_DB_USER,
            SUFFIX_DB_NAME,
            SUFFIX_DB_PASSWORD,
        ]
        .iter()
        .any(|suffix| self.get(&format!("{prefix}{suffix}")).is_some())
    }

    fn port(&self, prefix: &str) -> Result<u16, ConfigError> {
        let key = format!("{prefix}{SUFFIX_DB_PORT}");
        match self.get(&key) {
            None => Ok(DEFAULT_DB_PORT),
            Some(raw) => raw
                .parse::<u16>()
                .ok()
                .filter(|port| *port != 0)
                .ok_or_else(|| ConfigError::InvalidValue {
                    field: key,
                    reason: format!("'{raw}' is not a valid TCP port"),
                }),
        }
    }

    fn required(&self, name: &str, prefix: &str, suffix: &str) -> Result<String, ConfigError> {
        let key = format!("{prefix}{suffix}");
        self.get(&key)
            .map(ToString::to_string)
            .ok_or_else(|| ConfigError::MissingField {
                environment: name.to_string(),
                variable: key,
            })
    }

    /// Non-empty, trimmed value for `key`.
    fn get(&self, key: &str) -> Option<&str> {
        self.vars
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }
}
