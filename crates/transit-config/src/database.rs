//! Database tooling configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use transit_core::SystemCatalog;

const fn default_command_timeout_secs() -> u64 {
    1800
}

const fn default_probe_timeout_secs() -> u64 {
    15
}

fn default_docker_bin() -> String {
    String::from("docker")
}

fn default_schema() -> String {
    String::from("public")
}

fn default_account_table() -> String {
    SystemCatalog::account_table().to_string()
}

fn default_settings_table() -> String {
    SystemCatalog::settings_table().to_string()
}

fn default_ownership_columns() -> Vec<String> {
    vec![String::from("user_created"), String::from("user_updated")]
}

fn default_staging_dir() -> String {
    String::from("/tmp")
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Upper bound for dump/restore/clear commands, in seconds.
    #[serde(default = "default_command_timeout_secs")]
    pub command_timeout_secs: u64,

    /// Upper bound for connectivity probes and count queries, in seconds.
    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,

    /// Container runtime binary used for `exec` and `cp`.
    #[serde(default = "default_docker_bin")]
    pub docker_bin: String,

    /// Schema holding content tables.
    #[serde(default = "default_schema")]
    pub schema: String,

    /// Table holding accounts; ownership references point here.
    #[serde(default = "default_account_table")]
    pub account_table: String,

    /// Table holding instance settings.
    #[serde(default = "default_settings_table")]
    pub settings_table: String,

    /// Creator/updater reference columns repaired after import.
    #[serde(default = "default_ownership_columns")]
    pub ownership_columns: Vec<String>,

    /// Directory inside a container where export artifacts are staged.
    #[serde(default = "default_staging_dir")]
    pub staging_dir: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            command_timeout_secs: default_command_timeout_secs(),
            probe_timeout_secs: default_probe_timeout_secs(),
            docker_bin: default_docker_bin(),
            schema: default_schema(),
            account_table: default_account_table(),
            settings_table: default_settings_table(),
            ownership_columns: default_ownership_columns(),
            staging_dir: default_staging_dir(),
        }
    }
}

impl DatabaseConfig {
    #[must_use]
    pub const fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    #[must_use]
    pub const fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }
}
