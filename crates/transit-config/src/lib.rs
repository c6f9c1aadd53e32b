//! # transit-config
//!
//! Layered configuration loading and the environment registry for Transit.
//!
//! Configuration sources for [`TransitConfig`] (in priority order, highest wins):
//! 1. Environment variables (`TRANSIT_*` prefix, `__` as separator)
//! 2. Project-level `.transit/config.toml`
//! 3. User-level `~/.config/transit/config.toml`
//! 4. Built-in defaults
//!
//! Figment maps `TRANSIT_HTTP__CONNECT_TIMEOUT_SECS` -> `http.connect_timeout_secs`,
//! `TRANSIT_POLICY__SHARED_DATABASE` -> `policy.shared_database`, etc.
//!
//! Environment connection facts (`DEV_URL`, `PROD_DB_CONTAINER`, ...) are not
//! part of this struct. They are resolved by [`EnvironmentRegistry`] from an
//! explicit variable snapshot.
//!
//! # Usage
//!
//! ```no_run
//! use transit_config::{EnvironmentRegistry, TransitConfig};
//! use transit_core::MigrationMode;
//!
//! let config = TransitConfig::load_with_dotenv().expect("config");
//! let registry = EnvironmentRegistry::from_process_env();
//! let dev = registry.resolve("dev", MigrationMode::SchemaOnly).expect("dev");
//! println!("{} -> {}", dev.name, dev.api.base_url);
//! ```

mod artifacts;
mod database;
mod error;
mod http;
mod policy;
pub mod registry;

pub use artifacts::ArtifactsConfig;
pub use database::DatabaseConfig;
pub use error::ConfigError;
pub use http::HttpConfig;
pub use policy::{PolicyConfig, SharedDatabasePolicy};
pub use registry::EnvironmentRegistry;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TransitConfig {
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub artifacts: ArtifactsConfig,
    #[serde(default)]
    pub policy: PolicyConfig,
}

impl TransitConfig {
    /// Load configuration from all sources (TOML files + environment variables).
    ///
    /// Does NOT call `dotenvy` -- use [`Self::load_with_dotenv`] if you need `.env` file loading.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Figment`] if a source fails to parse or a value
    /// has the wrong type.
    pub fn load() -> Result<Self, ConfigError> {
        Self::figment().extract::<Self>()?.validated()
    }

    /// Load configuration with `.env` file support.
    ///
    /// Loads `.env` from the current directory (if present) before building
    /// the figment. This is the typical entry point for the CLI.
    ///
    /// # Errors
    ///
    /// Same as [`Self::load`].
    pub fn load_with_dotenv() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::load()
    }

    /// Load configuration with an explicit project TOML file instead of the
    /// default `.transit/config.toml`.
    ///
    /// # Errors
    ///
    /// Same as [`Self::load`].
    pub fn load_from(project_config: &Path) -> Result<Self, ConfigError> {
        Self::figment_with(Some(project_config))
            .extract::<Self>()?
            .validated()
    }

    /// Build the figment provider chain.
    ///
    /// Public so tests can inspect the figment directly or add providers on top.
    #[must_use]
    pub fn figment() -> Figment {
        Self::figment_with(None)
    }

    fn figment_with(project_config: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        // Layer 1: User-global config
        if let Some(global_path) = Self::global_config_path()
            && global_path.exists()
        {
            figment = figment.merge(Toml::file(global_path));
        }

        // Layer 2: Project-local config
        let local_path =
            project_config.map_or_else(|| PathBuf::from(".transit/config.toml"), Path::to_path_buf);
        if local_path.exists() {
            figment = figment.merge(Toml::file(local_path));
        }

        // Layer 3: Environment variables (highest priority)
        figment.merge(Env::prefixed("TRANSIT_").split("__"))
    }

    /// Path to the user-global config file.
    fn global_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("transit").join("config.toml"))
    }

    fn validated(self) -> Result<Self, ConfigError> {
        if self.http.request_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "http.request_timeout_secs".into(),
                reason: "must be greater than zero".into(),
            });
        }
        if self.database.command_timeout_secs == 0 || self.database.probe_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "database.*_timeout_secs".into(),
                reason: "must be greater than zero".into(),
            });
        }
        if self.database.schema.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "database.schema".into(),
                reason: "must not be empty".into(),
            });
        }
        Ok(self)
    }
}
