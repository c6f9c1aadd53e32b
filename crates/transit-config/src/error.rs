//! Configuration error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    /// Figment extraction or merge error.
    #[error("Configuration error: {0}")]
    Figment(#[from] figment::Error),

    /// A variable required by the selected mode is unset or empty.
    #[error("Environment '{environment}' is missing required variable {variable}")]
    MissingField {
        environment: String,
        variable: String,
    },

    /// A configuration field has an invalid value.
    #[error("Invalid configuration value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    /// Source and target resolve to the same logical environment.
    #[error("Source and target are the same environment '{0}'")]
    SameEnvironment(String),

    /// Source and target share one physical database and policy forbids it.
    #[error(
        "Environments '{source_env}' and '{target_env}' share database {descriptor}; \
         refused by policy.shared_database = \"deny\""
    )]
    SharedDatabase {
        source_env: String,
        target_env: String,
        descriptor: String,
    },
}
