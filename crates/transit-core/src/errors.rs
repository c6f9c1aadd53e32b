//! Cross-cutting error types for Transit.
//!
//! Domain-specific errors (`ConfigError`, `SchemaError`, `DbError`) are defined
//! in their respective crates. The unified `MigrationError` lives in
//! `transit-engine` where all crate errors converge.

use thiserror::Error;

/// Errors that can be raised by any Transit crate.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A run-state transition was attempted that is not allowed.
    #[error("Invalid state transition for run {run_id}: {from} -> {to}")]
    InvalidTransition {
        run_id: String,
        from: String,
        to: String,
    },

    /// A table name failed validation.
    #[error("Invalid table name '{0}'")]
    InvalidTableName(String),

    /// Data failed validation.
    #[error("Validation error: {0}")]
    Validation(String),
}
