//! Database tooling error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors from database tooling commands.
#[derive(Debug, Error)]
pub enum DbError {
    /// The tool binary could not be started.
    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// A command did not finish within its timeout. The child is killed.
    #[error("{operation} timed out after {after_secs}s")]
    Timeout { operation: String, after_secs: u64 },

    /// A command exited unsuccessfully.
    #[error("{operation} failed (exit {code}): {stderr}")]
    CommandFailed {
        operation: String,
        code: i32,
        stderr: String,
    },

    /// Command output could not be interpreted.
    #[error("Unexpected output from {operation}: {output}")]
    UnexpectedOutput { operation: String, output: String },

    /// A dump artifact was written but is empty.
    #[error("Artifact {} is empty", .0.display())]
    EmptyArtifact(PathBuf),

    /// Local filesystem error while handling an artifact.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A table name from a manifest failed validation.
    #[error(transparent)]
    Core(#[from] transit_core::CoreError),
}
