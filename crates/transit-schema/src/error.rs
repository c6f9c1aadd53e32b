//! Schema transport error types.

use thiserror::Error;

/// Errors raised while talking to an environment's structural API.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// The API could not be reached at all.
    #[error("{url} unreachable: {message}")]
    Unreachable { url: String, message: String },

    /// The health endpoint answered but reported the instance unhealthy.
    #[error("{url} reported unhealthy (HTTP {status})")]
    Unhealthy { url: String, status: u16 },

    /// The request did not complete within the configured timeout.
    #[error("{url} timed out after {after_secs}s")]
    Timeout { url: String, after_secs: u64 },

    /// The credential lacks structural access.
    #[error("{url} denied access (HTTP {status}); the token needs admin access to schema endpoints")]
    PermissionDenied { url: String, status: u16 },

    /// Non-success status from a read endpoint.
    #[error("{url} returned HTTP {status}: {excerpt}")]
    Api {
        url: String,
        status: u16,
        excerpt: String,
    },

    /// The snapshot response failed the shape check.
    #[error("malformed schema snapshot: {0}")]
    MalformedSnapshot(String),

    /// A snapshot still wrapped in a transport envelope was about to be
    /// submitted to the diff endpoint.
    #[error("refusing to submit a wrapped snapshot to the diff endpoint")]
    WrappedSnapshot,

    /// The diff response could not be interpreted.
    #[error("malformed schema diff: {0}")]
    MalformedDiff(String),

    /// The target rejected the diff.
    #[error("schema apply rejected by {url} (HTTP {status}): {excerpt}")]
    Apply {
        url: String,
        status: u16,
        excerpt: String,
    },

    /// Any other HTTP client failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}
