//! # transit-schema
//!
//! Structural snapshot, diff, and apply transport for Transit.
//!
//! The protocol is always snapshot (source) → diff (target) → apply (target).
//! A raw snapshot is never pushed at a target: diffing against the target's
//! live structure keeps target-only fields from being dropped silently and
//! makes re-applying a no-op.

pub mod client;
pub mod diff;
pub mod http;
pub mod snapshot;

mod error;

pub use client::{ClientTimeouts, HttpSchemaApi};
pub use diff::{ChangeKind, ChangeOperation, DiffOutcome, DiffSection, SchemaDiff};
pub use error::SchemaError;
pub use snapshot::SchemaSnapshot;

use async_trait::async_trait;

/// The structural API of one environment.
#[async_trait]
pub trait SchemaApi: Send + Sync {
    /// Logical environment name, for logs and errors.
    fn environment(&self) -> &str;

    /// Unauthenticated liveness probe.
    async fn health(&self) -> Result<(), SchemaError>;

    /// Read-only call proving the credential has structural access.
    /// Permission problems surface as [`SchemaError::PermissionDenied`].
    async fn probe_structural_access(&self) -> Result<(), SchemaError>;

    /// Capture an unwrapped structural snapshot.
    async fn snapshot(&self) -> Result<SchemaSnapshot, SchemaError>;

    /// Diff `snapshot` against this environment's live structure.
    async fn diff(&self, snapshot: &SchemaSnapshot, force: bool)
    -> Result<DiffOutcome, SchemaError>;

    /// Apply a diff previously computed by this environment.
    async fn apply(&self, diff: &SchemaDiff) -> Result<(), SchemaError>;
}
