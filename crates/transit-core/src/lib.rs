//! # transit-core
//!
//! Core types and error types for Transit.
//!
//! This crate provides the foundational types shared across all Transit crates:
//! - Environment connection facts (API endpoint, database descriptor)
//! - Migration mode and run-state enums with state machine transitions
//! - The declarative system-table catalog
//! - `TableSet`, the set of tables discovered in a content export
//! - Timestamped artifact layout
//! - Cross-cutting error types

pub mod artifacts;
pub mod catalog;
pub mod enums;
pub mod environment;
pub mod errors;
pub mod table_set;

pub use artifacts::ArtifactLayout;
pub use catalog::SystemCatalog;
pub use enums::{MigrationMode, RunState};
pub use environment::{ApiEndpoint, DbConnection, DbTarget, Environment};
pub use errors::CoreError;
pub use table_set::TableSet;
