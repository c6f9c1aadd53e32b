//! # transit-engine
//!
//! The migration engine: orchestrator, data transplant, and safety envelope.
//!
//! A run resolves both environments, locks the target, probes both sides,
//! backs the target up, syncs schema through diff/apply, optionally
//! transplants content data, and verifies the target afterwards. Every
//! collaborator is reached through a trait ([`transit_schema::SchemaApi`],
//! [`transit_db::Database`]) produced by a [`Connector`], so the whole
//! sequence runs against in-memory fakes in tests.

pub mod backup;
pub mod connector;
pub mod error;
pub mod fk_guard;
pub mod lock;
pub mod orchestrator;
pub mod report;
pub mod run;
pub mod safety;
pub mod transplant;

#[cfg(test)]
pub(crate) mod test_support;

pub use backup::{Backup, BackupKind, restore_instructions};
pub use connector::{Connector, Endpoints, LiveConnector};
pub use error::{MigrationError, TransplantError};
pub use orchestrator::{BackupSlot, NoopObserver, Orchestrator, RunObserver};
pub use report::{RunFailure, RunReport, SchemaSync};
pub use run::{MigrationRun, StateChange};
pub use safety::{PostflightReport, PreflightReport};
pub use transplant::{ImportOutcome, TransplantResult};
