//! Scoped suspension of foreign-key enforcement during a data restore.
//!
//! Triggers are re-enabled on every exit path: [`ForeignKeySuspension::release`]
//! on normal completion, and a blocking re-enable from `Drop` when the owning
//! future is cancelled, panics, or the async release itself failed.

use std::sync::Arc;

use transit_db::{Database, DbError};

#[must_use = "dropping the guard immediately re-enables triggers"]
pub struct ForeignKeySuspension {
    db: Arc<dyn Database>,
    tables: Vec<String>,
    armed: bool,
}

impl ForeignKeySuspension {
    /// Disable all triggers on `tables`.
    ///
    /// # Errors
    ///
    /// Returns the tooling error if triggers could not be disabled; nothing
    /// is left suspended in that case.
    pub async fn suspend(db: Arc<dyn Database>, tables: Vec<String>) -> Result<Self, DbError> {
        db.disable_triggers(&tables).await?;
        tracing::debug!(tables = tables.len(), database = %db.describe(), "triggers disabled");
        Ok(Self {
            db,
            tables,
            armed: true,
        })
    }

    #[must_use]
    pub fn tables(&self) -> &[String] {
        &self.tables
    }

    /// Re-enable triggers. On failure the guard stays armed and `Drop`
    /// retries synchronously.
    ///
    /// # Errors
    ///
    /// Returns the tooling error from the async re-enable.
    pub async fn release(mut self) -> Result<(), DbError> {
        self.db.enable_triggers(&self.tables).await?;
        self.armed = false;
        tracing::debug!(tables = self.tables.len(), "triggers re-enabled");
        Ok(())
    }
}

impl Drop for ForeignKeySuspension {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        tracing::warn!(
            tables = self.tables.len(),
            database = %self.db.describe(),
            "re-enabling triggers after interrupted import"
        );
        if let Err(error) = self.db.enable_triggers_blocking(&self.tables) {
            tracing::error!(
                %error,
                tables = ?self.tables,
                "could not re-enable triggers; run ALTER TABLE ... ENABLE TRIGGER ALL manually"
            );
        }
    }
}
