//! Builds the collaborators a run talks to.

use std::sync::Arc;

use transit_config::{DatabaseConfig, HttpConfig, TransitConfig};
use transit_core::Environment;
use transit_db::{Database, PgTooling};
use transit_schema::{ClientTimeouts, HttpSchemaApi, SchemaApi};

use crate::error::MigrationError;

/// Produces the structural API and database handles for an environment.
pub trait Connector: Send + Sync {
    /// Structural API client for `env`.
    ///
    /// # Errors
    ///
    /// Returns [`MigrationError`] if the client cannot be constructed.
    fn schema_api(&self, env: &Environment) -> Result<Arc<dyn SchemaApi>, MigrationError>;

    /// Database handle for `env`, or `None` when no descriptor is configured.
    fn database(&self, env: &Environment) -> Option<Arc<dyn Database>>;
}

/// Connector for real instances: reqwest client plus PostgreSQL tooling.
#[derive(Debug, Clone)]
pub struct LiveConnector {
    http: HttpConfig,
    database: DatabaseConfig,
}

impl LiveConnector {
    #[must_use]
    pub fn new(config: &TransitConfig) -> Self {
        Self {
            http: config.http.clone(),
            database: config.database.clone(),
        }
    }
}

impl Connector for LiveConnector {
    fn schema_api(&self, env: &Environment) -> Result<Arc<dyn SchemaApi>, MigrationError> {
        let client = HttpSchemaApi::new(
            env.name.clone(),
            env.api.clone(),
            ClientTimeouts {
                connect: self.http.connect_timeout(),
                request: self.http.request_timeout(),
            },
        )
        .map_err(|e| MigrationError::from_schema(&env.name, e))?;
        Ok(Arc::new(client))
    }

    fn database(&self, env: &Environment) -> Option<Arc<dyn Database>> {
        env.database
            .clone()
            .map(|conn| Arc::new(PgTooling::new(conn, &self.database)) as Arc<dyn Database>)
    }
}

/// Both sides of a run, resolved once.
#[derive(Clone)]
pub struct Endpoints {
    pub source_api: Arc<dyn SchemaApi>,
    pub target_api: Arc<dyn SchemaApi>,
    pub source_db: Option<Arc<dyn Database>>,
    pub target_db: Option<Arc<dyn Database>>,
}

impl Endpoints {
    /// Connect both environments through `connector`.
    ///
    /// # Errors
    ///
    /// Propagates client construction failures.
    pub fn connect(
        connector: &dyn Connector,
        source: &Environment,
        target: &Environment,
    ) -> Result<Self, MigrationError> {
        Ok(Self {
            source_api: connector.schema_api(source)?,
            target_api: connector.schema_api(target)?,
            source_db: connector.database(source),
            target_db: connector.database(target),
        })
    }
}
