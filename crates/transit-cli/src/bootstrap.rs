use anyhow::Context;
use transit_config::{EnvironmentRegistry, TransitConfig};

use crate::cli::GlobalFlags;

/// Resources every environment-facing command needs.
pub struct AppContext {
    pub config: TransitConfig,
    pub registry: EnvironmentRegistry,
}

/// Load the dotenv file before anything reads the process environment.
pub fn load_dotenv(flags: &GlobalFlags) -> anyhow::Result<()> {
    if let Some(path) = &flags.env_file {
        dotenvy::from_path(path)
            .with_context(|| format!("failed to load dotenv file at {}", path.display()))?;
        return Ok(());
    }
    dotenvy::dotenv().ok();
    Ok(())
}

pub fn load_context(flags: &GlobalFlags) -> anyhow::Result<AppContext> {
    let config = match &flags.config {
        Some(path) => TransitConfig::load_from(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => TransitConfig::load().context("failed to load transit config")?,
    };
    let registry = EnvironmentRegistry::from_process_env();
    tracing::debug!(
        artifacts = %config.artifacts.dir.display(),
        environments = registry.list().len(),
        "context loaded"
    );
    Ok(AppContext { config, registry })
}
