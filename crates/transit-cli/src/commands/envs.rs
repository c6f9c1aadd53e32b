use std::process::ExitCode;

use serde::Serialize;
use transit_config::EnvironmentRegistry;
use transit_core::MigrationMode;

use crate::bootstrap::AppContext;
use crate::cli::GlobalFlags;
use crate::output::{self, TextView};

/// What an environment supports with the variables currently set.
#[derive(Debug, Serialize)]
pub struct EnvSummary {
    pub name: String,
    pub url: Option<String>,
    pub database: Option<String>,
    pub full_ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub problem: Option<String>,
}

impl TextView for EnvSummary {
    fn to_text(&self) -> String {
        match (&self.problem, &self.url) {
            (Some(problem), _) => format!("{:<12} invalid: {problem}", self.name),
            (None, url) => format!(
                "{:<12} {:<40} {}",
                self.name,
                url.as_deref().unwrap_or("-"),
                self.database.as_deref().unwrap_or("schema only (no database)")
            ),
        }
    }
}

#[must_use]
pub fn summarize(registry: &EnvironmentRegistry) -> Vec<EnvSummary> {
    registry
        .list()
        .into_iter()
        .map(|name| match registry.resolve(&name, MigrationMode::SchemaOnly) {
            Ok(env) => EnvSummary {
                full_ready: env.database.is_some(),
                url: Some(env.api.base_url),
                database: env.database.map(|db| db.to_string()),
                problem: None,
                name,
            },
            Err(error) => EnvSummary {
                url: None,
                database: None,
                full_ready: false,
                problem: Some(error.to_string()),
                name,
            },
        })
        .collect()
}

pub fn handle(ctx: &AppContext, flags: &GlobalFlags) -> anyhow::Result<ExitCode> {
    let summaries = summarize(&ctx.registry);
    if summaries.is_empty() && flags.format == crate::cli::OutputFormat::Text {
        eprintln!("no environments found; set <NAME>_URL and <NAME>_TOKEN");
        return Ok(ExitCode::SUCCESS);
    }
    output::output(summaries.as_slice(), flags.format)?;
    Ok(ExitCode::SUCCESS)
}
