use std::process::ExitCode;

use transit_core::SystemCatalog;
use transit_core::catalog::CatalogEntry;

use crate::cli::GlobalFlags;
use crate::output::{self, TextView};

impl TextView for CatalogEntry {
    fn to_text(&self) -> String {
        let category = serde_json::to_value(self.category)
            .ok()
            .and_then(|v| v.as_str().map(ToString::to_string))
            .unwrap_or_default();
        format!("{:<28} {category}", self.table)
    }
}

pub fn handle(flags: &GlobalFlags) -> anyhow::Result<ExitCode> {
    output::output(SystemCatalog::entries(), flags.format)?;
    Ok(ExitCode::SUCCESS)
}
