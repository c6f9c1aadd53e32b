use clap::{Args, Subcommand};
use transit_core::MigrationMode;

/// Top-level command tree.
#[derive(Clone, Debug, Subcommand)]
pub enum Commands {
    /// Migrate schema (and with --full, content data) from source to target.
    Migrate(MigrateArgs),
    /// Resolve both environments and run the pre-flight probes only.
    Check(CheckArgs),
    /// List environments discoverable from <NAME>_URL variables.
    Envs,
    /// Print the system-table catalog protected on every run.
    Tables,
}

#[derive(Clone, Debug, Args)]
pub struct MigrateArgs {
    /// Source environment name (e.g. dev).
    pub source: String,
    /// Target environment name (e.g. stage).
    pub target: String,
    /// Also replace content-table data on the target.
    #[arg(long)]
    pub full: bool,
    /// Skip the confirmation prompt for full migrations.
    #[arg(short, long)]
    pub yes: bool,
}

impl MigrateArgs {
    #[must_use]
    pub const fn mode(&self) -> MigrationMode {
        mode(self.full)
    }
}

#[derive(Clone, Debug, Args)]
pub struct CheckArgs {
    pub source: String,
    pub target: String,
    /// Require database access on both sides, as a full migration would.
    #[arg(long)]
    pub full: bool,
}

impl CheckArgs {
    #[must_use]
    pub const fn mode(&self) -> MigrationMode {
        mode(self.full)
    }
}

const fn mode(full: bool) -> MigrationMode {
    if full {
        MigrationMode::Full
    } else {
        MigrationMode::SchemaOnly
    }
}
