use std::process::ExitCode;

use crate::bootstrap::AppContext;
use crate::cli::{Commands, GlobalFlags};

pub mod check;
pub mod envs;
pub mod migrate;
pub mod tables;

/// Dispatch a parsed command to the corresponding handler module.
pub async fn dispatch(command: Commands, ctx: &AppContext, flags: &GlobalFlags) -> anyhow::Result<ExitCode> {
    match command {
        Commands::Migrate(args) => migrate::handle(&args, ctx, flags).await,
        Commands::Check(args) => check::handle(&args, ctx, flags).await,
        Commands::Envs => envs::handle(ctx, flags),
        Commands::Tables => tables::handle(flags),
    }
}
