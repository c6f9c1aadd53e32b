use std::process::ExitCode;

use anyhow::Context;
use transit_engine::{LiveConnector, Orchestrator};

use crate::bootstrap::AppContext;
use crate::cli::{CheckArgs, GlobalFlags};
use crate::output;
use crate::progress::Progress;

/// Resolve and probe both sides; nothing is locked, backed up, or modified.
pub async fn handle(args: &CheckArgs, ctx: &AppContext, flags: &GlobalFlags) -> anyhow::Result<ExitCode> {
    let orchestrator = Orchestrator::new(ctx.config.clone(), LiveConnector::new(&ctx.config));
    let progress = Progress::spinner("probing source and target");

    let report = orchestrator
        .check(&ctx.registry, &args.source, &args.target, args.mode())
        .await
        .inspect_err(|_| progress.finish_err("pre-flight failed"))
        .with_context(|| format!("pre-flight {} -> {} ({})", args.source, args.target, args.mode()))?;

    progress.finish_ok("pre-flight passed");
    output::output(&report, flags.format)?;
    Ok(ExitCode::SUCCESS)
}
