use std::io::Write as _;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use transit_engine::{BackupSlot, LiveConnector, Orchestrator};

use crate::bootstrap::AppContext;
use crate::cli::{GlobalFlags, MigrateArgs};
use crate::output;
use crate::progress::Progress;
use crate::ui;

/// Exit status after an operator interrupt.
const EXIT_INTERRUPTED: u8 = 130;

pub async fn handle(args: &MigrateArgs, ctx: &AppContext, flags: &GlobalFlags) -> anyhow::Result<ExitCode> {
    let mode = args.mode();
    if mode.transplants_data() && !confirmed(args)? {
        eprintln!("aborted; nothing was changed");
        return Ok(ExitCode::FAILURE);
    }

    let progress = Arc::new(Progress::spinner("resolving environments"));
    let orchestrator =
        Orchestrator::new(ctx.config.clone(), LiveConnector::new(&ctx.config)).with_observer(progress.clone());
    let slot = orchestrator.backup_slot();

    // Losing the race drops the run future; the trigger guard re-enables on drop.
    let outcome = tokio::select! {
        outcome = orchestrator.migrate(&ctx.registry, &args.source, &args.target, mode) => Some(outcome),
        _ = tokio::signal::ctrl_c() => None,
    };

    match outcome {
        None => {
            progress.finish_err("interrupted");
            print_interrupt(&orchestrator, ctx, args, &slot);
            Ok(ExitCode::from(EXIT_INTERRUPTED))
        }
        Some(Ok(report)) => {
            progress.finish_ok(if report.succeeded_with_warnings() {
                "completed with warnings"
            } else {
                "completed"
            });
            output::output(&report, flags.format)?;
            Ok(ExitCode::SUCCESS)
        }
        Some(Err(failure)) => {
            progress.finish_err("failed");
            output::output_failure(&failure, flags.format)?;
            Ok(ExitCode::FAILURE)
        }
    }
}

fn print_interrupt(orchestrator: &Orchestrator<LiveConnector>, ctx: &AppContext, args: &MigrateArgs, slot: &BackupSlot) {
    let backup = slot.lock().ok().and_then(|taken| taken.clone());
    tracing::warn!(target_env = %args.target, backup_taken = backup.is_some(), "run interrupted");
    let Some(backup) = backup else {
        eprintln!("interrupted before the backup; '{}' was not modified", args.target);
        return;
    };
    eprintln!("interrupted; '{}' may be partially migrated", args.target);
    eprintln!("  backup:   {}", backup.path.display());
    if let Ok(target) = ctx.registry.resolve(&args.target, args.mode()) {
        eprintln!("  restore:  {}", orchestrator.recovery_for(&backup, &target));
    }
}

/// Full mode replaces content on the target; ask unless `--yes`.
fn confirmed(args: &MigrateArgs) -> anyhow::Result<bool> {
    if args.yes {
        return Ok(true);
    }
    if !ui::prefs().interactive {
        anyhow::bail!(
            "a full migration replaces content data on '{}'; pass --yes to run without a terminal",
            args.target
        );
    }
    eprint!(
        "Replace all content-table data on '{}' with data from '{}'? [y/N] ",
        args.target, args.source
    );
    std::io::stderr().flush().context("failed to write prompt")?;
    let mut answer = String::new();
    std::io::stdin()
        .read_line(&mut answer)
        .context("failed to read confirmation")?;
    Ok(is_yes(&answer))
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}
