//! Human-readable rendering for `--format text`.

use std::fmt::Write as _;

use transit_engine::safety::ProbeResult;
use transit_engine::transplant::{ClearAction, TransplantResult};
use transit_engine::{Backup, BackupKind, ImportOutcome, PreflightReport, RunFailure, RunReport, SchemaSync};
use transit_schema::ChangeKind;

/// Plain-text form of a command result.
pub trait TextView {
    fn to_text(&self) -> String;
}

impl<T: TextView> TextView for [T] {
    fn to_text(&self) -> String {
        self.iter().map(TextView::to_text).collect::<Vec<_>>().join("\n")
    }
}

fn field(out: &mut String, label: &str, value: impl std::fmt::Display) {
    let _ = writeln!(out, "  {:<10}{value}", format!("{label}:"));
}

fn backup_line(backup: &Backup) -> String {
    let kind = match backup.kind {
        BackupKind::Database => "database dump",
        BackupKind::SchemaSnapshot => "schema snapshot",
    };
    format!("{} ({kind}, {} bytes)", backup.path.display(), backup.bytes)
}

impl TextView for RunReport {
    fn to_text(&self) -> String {
        let mut out = String::new();
        let outcome = if self.succeeded_with_warnings() {
            "completed with warnings"
        } else {
            "completed"
        };
        let _ = writeln!(out, "migration {} -> {} ({}) {outcome}", self.source, self.target, self.mode);
        field(&mut out, "run", &self.run_id);
        field(
            &mut out,
            "took",
            format!("{}s", (self.finished_at - self.started_at).num_seconds()),
        );
        field(&mut out, "backup", backup_line(&self.backup));
        schema_lines(&mut out, &self.schema);
        if let Some(transplant) = &self.transplant {
            transplant_lines(&mut out, transplant);
        }
        let count = |value: Option<u64>| value.map_or_else(|| "-".to_string(), |n| n.to_string());
        field(
            &mut out,
            "verified",
            format!(
                "{} account(s), {} settings row(s)",
                count(self.postflight.accounts),
                count(self.postflight.settings)
            ),
        );
        field(&mut out, "protected", format!("{} system tables", self.protected_tables));
        if !self.warnings.is_empty() {
            let _ = writeln!(out, "  warnings:");
            for warning in &self.warnings {
                let _ = writeln!(out, "    - {warning}");
            }
        }
        out.trim_end().to_string()
    }
}

fn schema_lines(out: &mut String, schema: &SchemaSync) {
    match schema {
        SchemaSync::Identical { .. } => field(out, "schema", "identical, nothing applied"),
        SchemaSync::Applied {
            diff_path, changes, ..
        } => {
            field(
                out,
                "schema",
                format!("applied {} change(s) from {}", changes.len(), diff_path.display()),
            );
            for change in changes {
                let sign = match change.kind {
                    ChangeKind::Add => '+',
                    ChangeKind::Remove => '-',
                    ChangeKind::Modify => '~',
                };
                let _ = writeln!(out, "    {sign} {}", change.subject);
            }
        }
    }
}

fn transplant_lines(out: &mut String, transplant: &TransplantResult) {
    field(
        out,
        "export",
        format!(
            "{} content table(s), {} bytes at {}",
            transplant.tables.len(),
            transplant.export_bytes,
            transplant.export_path.display()
        ),
    );
    let (mut truncated, mut deleted, mut absent) = (0, 0, 0);
    for clear in &transplant.cleared {
        match clear.action {
            ClearAction::Truncated => truncated += 1,
            ClearAction::Deleted { .. } => deleted += 1,
            ClearAction::Absent => absent += 1,
        }
    }
    field(
        out,
        "cleared",
        format!("{truncated} truncated, {deleted} deleted row by row, {absent} absent"),
    );
    let import = match &transplant.import {
        ImportOutcome::Skipped => "skipped".to_string(),
        ImportOutcome::Clean => "clean".to_string(),
        ImportOutcome::DuplicatesOnly { duplicates } => format!("{duplicates} duplicate key(s) ignored"),
        ImportOutcome::Errors { total, .. } => format!("{total} error(s)"),
    };
    field(out, "import", import);
    for delta in &transplant.row_counts {
        let _ = writeln!(out, "    {:<30} {:>8} -> {}", delta.table, delta.before, delta.after);
    }
    if !transplant.repairs.is_empty() {
        field(
            out,
            "repaired",
            format!("{} dangling ownership reference(s)", transplant.repaired_rows()),
        );
    }
}

impl TextView for RunFailure {
    fn to_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "migration {} -> {} ({}) failed during {}",
            self.source, self.target, self.mode, self.last_state
        );
        field(&mut out, "run", &self.run_id);
        field(&mut out, "error", format!("[{}] {}", self.error_kind, self.error));
        match (&self.backup, &self.recovery) {
            (Some(backup), recovery) => {
                field(&mut out, "backup", backup_line(backup));
                if let Some(recovery) = recovery {
                    field(&mut out, "restore", recovery);
                }
            }
            (None, _) => field(&mut out, "backup", "none taken; the target was not modified"),
        }
        out.trim_end().to_string()
    }
}

impl TextView for ProbeResult {
    fn to_text(&self) -> String {
        format!("ok  {:<12} {:<18} {}", self.environment, self.probe, self.detail)
    }
}

impl TextView for PreflightReport {
    fn to_text(&self) -> String {
        let mut out = self.probes.to_text();
        let _ = write!(out, "\npre-flight passed ({} probe(s))", self.probes.len());
        out
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use transit_core::{MigrationMode, RunState};
    use transit_engine::MigrationError;

    use super::*;

    fn backup() -> Backup {
        Backup {
            path: PathBuf::from(".transit/artifacts/backups/stage-full.dump"),
            bytes: 2048,
            kind: BackupKind::Database,
            taken_at: Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
        }
    }

    fn failure(backup: Option<Backup>) -> RunFailure {
        let recovery = backup
            .as_ref()
            .map(|_| "docker exec -i pg-stage pg_restore --clean --if-exists".to_string());
        RunFailure {
            run_id: "run-1".into(),
            source: "dev".into(),
            target: "stage".into(),
            mode: MigrationMode::Full,
            error_kind: "integrity_violation",
            error: MigrationError::IntegrityViolation {
                target: "stage".into(),
                table: "directus_users".into(),
                accounts: 0,
            },
            last_state: RunState::PostValidating,
            backup,
            recovery,
            history: Vec::new(),
        }
    }

    #[test]
    fn failure_names_backup_and_restore_command() {
        let text = failure(Some(backup())).to_text();
        assert!(text.starts_with("migration dev -> stage (full) failed during post_validating"));
        assert!(text.contains("[integrity_violation]"));
        assert!(text.contains("backups/stage-full.dump (database dump, 2048 bytes)"));
        assert!(text.contains("restore:  docker exec -i pg-stage pg_restore"));
    }

    #[test]
    fn failure_before_backup_says_target_untouched() {
        let text = failure(None).to_text();
        assert!(text.contains("none taken; the target was not modified"));
        assert!(!text.contains("restore:"));
    }

    #[test]
    fn preflight_lists_every_probe() {
        let report = PreflightReport {
            probes: vec![
                ProbeResult {
                    environment: "dev".into(),
                    probe: "api_health",
                    detail: "http://dev.local".into(),
                },
                ProbeResult {
                    environment: "stage".into(),
                    probe: "database",
                    detail: "container pg-stage".into(),
                },
            ],
        };
        let text = report.to_text();
        assert_eq!(text.lines().count(), 3);
        assert!(text.lines().next().unwrap().contains("api_health"));
        assert!(text.ends_with("pre-flight passed (2 probe(s))"));
    }
}
