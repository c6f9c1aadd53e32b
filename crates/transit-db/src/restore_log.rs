//! Classification of `pg_restore` stderr.

use serde::Serialize;

const DUPLICATE_KEY: &str = "duplicate key value violates unique constraint";
const IGNORED_MARKER: &str = "errors ignored on restore:";
const EXCERPT_LINES: usize = 10;

/// Summary of a data restore's error output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RestoreLog {
    /// Errors reported by the tool, or counted from the log if higher.
    pub total_errors: usize,
    /// Errors caused by rows that already exist.
    pub duplicate_key_errors: usize,
    /// First few non-duplicate error lines.
    pub other_error_lines: Vec<String>,
    /// Tool exit code.
    pub exit_code: i32,
}

impl RestoreLog {
    /// Classify `stderr` from a restore that exited with `exit_code`.
    #[must_use]
    pub fn parse(stderr: &str, exit_code: i32) -> Self {
        let mut duplicates = 0;
        let mut others = 0;
        let mut other_lines = Vec::new();
        let mut reported = 0;

        for line in stderr.lines().map(str::trim) {
            if let Some(count) = ignored_count(line) {
                reported = reported.max(count);
                continue;
            }
            if !is_error_line(line) {
                continue;
            }
            if line.contains(DUPLICATE_KEY) {
                duplicates += 1;
            } else {
                others += 1;
                if other_lines.len() < EXCERPT_LINES {
                    other_lines.push(line.to_string());
                }
            }
        }

        Self {
            total_errors: reported.max(duplicates + others),
            duplicate_key_errors: duplicates,
            other_error_lines: other_lines,
            exit_code,
        }
    }

    /// Errors other than duplicate keys, including any the tool reported
    /// without a classifiable line.
    #[must_use]
    pub const fn other_errors(&self) -> usize {
        self.total_errors.saturating_sub(self.duplicate_key_errors)
    }

    #[must_use]
    pub const fn is_clean(&self) -> bool {
        self.total_errors == 0
    }

    /// Every error was a duplicate key: the target already held these rows.
    #[must_use]
    pub const fn duplicates_only(&self) -> bool {
        self.duplicate_key_errors > 0 && self.other_errors() == 0
    }
}

fn is_error_line(line: &str) -> bool {
    if line.contains("Error while PROCESSING TOC") || line.contains("Error from TOC entry") {
        return false;
    }
    line.contains("pg_restore: error:") || (line.contains("[archiver (db)]") && line.contains("ERROR"))
}

fn ignored_count(line: &str) -> Option<usize> {
    let (_, rest) = line.split_once(IGNORED_MARKER)?;
    rest.trim().parse().ok()
}
