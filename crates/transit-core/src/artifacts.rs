//! Timestamped artifact paths.
//!
//! Every run writes its snapshot, diff, export, and backup under one root.
//! Artifacts are never deleted by Transit; operators rely on them for manual
//! recovery.

use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

const SCHEMA_DIR: &str = "schema";
const EXPORTS_DIR: &str = "exports";
const BACKUPS_DIR: &str = "backups";
const LOCKS_DIR: &str = "locks";

/// Path builder for one run's artifacts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactLayout {
    root: PathBuf,
    stamp: String,
}

impl ArtifactLayout {
    /// Layout rooted at `root`, stamped with `at`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, at: DateTime<Utc>) -> Self {
        Self {
            root: root.into(),
            stamp: at.format("%Y%m%dT%H%M%SZ").to_string(),
        }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Timestamp fragment shared by every artifact of the run.
    #[must_use]
    pub fn stamp(&self) -> &str {
        &self.stamp
    }

    /// Create every artifact subdirectory.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error if a directory cannot be created.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        for dir in [SCHEMA_DIR, EXPORTS_DIR, BACKUPS_DIR, LOCKS_DIR] {
            std::fs::create_dir_all(self.root.join(dir))?;
        }
        Ok(())
    }

    #[must_use]
    pub fn snapshot(&self, source: &str) -> PathBuf {
        self.file(SCHEMA_DIR, source, "snapshot", "json")
    }

    #[must_use]
    pub fn diff(&self, target: &str) -> PathBuf {
        self.file(SCHEMA_DIR, target, "diff", "json")
    }

    #[must_use]
    pub fn export(&self, source: &str) -> PathBuf {
        self.file(EXPORTS_DIR, source, "content", "dump")
    }

    #[must_use]
    pub fn full_backup(&self, target: &str) -> PathBuf {
        self.file(BACKUPS_DIR, target, "full", "dump")
    }

    #[must_use]
    pub fn schema_backup(&self, target: &str) -> PathBuf {
        self.file(BACKUPS_DIR, target, "schema", "json")
    }

    /// Advisory lock file keyed on the target environment. Not timestamped.
    #[must_use]
    pub fn lock(&self, target: &str) -> PathBuf {
        self.root
            .join(LOCKS_DIR)
            .join(format!("{}.lock", file_safe(target)))
    }

    fn file(&self, dir: &str, env: &str, kind: &str, ext: &str) -> PathBuf {
        self.root
            .join(dir)
            .join(format!("{}-{kind}-{}.{ext}", file_safe(env), self.stamp))
    }
}

fn file_safe(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect()
}
