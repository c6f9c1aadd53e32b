//! Advisory per-target lock so two runs never mutate one environment at once.
//!
//! The lock is a pid file at `locks/<target>.lock` under the artifact root.
//! A file whose pid is no longer running is treated as stale and replaced.

use std::fs::OpenOptions;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::error::MigrationError;

const RETRY_DELAY: Duration = Duration::from_millis(250);

/// Held lock. Dropping it removes the file.
#[derive(Debug)]
pub struct TargetLock {
    path: PathBuf,
}

impl TargetLock {
    /// Acquire the lock at `path`, waiting up to `wait` for a live holder.
    ///
    /// # Errors
    ///
    /// Returns [`MigrationError::Locked`] if another live process still holds
    /// the lock after `wait`, or the file cannot be read or created.
    pub async fn acquire(target: &str, path: &Path, wait: Duration) -> Result<Self, MigrationError> {
        let started = Instant::now();
        loop {
            match try_acquire(path) {
                Ok(lock) => {
                    tracing::debug!(target_env = target, path = %path.display(), "target lock acquired");
                    return Ok(lock);
                }
                Err(LockState::Stale(pid)) => {
                    tracing::warn!(target_env = target, pid, "removing stale target lock");
                    let _ = std::fs::remove_file(path);
                }
                Err(state) => {
                    if started.elapsed() >= wait {
                        return Err(MigrationError::Locked {
                            target: target.to_string(),
                            holder: state.describe(path),
                        });
                    }
                    tokio::time::sleep(RETRY_DELAY).await;
                }
            }
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TargetLock {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

#[derive(Debug)]
enum LockState {
    HeldBy(u32),
    Stale(u32),
    Unknown,
}

impl LockState {
    fn describe(&self, path: &Path) -> String {
        match self {
            Self::HeldBy(pid) => format!("pid {pid}"),
            Self::Stale(pid) => format!("stale pid {pid}"),
            Self::Unknown => format!(
                "an unreadable lock file at {}; remove it if no transit process is running",
                path.display()
            ),
        }
    }
}

fn try_acquire(path: &Path) -> Result<TargetLock, LockState> {
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    match OpenOptions::new().create_new(true).write(true).open(path) {
        Ok(mut file) => {
            let _ = writeln!(file, "{}", std::process::id());
            Ok(TargetLock {
                path: path.to_path_buf(),
            })
        }
        Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
            let mut contents = String::new();
            if OpenOptions::new()
                .read(true)
                .open(path)
                .and_then(|mut file| file.read_to_string(&mut contents))
                .is_err()
            {
                return Err(LockState::Unknown);
            }
            match contents.trim().parse::<u32>().ok() {
                Some(pid) if is_process_running(pid) => Err(LockState::HeldBy(pid)),
                Some(pid) => Err(LockState::Stale(pid)),
                None => Err(LockState::Unknown),
            }
        }
        Err(_) => Err(LockState::Unknown),
    }
}

fn is_process_running(pid: u32) -> bool {
    if pid == std::process::id() {
        return true;
    }
    std::process::Command::new("kill")
        .arg("-0")
        .arg(pid.to_string())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .is_ok_and(|status| status.success())
}
