//! Command execution against a database's execution context.
//!
//! A [`DbTarget::Container`] runs tools through `docker exec -i`; a
//! [`DbTarget::Host`] runs them locally with `-h/-p`. Passwords travel in the
//! child's `PGPASSWORD` environment variable, never on the command line.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command as TokioCommand;
use tokio::time::timeout;
use transit_core::{DbConnection, DbTarget};

use crate::error::DbError;

const STDERR_EXCERPT_LEN: usize = 2000;

/// A fully-built command line, runnable async or blocking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
}

impl CommandSpec {
    fn tokio(&self) -> TokioCommand {
        let mut cmd = TokioCommand::new(&self.program);
        cmd.args(&self.args)
            .envs(self.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .kill_on_drop(true);
        cmd
    }

    fn blocking(&self) -> std::process::Command {
        let mut cmd = std::process::Command::new(&self.program);
        cmd.args(&self.args)
            .envs(self.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null());
        cmd
    }

    /// Command line without environment, for logs.
    #[must_use]
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Captured output of a finished command.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    #[must_use]
    pub const fn success(&self) -> bool {
        self.code == 0
    }
}

/// Builds tool invocations for one database connection.
#[derive(Debug, Clone)]
pub struct Executor {
    connection: DbConnection,
    docker_bin: String,
}

impl Executor {
    #[must_use]
    pub fn new(connection: DbConnection, docker_bin: impl Into<String>) -> Self {
        Self {
            connection,
            docker_bin: docker_bin.into(),
        }
    }

    #[must_use]
    pub const fn connection(&self) -> &DbConnection {
        &self.connection
    }

    /// Invocation of a PostgreSQL client tool (`psql`, `pg_dump`, ...).
    #[must_use]
    pub fn tool(&self, tool: &str, args: &[String]) -> CommandSpec {
        let mut env = Vec::new();
        if let Some(password) = &self.connection.password {
            env.push(("PGPASSWORD".to_string(), password.clone()));
        }

        match &self.connection.target {
            DbTarget::Container { name } => {
                let mut full = vec!["exec".to_string(), "-i".to_string()];
                if self.connection.password.is_some() {
                    full.push("-e".to_string());
                    full.push("PGPASSWORD".to_string());
                }
                full.push(name.clone());
                full.push(tool.to_string());
                full.extend_from_slice(args);
                CommandSpec {
                    program: self.docker_bin.clone(),
                    args: full,
                    env,
                }
            }
            DbTarget::Host { host, port } => {
                let mut full = vec![
                    "-h".to_string(),
                    host.clone(),
                    "-p".to_string(),
                    port.to_string(),
                ];
                full.extend_from_slice(args);
                CommandSpec {
                    program: tool.to_string(),
                    args: full,
                    env,
                }
            }
        }
    }

    /// `psql` running a single SQL string with unaligned, tuples-only output.
    #[must_use]
    pub fn psql(&self, sql: &str) -> CommandSpec {
        self.tool(
            "psql",
            &[
                "-X".into(),
                "-q".into(),
                "-t".into(),
                "-A".into(),
                "-v".into(),
                "ON_ERROR_STOP=1".into(),
                "-U".into(),
                self.connection.user.clone(),
                "-d".into(),
                self.connection.database.clone(),
                "-c".into(),
                sql.to_string(),
            ],
        )
    }

    /// Copy a local file into the execution context. Returns the path the
    /// tools should read, which for a host target is the local path itself.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the copy command fails or times out.
    pub async fn stage(
        &self,
        local: &Path,
        staging_dir: &str,
        limit: Duration,
    ) -> Result<String, DbError> {
        match &self.connection.target {
            DbTarget::Host { .. } => Ok(local.display().to_string()),
            DbTarget::Container { name } => {
                let file_name = local
                    .file_name()
                    .map_or_else(|| "transit-artifact".into(), |n| n.to_string_lossy().to_string());
                let remote = format!("{}/{file_name}", staging_dir.trim_end_matches('/'));
                let spec = CommandSpec {
                    program: self.docker_bin.clone(),
                    args: vec![
                        "cp".into(),
                        local.display().to_string(),
                        format!("{name}:{remote}"),
                    ],
                    env: Vec::new(),
                };
                let output = run(&spec, "stage artifact", limit).await?;
                ensure_success(&output, "stage artifact")?;
                Ok(remote)
            }
        }
    }

    /// Best-effort removal of a staged copy. Host-mode paths are the real
    /// artifact and are never removed.
    pub async fn unstage(&self, staged: &str, limit: Duration) {
        if let DbTarget::Container { name } = &self.connection.target {
            let spec = CommandSpec {
                program: self.docker_bin.clone(),
                args: vec![
                    "exec".into(),
                    name.clone(),
                    "rm".into(),
                    "-f".into(),
                    staged.to_string(),
                ],
                env: Vec::new(),
            };
            if let Err(error) = run(&spec, "unstage artifact", limit).await {
                tracing::warn!(%error, staged, "could not remove staged artifact copy");
            }
        }
    }
}

/// Run a command to completion, capturing output.
///
/// # Errors
///
/// Returns [`DbError::Spawn`] if the program cannot start and
/// [`DbError::Timeout`] if it outlives `limit` (the child is killed).
pub async fn run(spec: &CommandSpec, operation: &str, limit: Duration) -> Result<CommandOutput, DbError> {
    tracing::debug!(operation, command = %spec.display(), "running");
    let child = spec
        .tokio()
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| DbError::Spawn {
            program: spec.program.clone(),
            source,
        })?;

    let output = timeout(limit, child.wait_with_output())
        .await
        .map_err(|_| DbError::Timeout {
            operation: operation.to_string(),
            after_secs: limit.as_secs(),
        })??;

    Ok(CommandOutput {
        code: output.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    })
}

/// Run a command whose stdout is a binary artifact written to `dest`.
/// Returns the artifact size in bytes.
///
/// # Errors
///
/// Returns [`DbError::CommandFailed`] on non-zero exit and
/// [`DbError::EmptyArtifact`] if nothing was written.
pub async fn run_to_file(
    spec: &CommandSpec,
    operation: &str,
    dest: &Path,
    limit: Duration,
) -> Result<u64, DbError> {
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = std::fs::File::create(dest)?;
    tracing::debug!(operation, command = %spec.display(), dest = %dest.display(), "running to file");

    let child = spec
        .tokio()
        .stdout(Stdio::from(file))
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| DbError::Spawn {
            program: spec.program.clone(),
            source,
        })?;

    let output = timeout(limit, child.wait_with_output())
        .await
        .map_err(|_| DbError::Timeout {
            operation: operation.to_string(),
            after_secs: limit.as_secs(),
        })??;

    let result = CommandOutput {
        code: output.status.code().unwrap_or(-1),
        stdout: String::new(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    };
    ensure_success(&result, operation)?;

    let bytes = std::fs::metadata(dest)?.len();
    if bytes == 0 {
        return Err(DbError::EmptyArtifact(dest.to_path_buf()));
    }
    Ok(bytes)
}

/// Blocking variant used from `Drop` handlers, where no runtime is available.
///
/// # Errors
///
/// Returns [`DbError::Spawn`] or [`DbError::CommandFailed`].
pub fn run_blocking(spec: &CommandSpec, operation: &str) -> Result<CommandOutput, DbError> {
    let output = spec
        .blocking()
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .map_err(|source| DbError::Spawn {
            program: spec.program.clone(),
            source,
        })?;
    let result = CommandOutput {
        code: output.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    };
    ensure_success(&result, operation)?;
    Ok(result)
}

/// Turn a non-zero exit into [`DbError::CommandFailed`].
///
/// # Errors
///
/// Returns [`DbError::CommandFailed`] with a stderr excerpt.
pub fn ensure_success(output: &CommandOutput, operation: &str) -> Result<(), DbError> {
    if output.success() {
        return Ok(());
    }
    Err(DbError::CommandFailed {
        operation: operation.to_string(),
        code: output.code,
        stderr: stderr_excerpt(&output.stderr),
    })
}

fn stderr_excerpt(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.len() <= STDERR_EXCERPT_LEN {
        return trimmed.to_string();
    }
    let mut end = STDERR_EXCERPT_LEN;
    while !trimmed.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &trimmed[..end])
}
