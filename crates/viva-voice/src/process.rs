//! Child process plumbing shared by the speech drivers.

use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Variables removed from every child environment. Speech tools never need
/// provider credentials.
const SCRUBBED_ENV: &[&str] = &[
    "VIVA_OPENAI_KEY",
    "VIVA_ANTHROPIC_KEY",
    "OPENAI_API_KEY",
    "ANTHROPIC_API_KEY",
    "AWS_ACCESS_KEY_ID",
    "AWS_SECRET_ACCESS_KEY",
    "AWS_SESSION_TOKEN",
    "GITHUB_TOKEN",
    "GH_TOKEN",
    "SSH_AUTH_SOCK",
    "DATABASE_URL",
];

/// Failure to run a helper program to completion.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("failed to start '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{program}' did not finish within {}s", .limit.as_secs_f32())]
    TimedOut { program: String, limit: Duration },

    #[error("I/O error talking to '{program}': {source}")]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// A program plus its leading arguments, as configured by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Build a command with the scrubbed environment and no inherited stdin.
    ///
    /// The child is killed if its handle is dropped before it exits.
    pub fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        for var in SCRUBBED_ENV {
            cmd.env_remove(var);
        }
        cmd
    }
}

/// Captured result of a finished child.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// Last non-empty stderr line, for error messages.
    pub fn stderr_tail(&self) -> &str {
        self.stderr
            .lines()
            .rev()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .unwrap_or("")
    }
}

/// Run `cmd` to completion within `limit`, optionally feeding `input` on stdin.
pub async fn run(
    spec: &CommandSpec,
    mut cmd: Command,
    input: Option<&str>,
    limit: Duration,
) -> Result<CommandOutput, ProcessError> {
    if input.is_some() {
        cmd.stdin(Stdio::piped());
    }

    let mut child = cmd.spawn().map_err(|source| ProcessError::Spawn {
        program: spec.program.clone(),
        source,
    })?;

    let io_error = |source| ProcessError::Io {
        program: spec.program.clone(),
        source,
    };

    if let (Some(text), Some(mut stdin)) = (input, child.stdin.take()) {
        stdin.write_all(text.as_bytes()).await.map_err(io_error)?;
        stdin.shutdown().await.map_err(io_error)?;
    }

    let output = tokio::time::timeout(limit, child.wait_with_output())
        .await
        .map_err(|_| ProcessError::TimedOut {
            program: spec.program.clone(),
            limit,
        })?
        .map_err(io_error)?;

    Ok(CommandOutput {
        status: output.status,
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}
