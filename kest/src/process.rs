//! Subprocess execution port.
//!
//! Everything the engine runs — kubectl invocations, free-form shell
//! commands — goes through [`ProcessRunner`], so tests can substitute an
//! in-memory cluster simulation for the real binaries.

use std::process::Stdio;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Captured result of one subprocess run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// A subprocess could not be executed at all.
///
/// Distinct from a non-zero exit: those come back as [`ProcessOutput`]
/// and are interpreted by the caller.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("failed to spawn {cmd}: {source}")]
    Spawn {
        cmd: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write stdin to {cmd}: {source}")]
    Stdin {
        cmd: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to collect output of {cmd}: {source}")]
    Wait {
        cmd: String,
        #[source]
        source: std::io::Error,
    },
}

/// Port for running a command with captured output.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn run(
        &self,
        cmd: &str,
        args: &[String],
        stdin: Option<&str>,
    ) -> Result<ProcessOutput, ProcessError>;
}

/// Real subprocess execution via tokio.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioRunner;

impl TokioRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ProcessRunner for TokioRunner {
    async fn run(
        &self,
        cmd: &str,
        args: &[String],
        stdin: Option<&str>,
    ) -> Result<ProcessOutput, ProcessError> {
        debug!(cmd, ?args, has_stdin = stdin.is_some(), "running command");

        let mut command = tokio::process::Command::new(cmd);
        command
            .args(args)
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = command.spawn().map_err(|source| ProcessError::Spawn {
            cmd: cmd.to_string(),
            source,
        })?;

        if let Some(input) = stdin {
            if let Some(mut handle) = child.stdin.take() {
                handle
                    .write_all(input.as_bytes())
                    .await
                    .map_err(|source| ProcessError::Stdin {
                        cmd: cmd.to_string(),
                        source,
                    })?;
            }
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|source| ProcessError::Wait {
                cmd: cmd.to_string(),
                source,
            })?;

        let result = ProcessOutput {
            // Terminated-by-signal has no code; report it like a shell would.
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        debug!(cmd, exit_code = result.exit_code, "command finished");
        Ok(result)
    }
}
