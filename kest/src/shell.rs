//! Shell adapter for the free-form exec action.

use std::sync::Arc;

use tracing::{debug, info};

use kest_common::Event;

use crate::process::{ProcessOutput, ProcessRunner};
use crate::recorder::Recorder;

/// Runs user-supplied shell commands under `sh -c`, recording a
/// `CommandRun`/`CommandResult` pair per invocation.
#[derive(Clone)]
pub struct Shell {
    runner: Arc<dyn ProcessRunner>,
    recorder: Recorder,
    quiet: bool,
}

impl Shell {
    pub fn new(runner: Arc<dyn ProcessRunner>, recorder: Recorder) -> Self {
        Self {
            runner,
            recorder,
            quiet: false,
        }
    }

    /// A handle that suppresses streaming log output. Events are still
    /// recorded; only the operator-facing logging goes away.
    pub fn quiet(&self) -> Shell {
        Shell {
            quiet: true,
            ..self.clone()
        }
    }

    /// Run a shell script, failing on a non-zero exit code.
    pub async fn run(&self, script: &str) -> anyhow::Result<ProcessOutput> {
        let args = vec!["-c".to_string(), script.to_string()];
        self.recorder.record(Event::CommandRun {
            cmd: "sh".to_string(),
            args: args.clone(),
            stdin: None,
            stdin_language: None,
        });

        if self.quiet {
            debug!(script, "exec (quiet)");
        } else {
            info!(script, "exec");
        }

        let output = self.runner.run("sh", &args, None).await?;
        self.recorder.record(Event::CommandResult {
            exit_code: output.exit_code,
            stdout: output.stdout.clone(),
            stderr: output.stderr.clone(),
            stdout_language: None,
            stderr_language: None,
        });

        if !output.success() {
            let stderr = output.stderr.trim();
            if stderr.is_empty() {
                anyhow::bail!("command exited with code {}", output.exit_code);
            }
            anyhow::bail!(
                "command exited with code {}: {stderr}",
                output.exit_code
            );
        }
        Ok(output)
    }
}

impl std::fmt::Debug for Shell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shell").field("quiet", &self.quiet).finish()
    }
}
