use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use crate::error::{OpsError, Result};

/// An external command to run, described as argv plus execution context.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandSpec {
    pub argv: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub env: Vec<(String, String)>,
    pub timeout: Option<Duration>,
}

impl CommandSpec {
    pub fn new<I, S>(argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            argv: argv.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn display(&self) -> String {
        self.argv.join(" ")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code; `None` when killed by a signal or by the runner's timeout.
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }

    pub fn code(&self) -> i32 {
        self.status.unwrap_or(-1)
    }
}

/// Capability for running external programs. A non-zero exit is returned as
/// data; only a failure to spawn is an error.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput>;
}

/// Runs commands on the local machine via `tokio::process`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        let (program, args) = spec
            .argv
            .split_first()
            .ok_or_else(|| OpsError::Command("empty command".into()))?;

        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &spec.cwd {
            cmd.current_dir(dir);
        }
        for (key, value) in &spec.env {
            cmd.env(key, value);
        }

        tracing::debug!(command = %spec.display(), "running");
        let child = cmd
            .spawn()
            .map_err(|e| OpsError::Command(format!("failed to run {program}: {e}")))?;

        let output = match spec.timeout {
            Some(limit) => match tokio::time::timeout(limit, child.wait_with_output()).await {
                Ok(result) => result?,
                Err(_) => {
                    return Ok(CommandOutput {
                        status: None,
                        stdout: String::new(),
                        stderr: format!("timed out after {}s", limit.as_secs()),
                    })
                }
            },
            None => child.wait_with_output().await?,
        };

        Ok(CommandOutput {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}

/// Run a command and fail on a non-zero exit, returning trimmed stdout.
pub async fn run_checked(runner: &dyn CommandRunner, spec: &CommandSpec) -> Result<String> {
    let output = runner.run(spec).await?;
    if !output.success() {
        return Err(OpsError::Command(format!(
            "{} failed (exit {}): {}",
            spec.display(),
            output.code(),
            output.stderr.trim()
        )));
    }
    Ok(output.stdout.trim().to_string())
}
