use std::io;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

/// Exit status and captured output lines of a finished process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub status: i32,
    pub lines: Vec<String>,
}

impl CommandOutput {
    #[must_use]
    pub fn success(&self) -> bool {
        self.status == 0
    }
}

#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Runs `program` with `args` to completion.
    ///
    /// A nonzero exit status is not an error; only failing to run the process at all is.
    async fn run(&self, program: &str, args: &[String]) -> io::Result<CommandOutput>;
}

/// Spawns real processes, killing them when they outlive `timeout`.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    timeout: Duration,
}

impl ProcessRunner {
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, program: &str, args: &[String]) -> io::Result<CommandOutput> {
        debug!(program, ?args, "spawning process");

        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(self.timeout, child)
            .await
            .map_err(|_| {
                io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("{program} did not finish within {}s", self.timeout.as_secs()),
                )
            })??;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let lines = stdout
            .lines()
            .chain(stderr.lines())
            .map(ToString::to_string)
            .collect();

        // Killed by a signal: no exit code to report.
        let status = output.status.code().unwrap_or(-1);

        Ok(CommandOutput { status, lines })
    }
}
