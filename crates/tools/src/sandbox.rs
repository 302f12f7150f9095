//! Sandbox command execution.
//!
//! The coding agent's single capability, implemented over `sh -c` in the
//! session workspace. Timeouts and spawn failures never surface as errors;
//! they come back as exit code -1 with an explanatory stderr so the agent
//! can read what happened and adjust.

use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

use paperstack_core::runner::{CommandOutput, CommandRunner};

/// Runs agent commands in a workspace directory with a per-command timeout.
pub struct SandboxRunner {
    timeout: Duration,
}

impl SandboxRunner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl CommandRunner for SandboxRunner {
    async fn run(&self, command: &str, cwd: &Path) -> CommandOutput {
        debug!(command = %command, cwd = %cwd.display(), "Executing sandbox command");

        let child = Command::new("sh")
            .args(["-c", command])
            .current_dir(cwd)
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(self.timeout, child).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                warn!(command = %command, error = %e, "Command failed to start");
                return CommandOutput {
                    stdout: String::new(),
                    stderr: format!("Failed to execute command: {e}"),
                    exit_code: -1,
                };
            }
            Err(_) => {
                warn!(
                    command = %command,
                    timeout_secs = self.timeout.as_secs(),
                    "Command timed out"
                );
                return CommandOutput {
                    stdout: String::new(),
                    stderr: format!("Command timed out after {}s", self.timeout.as_secs()),
                    exit_code: -1,
                };
            }
        };

        let result = CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            exit_code: output.status.code().unwrap_or(-1),
        }
        .truncated();

        debug!(command = %command, exit_code = result.exit_code, "Command finished");
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runner() -> SandboxRunner {
        SandboxRunner::new(Duration::from_secs(30))
    }

    #[tokio::test]
    async fn captures_stdout_and_exit_code() {
        let out = runner().run("echo hello", Path::new("/tmp")).await;
        assert_eq!(out.exit_code, 0);
        assert_eq!(out.stdout.trim(), "hello");
        assert!(out.stderr.is_empty());
    }

    #[tokio::test]
    async fn captures_nonzero_exit() {
        let out = runner().run("echo oops >&2; exit 3", Path::new("/tmp")).await;
        assert_eq!(out.exit_code, 3);
        assert_eq!(out.stderr.trim(), "oops");
    }

    #[tokio::test]
    async fn runs_in_the_given_directory() {
        let dir = tempfile::tempdir().unwrap();
        let out = runner().run("pwd", dir.path()).await;
        assert_eq!(out.exit_code, 0);
        assert!(out.stdout.trim().ends_with(
            dir.path().file_name().unwrap().to_str().unwrap()
        ));
    }

    #[tokio::test]
    async fn timeout_reports_negative_one() {
        let runner = SandboxRunner::new(Duration::from_secs(1));
        let out = runner.run("sleep 5", Path::new("/tmp")).await;
        assert_eq!(out.exit_code, -1);
        assert_eq!(out.stderr, "Command timed out after 1s");
        assert!(out.stdout.is_empty());
    }

    #[tokio::test]
    async fn missing_workdir_reports_spawn_failure() {
        let out = runner()
            .run("echo hi", Path::new("/nonexistent/workspace/path"))
            .await;
        assert_eq!(out.exit_code, -1);
        assert!(out.stderr.starts_with("Failed to execute command:"));
    }

    #[tokio::test]
    async fn oversized_output_is_truncated() {
        // ~18000 chars of stdout, well past the 8000-char cap
        let out = runner()
            .run("yes a | head -n 9000", Path::new("/tmp"))
            .await;
        assert_eq!(out.exit_code, 0);
        assert!(out.stdout.contains("[truncated middle]"));
        assert!(out.stdout.chars().count() < 8000);
    }
}
