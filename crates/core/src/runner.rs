//! Command runner trait: the sandbox execution boundary.
//!
//! The coding agent has exactly one capability: run a shell command in its
//! sandbox and read back stdout, stderr, and the exit code. Failures never
//! escape as errors; timeouts and spawn failures are encoded as an exit
//! code of -1 with an explanatory stderr, so the agent can read what went
//! wrong and react.

use async_trait::async_trait;
use std::path::Path;

/// Keep this much of an oversized stdout: first 2000 + last 4000 chars.
pub const MAX_STDOUT_CHARS: usize = 8000;
/// Keep this much of an oversized stderr: first 1000 + last 2000 chars.
pub const MAX_STDERR_CHARS: usize = 4000;

/// The captured result of one sandbox command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    /// Process exit code; -1 for timeouts and spawn failures
    pub exit_code: i32,
}

impl CommandOutput {
    /// Apply the output caps, keeping the head and tail of each stream.
    pub fn truncated(mut self) -> Self {
        self.stdout = truncate_middle(
            &self.stdout,
            MAX_STDOUT_CHARS,
            2000,
            4000,
            "\n\n... [truncated middle] ...\n\n",
        );
        self.stderr = truncate_middle(
            &self.stderr,
            MAX_STDERR_CHARS,
            1000,
            2000,
            "\n\n... [truncated] ...\n\n",
        );
        self
    }

    /// Render in the shape the model sees as a tool result and the audit
    /// log records as a step output.
    pub fn combined(&self) -> String {
        format!(
            "exit_code: {}\nstdout:\n{}\nstderr:\n{}",
            self.exit_code, self.stdout, self.stderr
        )
    }
}

/// Executes shell commands in a session's sandbox.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `command` with `cwd` as the working directory.
    async fn run(&self, command: &str, cwd: &Path) -> CommandOutput;
}

/// First `max` characters of `s`, cut on a char boundary.
pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

fn char_suffix(s: &str, count: usize) -> &str {
    let total = s.chars().count();
    if total <= count {
        return s;
    }
    let skip = total - count;
    match s.char_indices().nth(skip) {
        Some((idx, _)) => &s[idx..],
        None => s,
    }
}

fn truncate_middle(s: &str, limit: usize, head: usize, tail: usize, marker: &str) -> String {
    if s.chars().count() <= limit {
        return s.to_string();
    }
    format!("{}{}{}", truncate_chars(s, head), marker, char_suffix(s, tail))
}
