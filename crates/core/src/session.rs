//! Remote session types: state for the sandboxed coding agent.
//!
//! A remote session ties a sandbox workspace to its agent conversation
//! history and an append-only command log, giving the coding agent
//! continuity across independent stateless requests. Sessions live in a
//! [`SessionStore`]; they are never persisted to durable storage, so a
//! process restart loses them by design.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::message::Message;

/// One executed command in a remote session.
///
/// Append-only; never mutated after insertion. Doubles as agent context
/// (replayed into the model's history) and as a human-readable audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandStep {
    /// 1-based step number within the session
    pub step: usize,

    /// The shell command that was run
    pub command: String,

    /// Captured stdout (truncated at the sandbox boundary)
    pub stdout: String,

    /// Captured stderr (truncated at the sandbox boundary)
    pub stderr: String,

    /// Process exit code; -1 for timeouts and spawn failures
    pub exit_code: i32,
}

/// Server-side state for one remote coding-agent session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteSession {
    /// Opaque session identifier (UUID v4)
    pub id: String,

    /// The repository this session is working on
    pub repo_url: String,

    /// Sandbox working directory for this session
    pub workspace: String,

    /// When the session was created
    pub created_at: DateTime<Utc>,

    /// Refreshed on every mutation; the reaper evicts idle sessions by it
    pub last_activity: DateTime<Utc>,

    /// Full agent conversation history, in strict arrival order
    pub messages: Vec<Message>,

    /// Ordered log of executed commands
    pub steps: Vec<CommandStep>,
}

impl RemoteSession {
    pub fn new(id: impl Into<String>, repo_url: impl Into<String>, workspace: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            repo_url: repo_url.into(),
            workspace: workspace.into(),
            created_at: now,
            last_activity: now,
            messages: Vec::new(),
            steps: Vec::new(),
        }
    }

    /// The next step number for this session.
    pub fn next_step_number(&self) -> usize {
        self.steps.len() + 1
    }
}

/// The session store trait.
///
/// Keyed by session id. Every operation against an absent id is a no-op
/// (returning `false` or `None`); callers treat absence as "session
/// expired", a recoverable user-facing condition, never a crash.
///
/// Implementations must serialize concurrent mutations against the SAME
/// id so two simultaneous turns cannot interleave their appends; distinct
/// ids must not contend.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Insert a session, returning its id.
    async fn create(&self, session: RemoteSession) -> String;

    /// Snapshot a session by id.
    async fn get(&self, id: &str) -> Option<RemoteSession>;

    /// Remove a session. Returns whether it existed.
    async fn delete(&self, id: &str) -> bool;

    /// Append a message to a session's history in arrival order.
    /// Returns `false` if the session does not exist.
    async fn append_message(&self, id: &str, message: Message) -> bool;

    /// Append a command step to a session's log in arrival order.
    /// Returns `false` if the session does not exist.
    async fn append_step(&self, id: &str, step: CommandStep) -> bool;

    /// Refresh a session's last-activity timestamp.
    async fn touch(&self, id: &str) -> bool;

    /// Number of live sessions.
    async fn count(&self) -> usize;

    /// Ids of all live sessions (for the reaper and status reporting).
    async fn session_ids(&self) -> Vec<String>;
}
