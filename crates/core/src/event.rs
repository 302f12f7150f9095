//! Wire-level stream events.
//!
//! Two event channels narrate long-running agent work over SSE:
//! - the **remote-agent channel** ([`AgentEvent`]): live narration of an
//!   interactive coding-agent session (thinking, command, output, message,
//!   error, done);
//! - the **deployment-summary channel** ([`DeployEvent`]): progress of a
//!   one-shot deployment run (status, step, complete).
//!
//! Events are produced in strict temporal order; the variant name doubles
//! as the SSE event name via `event_type()`.

use serde::{Deserialize, Serialize};

/// Events emitted while a remote coding-agent session runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    /// Model text preceding a command (reasoning shown to the user).
    Thinking { text: String },

    /// A command is about to run in the sandbox.
    Command { command: String },

    /// A command finished.
    Output {
        command: String,
        stdout: String,
        stderr: String,
        exit_code: i32,
    },

    /// The agent's final answer for this turn.
    Message { text: String },

    /// An error occurred mid-stream.
    Error { text: String },

    /// The turn completed. Emitted exactly once, never after an error.
    Done {},
}

impl AgentEvent {
    /// SSE event name for this event type.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Thinking { .. } => "thinking",
            Self::Command { .. } => "command",
            Self::Output { .. } => "output",
            Self::Message { .. } => "message",
            Self::Error { .. } => "error",
            Self::Done {} => "done",
        }
    }
}

/// Terminal status of a deployment run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeployStatus {
    Success,
    Error,
    MaxStepsReached,
}

/// One command step in a deployment summary, capped for response size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeployStep {
    /// 1-based step number (0 is reserved for the clone step)
    pub step: usize,
    pub command: String,
    pub exit_code: i32,
    /// Combined exit_code/stdout/stderr text, capped at the step output limit
    pub output: String,
}

/// The terminal payload of a deployment run.
///
/// Also the success body of the deploy tool contract, so the aggregation
/// relay parses a `complete` frame's data directly into this type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploySummary {
    pub status: DeployStatus,
    pub summary: String,
    #[serde(default)]
    pub steps: Vec<DeployStep>,
    #[serde(default)]
    pub step_count: usize,
    #[serde(default)]
    pub elapsed_seconds: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo_url: Option<String>,
}

/// Events emitted while a deployment run streams.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DeployEvent {
    /// Human-readable progress ("Cloning repository...", ...)
    Status { message: String },

    /// One completed command step.
    Step {
        step: usize,
        command: String,
        exit_code: i32,
        output: String,
    },

    /// Terminal event carrying the full run summary.
    Complete(DeploySummary),
}

impl DeployEvent {
    /// SSE event name for this event type.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Status { .. } => "status",
            Self::Step { .. } => "step",
            Self::Complete(_) => "complete",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agent_event_serialization_thinking() {
        let event = AgentEvent::Thinking {
            text: "Let me check the README".into(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"thinking""#));
        assert!(json.contains("README"));
    }

    #[test]
    fn agent_event_serialization_output() {
        let event = AgentEvent::Output {
            command: "ls".into(),
            stdout: "README.md".into(),
            stderr: String::new(),
            exit_code: 0,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"output""#));
        assert!(json.contains(r#""exit_code":0"#));
    }

    #[test]
    fn agent_event_done_has_empty_payload() {
        let json = serde_json::to_string(&AgentEvent::Done {}).unwrap();
        assert_eq!(json, r#"{"type":"done"}"#);
    }

    #[test]
    fn agent_event_type_names() {
        assert_eq!(AgentEvent::Thinking { text: "x".into() }.event_type(), "thinking");
        assert_eq!(AgentEvent::Command { command: "x".into() }.event_type(), "command");
        assert_eq!(
            AgentEvent::Output {
                command: "x".into(),
                stdout: String::new(),
                stderr: String::new(),
                exit_code: 0
            }
            .event_type(),
            "output"
        );
        assert_eq!(AgentEvent::Message { text: "x".into() }.event_type(), "message");
        assert_eq!(AgentEvent::Error { text: "x".into() }.event_type(), "error");
        assert_eq!(AgentEvent::Done {}.event_type(), "done");
    }

    #[test]
    fn agent_event_deserialization() {
        let json = r#"{"type":"command","command":"cargo build"}"#;
        let event: AgentEvent = serde_json::from_str(json).unwrap();
        match event {
            AgentEvent::Command { command } => assert_eq!(command, "cargo build"),
            _ => panic!("Wrong variant"),
        }
    }

    #[test]
    fn deploy_complete_inlines_summary_fields() {
        let event = DeployEvent::Complete(DeploySummary {
            status: DeployStatus::Success,
            summary: "App running on port 7860".into(),
            steps: vec![],
            step_count: 4,
            elapsed_seconds: 92.3,
            repo_url: Some("https://github.com/user/repo".into()),
        });
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"complete""#));
        assert!(json.contains(r#""status":"success""#));
        assert!(json.contains(r#""step_count":4"#));
        assert!(json.contains(r#""elapsed_seconds":92.3"#));
    }

    #[test]
    fn deploy_summary_parses_without_optional_fields() {
        // A clone-failure terminal payload carries no step_count or elapsed.
        let json = r#"{"status":"error","summary":"Failed to clone repository","steps":[{"step":0,"command":"git clone","exit_code":128,"output":"fatal: not found"}]}"#;
        let summary: DeploySummary = serde_json::from_str(json).unwrap();
        assert_eq!(summary.status, DeployStatus::Error);
        assert_eq!(summary.steps.len(), 1);
        assert_eq!(summary.step_count, 0);
        assert_eq!(summary.elapsed_seconds, 0.0);
    }

    #[test]
    fn deploy_status_round_trips_snake_case() {
        let json = serde_json::to_string(&DeployStatus::MaxStepsReached).unwrap();
        assert_eq!(json, r#""max_steps_reached""#);
        let parsed: DeployStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, DeployStatus::MaxStepsReached);
    }
}
