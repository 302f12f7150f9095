//! Shared test helpers for loop tests.

use paperstack_core::error::{ProviderError, ToolError};
use paperstack_core::message::Message;
use paperstack_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use paperstack_core::runner::{CommandOutput, CommandRunner};
use paperstack_core::tool::{Tool, ToolResult};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// A mock provider that returns a sequence of scripted responses.
///
/// Each call to `complete` returns the next response in the queue.
/// Panics if more calls are made than responses provided.
pub struct SequentialMockProvider {
    responses: Mutex<Vec<ProviderResponse>>,
    call_count: Mutex<usize>,
}

impl SequentialMockProvider {
    pub fn new(responses: Vec<ProviderResponse>) -> Self {
        Self {
            responses: Mutex::new(responses),
            call_count: Mutex::new(0),
        }
    }

    /// Create a provider that returns a single text response (no tool calls).
    pub fn single_text(text: &str) -> Self {
        Self::new(vec![make_text_response(text)])
    }

    /// Create a provider that first returns tool calls, then a final answer.
    pub fn tool_then_answer(
        tool_calls: Vec<paperstack_core::message::MessageToolCall>,
        thought: &str,
        answer: &str,
    ) -> Self {
        Self::new(vec![
            make_tool_call_response(tool_calls, thought),
            make_text_response(answer),
        ])
    }

    pub fn call_count(&self) -> usize {
        *self.call_count.lock().unwrap()
    }
}

#[async_trait::async_trait]
impl Provider for SequentialMockProvider {
    fn name(&self) -> &str {
        "sequential_mock"
    }

    async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let mut count = self.call_count.lock().unwrap();
        let responses = self.responses.lock().unwrap();

        if *count >= responses.len() {
            panic!(
                "SequentialMockProvider: no more responses (call #{}, have {})",
                *count,
                responses.len()
            );
        }

        let response = responses[*count].clone();
        *count += 1;
        Ok(response)
    }
}

/// A provider whose completion call always fails with a network error.
pub struct FailingProvider;

#[async_trait::async_trait]
impl Provider for FailingProvider {
    fn name(&self) -> &str {
        "failing_mock"
    }

    async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        Err(ProviderError::Network("connection refused".into()))
    }
}

/// A command runner that replays scripted outputs and records every command.
///
/// When the scripted queue runs dry it hands back a generic success, so
/// round-limit tests don't need one output per round.
pub struct FakeCommandRunner {
    outputs: Mutex<Vec<CommandOutput>>,
    commands: Mutex<Vec<(String, PathBuf)>>,
}

impl FakeCommandRunner {
    pub fn new(outputs: Vec<CommandOutput>) -> Self {
        Self {
            outputs: Mutex::new(outputs),
            commands: Mutex::new(Vec::new()),
        }
    }

    /// The commands run so far, in order.
    pub fn commands(&self) -> Vec<String> {
        self.commands
            .lock()
            .unwrap()
            .iter()
            .map(|(cmd, _)| cmd.clone())
            .collect()
    }

    /// The working directories the commands ran in, in order.
    pub fn cwds(&self) -> Vec<PathBuf> {
        self.commands
            .lock()
            .unwrap()
            .iter()
            .map(|(_, cwd)| cwd.clone())
            .collect()
    }
}

#[async_trait::async_trait]
impl CommandRunner for FakeCommandRunner {
    async fn run(&self, command: &str, cwd: &Path) -> CommandOutput {
        self.commands
            .lock()
            .unwrap()
            .push((command.to_string(), cwd.to_path_buf()));

        let mut outputs = self.outputs.lock().unwrap();
        if outputs.is_empty() {
            CommandOutput {
                stdout: "ok".into(),
                stderr: String::new(),
                exit_code: 0,
            }
        } else {
            outputs.remove(0)
        }
    }
}

/// A registry tool that returns a fixed payload.
pub struct StaticTool {
    name: &'static str,
    output: String,
}

impl StaticTool {
    pub fn new(name: &'static str, output: impl Into<String>) -> Self {
        Self {
            name,
            output: output.into(),
        }
    }
}

#[async_trait::async_trait]
impl Tool for StaticTool {
    fn name(&self) -> &str {
        self.name
    }

    fn description(&self) -> &str {
        "Returns a fixed payload"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, _arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        Ok(ToolResult::ok("", &self.output))
    }
}

/// Create a simple text response (no tool calls).
pub fn make_text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant(text),
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "mock-model".into(),
        metadata: serde_json::Map::new(),
    }
}

/// Create a response with tool calls and optional thought content.
pub fn make_tool_call_response(
    tool_calls: Vec<paperstack_core::message::MessageToolCall>,
    thought: &str,
) -> ProviderResponse {
    let mut msg = Message::assistant(thought);
    msg.tool_calls = tool_calls;
    ProviderResponse {
        message: msg,
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "mock-model".into(),
        metadata: serde_json::Map::new(),
    }
}

/// Helper to create a tool call.
pub fn make_tool_call(
    name: &str,
    args: serde_json::Value,
) -> paperstack_core::message::MessageToolCall {
    paperstack_core::message::MessageToolCall {
        id: format!("call_{}", name),
        name: name.to_string(),
        arguments: serde_json::to_string(&args).unwrap(),
    }
}

/// Helper to create an `execute_command` tool call.
pub fn make_command_call(id: &str, command: &str) -> paperstack_core::message::MessageToolCall {
    paperstack_core::message::MessageToolCall {
        id: id.to_string(),
        name: "execute_command".to_string(),
        arguments: serde_json::json!({ "command": command }).to_string(),
    }
}
