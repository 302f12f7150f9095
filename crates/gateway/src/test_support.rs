//! Shared fixtures for router tests: a scripted provider, a scripted
//! command runner, and state builders over the real tool registry.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::Request;
use axum::response::Response;
use http_body_util::BodyExt;
use tokio::sync::RwLock;

use paperstack_config::AppConfig;
use paperstack_core::error::ProviderError;
use paperstack_core::message::{Message, MessageToolCall};
use paperstack_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use paperstack_core::runner::{CommandOutput, CommandRunner};
use paperstack_relay::RunnerClient;
use paperstack_sessions::InMemorySessionStore;
use paperstack_tools::{CatalogIndex, InMemoryNoteStore, PaperIndex};

use crate::{AppState, RunnerMode, SharedState};

// --- Providers ---

/// Pops one scripted response per `complete` call; panics when exhausted.
pub(crate) struct ScriptedProvider {
    responses: Mutex<VecDeque<ProviderResponse>>,
}

impl ScriptedProvider {
    pub(crate) fn new(responses: Vec<ProviderResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
        }
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        Ok(self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .expect("ScriptedProvider ran out of responses"))
    }
}

struct FailingProvider;

#[async_trait]
impl Provider for FailingProvider {
    fn name(&self) -> &str {
        "failing"
    }

    async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        Err(ProviderError::Network("connection refused".into()))
    }
}

pub(crate) fn text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant(text),
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "claude-test".into(),
        metadata: serde_json::Map::new(),
    }
}

/// A response that asks for one `execute_command` tool call.
pub(crate) fn command_call_response(thought: &str, command: &str) -> ProviderResponse {
    let mut response = text_response(thought);
    response.message.tool_calls = vec![MessageToolCall {
        id: "call_1".into(),
        name: "execute_command".into(),
        arguments: serde_json::json!({ "command": command }).to_string(),
    }];
    response
}

/// A provider that answers each call with the next plain-text reply.
pub(crate) fn text_provider(replies: &[&str]) -> Arc<dyn Provider> {
    Arc::new(ScriptedProvider::new(
        replies.iter().map(|r| text_response(r)).collect(),
    ))
}

pub(crate) fn scripted_provider(responses: Vec<ProviderResponse>) -> Arc<dyn Provider> {
    Arc::new(ScriptedProvider::new(responses))
}

/// A provider that requests one tool call, then answers with `answer`.
pub(crate) fn tool_call_provider(
    tool: &str,
    arguments: serde_json::Value,
    answer: &str,
) -> Arc<dyn Provider> {
    let mut first = text_response("");
    first.message.tool_calls = vec![MessageToolCall {
        id: format!("call_{tool}"),
        name: tool.into(),
        arguments: arguments.to_string(),
    }];
    Arc::new(ScriptedProvider::new(vec![first, text_response(answer)]))
}

pub(crate) fn failing_provider() -> Arc<dyn Provider> {
    Arc::new(FailingProvider)
}

// --- Command runner ---

/// Records every command and replays scripted outputs in order; once the
/// script is exhausted, every command succeeds with stdout "ok".
pub(crate) struct FakeRunner {
    outputs: Mutex<VecDeque<CommandOutput>>,
    seen: Mutex<Vec<(String, PathBuf)>>,
}

impl FakeRunner {
    pub(crate) fn ok() -> Self {
        Self::scripted(Vec::new())
    }

    pub(crate) fn scripted(outputs: Vec<CommandOutput>) -> Self {
        Self {
            outputs: Mutex::new(outputs.into()),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn commands(&self) -> Vec<String> {
        self.seen
            .lock()
            .unwrap()
            .iter()
            .map(|(command, _)| command.clone())
            .collect()
    }
}

pub(crate) fn output(stdout: &str, stderr: &str, exit_code: i32) -> CommandOutput {
    CommandOutput {
        stdout: stdout.into(),
        stderr: stderr.into(),
        exit_code,
    }
}

#[async_trait]
impl CommandRunner for FakeRunner {
    async fn run(&self, command: &str, cwd: &Path) -> CommandOutput {
        self.seen
            .lock()
            .unwrap()
            .push((command.to_string(), cwd.to_path_buf()));
        self.outputs
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| output("ok", "", 0))
    }
}

// --- State builders ---

/// Config tuned for router tests: tiny conversation cap, short limits.
pub(crate) fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.api_key = Some("test-key".into());
    config.gateway.max_conversations = 2;
    config.limits.chat_rounds = 4;
    config.limits.session_rounds = 3;
    config.limits.deploy_rounds = 3;
    config
}

pub(crate) fn state_with(
    provider: Arc<dyn Provider>,
    runner: RunnerMode,
    config: AppConfig,
) -> SharedState {
    let index: Arc<dyn PaperIndex> = Arc::new(CatalogIndex::new());
    let tools = Arc::new(paperstack_tools::default_registry(
        provider.clone(),
        index.clone(),
        Arc::new(InMemoryNoteStore::new()),
        // Port 1 is never listening; nothing in these tests reaches it
        RunnerClient::new("http://127.0.0.1:1"),
        "claude-test",
        config.limits.research_rounds,
    ));

    Arc::new(AppState {
        config,
        provider,
        tools,
        index,
        conversations: RwLock::new(HashMap::new()),
        store: Arc::new(InMemorySessionStore::new()),
        runner,
    })
}

pub(crate) fn state_with_provider(provider: Arc<dyn Provider>) -> SharedState {
    state_with(
        provider,
        RunnerMode::Local {
            runner: Arc::new(FakeRunner::ok()),
        },
        test_config(),
    )
}

// --- Request/response helpers ---

pub(crate) fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub(crate) async fn read_json(response: Response) -> serde_json::Value {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}

/// Read an SSE body to the end and return `(event_type, json_data)` pairs.
pub(crate) async fn read_sse(response: Response) -> Vec<(String, serde_json::Value)> {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let text = String::from_utf8(body.to_vec()).unwrap();

    let mut frames = Vec::new();
    for block in text.split("\n\n").filter(|b| !b.trim().is_empty()) {
        let mut event_type = String::new();
        let mut data = String::new();
        for line in block.lines() {
            if let Some(rest) = line.strip_prefix("event: ") {
                event_type = rest.to_string();
            } else if let Some(rest) = line.strip_prefix("data: ") {
                data = rest.to_string();
            }
        }
        let json = serde_json::from_str(&data).unwrap_or(serde_json::Value::Null);
        frames.push((event_type, json));
    }
    frames
}
