//! The narrated coding-agent loop over a remote session.
//!
//! One `run` call drives a single agent turn against a stored session:
//! replay the session history, let the model issue `execute_command` calls,
//! run each one in the session's workspace, and narrate the whole turn as
//! [`AgentEvent`]s through a channel. Both the interactive session endpoint
//! and the one-shot deploy endpoint drive this loop; they differ only in
//! round budget and in how the events are rendered downstream.

use std::path::PathBuf;
use std::sync::Arc;

use paperstack_core::error::SessionError;
use paperstack_core::event::AgentEvent;
use paperstack_core::message::Message;
use paperstack_core::provider::{Provider, ProviderRequest, ToolDefinition};
use paperstack_core::runner::CommandRunner;
use paperstack_core::session::{CommandStep, SessionStore};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::phase::{LoopPhase, PhaseTracker};

/// The deployment-agent system prompt.
///
/// `budget` is the step budget quoted to the model; interactive sessions
/// and one-shot deploys run the same prompt with different budgets.
pub fn coder_system_prompt(budget: usize) -> String {
    format!(
        "You are a deployment agent. Your job is to get a GitHub repository \
         running inside this sandbox.\n\n\
         You have ONE tool: execute_command — it runs a shell command and returns \
         stdout + stderr. Use it to explore the repo, read the README, install \
         dependencies, and run the code.\n\n\
         RULES:\n\
         1. Start by listing files (ls) and reading the README (cat README.md or \
         similar).\n\
         2. Follow the README's setup instructions. If there is no README, look for \
         setup.py, pyproject.toml, requirements.txt, Makefile, Dockerfile, etc. and \
         infer what to do.\n\
         3. When you pip-install, always use --quiet to reduce noise.\n\
         4. If a command fails, read the error carefully, try to fix it (install \
         missing packages, downgrade versions, etc.), and retry. Be resourceful — \
         try at most 3 fixes per error before moving on.\n\
         5. If the repo is a web app (Gradio, Streamlit, FastAPI), start it in the \
         background (e.g. `nohup python app.py &`) and verify it's listening \
         (curl localhost:<port>). Report the port.\n\
         6. If the repo is a script or notebook, run its main entry point and report \
         the output.\n\
         7. If the repo requires a GPU and none is available, try to patch it to run \
         on CPU (e.g. device=\"cpu\"). If that's not feasible, say so.\n\
         8. If the repo requires large model downloads (>2 GB), mention it and \
         attempt a smaller variant if one exists.\n\
         9. Keep commands short and check results between each step. Do not chain \
         many commands with &&.\n\
         10. When you are DONE — either it's running or you've determined it can't \
         run — write a clear summary as your final text response. Include:\n\
         - Whether it succeeded or failed\n\
         - What the code does\n\
         - The final output or the error you couldn't resolve\n\
         - If it's a web server, the port it's listening on\n\n\
         CONSTRAINTS:\n\
         - You have no GPU (CPU only).\n\
         - You have internet access.\n\
         - Working directory is the repo root.\n\
         - Timeout per command is 120 seconds.\n\
         - Total budget: {budget} steps. Be efficient."
    )
}

/// Schema for the coding agent's single capability.
pub fn execute_command_definition() -> ToolDefinition {
    ToolDefinition {
        name: "execute_command".into(),
        description: "Execute a shell command in the sandbox. Returns stdout, stderr, \
                      and exit code. Timeout: 120 s. Working directory is the repo root \
                      unless you cd elsewhere."
            .into(),
        parameters: serde_json::json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The shell command to run.",
                }
            },
            "required": ["command"],
        }),
    }
}

/// The narrated coding-agent loop.
pub struct CoderLoop {
    provider: Arc<dyn Provider>,
    model: String,
    store: Arc<dyn SessionStore>,
    runner: Arc<dyn CommandRunner>,
    system_prompt: Option<String>,
    max_rounds: usize,
}

impl CoderLoop {
    pub fn new(
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        store: Arc<dyn SessionStore>,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            store,
            runner,
            system_prompt: None,
            max_rounds: 15,
        }
    }

    /// Set the hard round limit for one turn. Also rebudgets the default
    /// prompt, so the model is told the number it actually gets.
    pub fn with_max_rounds(mut self, max: usize) -> Self {
        self.max_rounds = max;
        self
    }

    /// Replace the default deployment-agent prompt.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Run one narrated turn against a session.
    ///
    /// Returns the event receiver immediately; the turn runs in a spawned
    /// task and narrates itself through the channel in strict temporal
    /// order. An unknown session id yields a single `error` event, no
    /// `done`, and no store mutation. Hitting the round limit yields `done`
    /// with no preceding `message`.
    pub async fn run(&self, session_id: &str, user_message: &str) -> mpsc::Receiver<AgentEvent> {
        let (tx, rx) = mpsc::channel(128);

        let provider = Arc::clone(&self.provider);
        let model = self.model.clone();
        let store = Arc::clone(&self.store);
        let runner = Arc::clone(&self.runner);
        let system_prompt = self
            .system_prompt
            .clone()
            .unwrap_or_else(|| coder_system_prompt(self.max_rounds));
        let max_rounds = self.max_rounds;
        let session_id = session_id.to_string();
        let user_message = user_message.to_string();

        tokio::spawn(async move {
            let Some(session) = store.get(&session_id).await else {
                warn!(session_id = %session_id, "Turn against unknown session");
                let text = SessionError::NotFound(session_id).to_string();
                let _ = tx.send(AgentEvent::Error { text }).await;
                return;
            };

            let workspace = PathBuf::from(&session.workspace);
            let mut step = session.next_step_number();
            let mut history = session.messages;

            let user = Message::user(&user_message);
            store.append_message(&session_id, user.clone()).await;
            history.push(user);

            info!(
                session_id = %session_id,
                history = history.len(),
                "Agent turn starting"
            );

            let mut phase = PhaseTracker::new("coder");
            let tools = vec![execute_command_definition()];

            for round in 1..=max_rounds {
                debug!(session_id = %session_id, round, "Agent round");
                phase.transition(LoopPhase::AwaitingModel);

                let mut messages = vec![Message::system(&system_prompt)];
                messages.extend(history.iter().cloned());

                let request = ProviderRequest {
                    model: model.clone(),
                    messages,
                    temperature: 0.2,
                    max_tokens: None,
                    tools: tools.clone(),
                    stream: false,
                    stop: vec![],
                };

                let response = match provider.complete(request).await {
                    Ok(r) => r,
                    Err(e) => {
                        phase.transition(LoopPhase::Error);
                        error!(session_id = %session_id, error = %e, "Completion failed mid-turn");
                        let text = format!("Claude API error: {e}");
                        let _ = tx.send(AgentEvent::Error { text }).await;
                        return;
                    }
                };

                let assistant = response.message;
                if assistant.tool_calls.is_empty() {
                    let text = assistant.content.clone();
                    store.append_message(&session_id, assistant).await;
                    phase.transition(LoopPhase::Done);
                    info!(session_id = %session_id, rounds = round, "Agent turn completed");
                    let _ = tx.send(AgentEvent::Message { text }).await;
                    let _ = tx.send(AgentEvent::Done {}).await;
                    return;
                }

                let tool_calls = assistant.tool_calls.clone();
                store.append_message(&session_id, assistant.clone()).await;
                if !assistant.content.is_empty() {
                    let thinking = AgentEvent::Thinking {
                        text: assistant.content.clone(),
                    };
                    if tx.send(thinking).await.is_err() {
                        return; // client went away
                    }
                }
                history.push(assistant);

                phase.transition(LoopPhase::Streaming);
                for tc in &tool_calls {
                    let arguments: serde_json::Value =
                        serde_json::from_str(&tc.arguments).unwrap_or_default();
                    let command = arguments["command"].as_str().unwrap_or("").to_string();

                    let announce = AgentEvent::Command {
                        command: command.clone(),
                    };
                    if tx.send(announce).await.is_err() {
                        return;
                    }

                    let output = runner.run(&command, &workspace).await.truncated();
                    let combined = output.combined();

                    store
                        .append_message(&session_id, Message::tool_result(&tc.id, &combined))
                        .await;
                    history.push(Message::tool_result(&tc.id, &combined));
                    store
                        .append_step(
                            &session_id,
                            CommandStep {
                                step,
                                command: command.clone(),
                                stdout: output.stdout.clone(),
                                stderr: output.stderr.clone(),
                                exit_code: output.exit_code,
                            },
                        )
                        .await;
                    step += 1;

                    let finished = AgentEvent::Output {
                        command,
                        stdout: output.stdout,
                        stderr: output.stderr,
                        exit_code: output.exit_code,
                    };
                    if tx.send(finished).await.is_err() {
                        return;
                    }
                }
            }

            // Budget exhausted: done without a message, so callers can tell
            // "ran out of steps" apart from a normal answer.
            phase.transition(LoopPhase::Done);
            warn!(session_id = %session_id, rounds = max_rounds, "Agent hit the round limit");
            let _ = tx.send(AgentEvent::Done {}).await;
        });

        rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::*;
    use paperstack_core::message::Role;
    use paperstack_core::runner::CommandOutput;
    use paperstack_core::session::RemoteSession;
    use paperstack_sessions::InMemorySessionStore;

    async fn collect(mut rx: mpsc::Receiver<AgentEvent>) -> Vec<AgentEvent> {
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events
    }

    async fn seeded_store() -> (Arc<InMemorySessionStore>, String) {
        let store = Arc::new(InMemorySessionStore::new());
        let id = store
            .create(RemoteSession::new(
                "sess-1",
                "https://github.com/user/repo",
                "/tmp/ws/sess-1",
            ))
            .await;
        (store, id)
    }

    #[tokio::test]
    async fn unknown_session_emits_error_without_done() {
        let store = Arc::new(InMemorySessionStore::new());
        let agent = CoderLoop::new(
            Arc::new(SequentialMockProvider::new(vec![])),
            "mock-model",
            store.clone(),
            Arc::new(FakeCommandRunner::new(vec![])),
        );

        let events = collect(agent.run("ghost", "hello").await).await;

        assert_eq!(events.len(), 1);
        match &events[0] {
            AgentEvent::Error { text } => {
                assert!(text.contains("ghost"));
                assert!(text.contains("may have expired"));
            }
            other => panic!("Expected error event, got {other:?}"),
        }
        // Nothing was created or mutated.
        assert_eq!(store.count().await, 0);
    }

    #[tokio::test]
    async fn command_round_narrates_and_appends_to_store() {
        let (store, id) = seeded_store().await;
        let provider = Arc::new(SequentialMockProvider::tool_then_answer(
            vec![make_command_call("call_1", "ls")],
            "Let me look around",
            "The repo lists one file: README.md",
        ));
        let runner = Arc::new(FakeCommandRunner::new(vec![CommandOutput {
            stdout: "README.md".into(),
            stderr: String::new(),
            exit_code: 0,
        }]));
        let agent = CoderLoop::new(provider, "mock-model", store.clone(), runner.clone());

        let events = collect(agent.run(&id, "get this repo running").await).await;

        let kinds: Vec<_> = events.iter().map(|e| e.event_type()).collect();
        assert_eq!(kinds, vec!["thinking", "command", "output", "message", "done"]);
        match &events[2] {
            AgentEvent::Output {
                command,
                stdout,
                exit_code,
                ..
            } => {
                assert_eq!(command, "ls");
                assert_eq!(stdout, "README.md");
                assert_eq!(*exit_code, 0);
            }
            other => panic!("Expected output event, got {other:?}"),
        }

        // Commands run in the session's workspace.
        assert_eq!(runner.cwds(), vec![PathBuf::from("/tmp/ws/sess-1")]);

        // user → assistant(call) → tool result → assistant, plus the step log.
        let session = store.get(&id).await.unwrap();
        let roles: Vec<_> = session.messages.iter().map(|m| m.role.clone()).collect();
        assert_eq!(
            roles,
            vec![Role::User, Role::Assistant, Role::Tool, Role::Assistant]
        );
        assert!(session.messages[2].content.contains("exit_code: 0"));
        assert_eq!(session.steps.len(), 1);
        assert_eq!(session.steps[0].step, 1);
        assert_eq!(session.steps[0].command, "ls");
        assert_eq!(session.steps[0].stdout, "README.md");
    }

    #[tokio::test]
    async fn thinking_omitted_when_model_sends_no_text() {
        let (store, id) = seeded_store().await;
        let provider = Arc::new(SequentialMockProvider::tool_then_answer(
            vec![make_command_call("call_1", "cat README.md")],
            "",
            "Done reading.",
        ));
        let agent = CoderLoop::new(
            provider,
            "mock-model",
            store,
            Arc::new(FakeCommandRunner::new(vec![])),
        );

        let events = collect(agent.run(&id, "read the readme").await).await;
        let kinds: Vec<_> = events.iter().map(|e| e.event_type()).collect();
        assert_eq!(kinds, vec!["command", "output", "message", "done"]);
    }

    #[tokio::test]
    async fn round_limit_ends_with_done_and_no_message() {
        let (store, id) = seeded_store().await;
        // The model never stops asking for commands. One extra scripted
        // response proves the loop stops calling at the limit.
        let responses: Vec<_> = (0..16)
            .map(|i| {
                make_tool_call_response(vec![make_command_call(&format!("call_{i}"), "sleep 1")], "")
            })
            .collect();
        let provider = Arc::new(SequentialMockProvider::new(responses));
        let agent = CoderLoop::new(
            provider.clone(),
            "mock-model",
            store.clone(),
            Arc::new(FakeCommandRunner::new(vec![])),
        )
        .with_max_rounds(15);

        let events = collect(agent.run(&id, "loop forever").await).await;

        assert_eq!(provider.call_count(), 15);
        assert_eq!(events.last().unwrap(), &AgentEvent::Done {});
        assert!(!events.iter().any(|e| e.event_type() == "message"));
        assert_eq!(
            events.iter().filter(|e| e.event_type() == "command").count(),
            15
        );

        let session = store.get(&id).await.unwrap();
        assert_eq!(session.steps.len(), 15);
        let numbers: Vec<_> = session.steps.iter().map(|s| s.step).collect();
        assert_eq!(numbers, (1..=15).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn provider_error_emits_error_and_stops() {
        let (store, id) = seeded_store().await;
        let agent = CoderLoop::new(
            Arc::new(FailingProvider),
            "mock-model",
            store.clone(),
            Arc::new(FakeCommandRunner::new(vec![])),
        );

        let events = collect(agent.run(&id, "hello").await).await;

        assert_eq!(events.len(), 1);
        match &events[0] {
            AgentEvent::Error { text } => {
                assert!(text.starts_with("Claude API error:"));
                assert!(text.contains("connection refused"));
            }
            other => panic!("Expected error event, got {other:?}"),
        }
        // The user message landed before the upstream failed; nothing else.
        let session = store.get(&id).await.unwrap();
        assert_eq!(session.messages.len(), 1);
        assert_eq!(session.messages[0].role, Role::User);
        assert!(session.steps.is_empty());
    }

    #[tokio::test]
    async fn step_numbers_continue_across_turns() {
        let (store, id) = seeded_store().await;
        let provider = Arc::new(SequentialMockProvider::new(vec![
            make_tool_call_response(vec![make_command_call("call_1", "ls")], ""),
            make_text_response("Turn one done."),
            make_tool_call_response(vec![make_command_call("call_2", "cat README.md")], ""),
            make_text_response("Turn two done."),
        ]));
        let agent = CoderLoop::new(
            provider,
            "mock-model",
            store.clone(),
            Arc::new(FakeCommandRunner::new(vec![])),
        );

        collect(agent.run(&id, "first turn").await).await;
        collect(agent.run(&id, "second turn").await).await;

        let session = store.get(&id).await.unwrap();
        let numbers: Vec<_> = session.steps.iter().map(|s| s.step).collect();
        assert_eq!(numbers, vec![1, 2]);
        // Second turn replayed the first turn's history.
        assert_eq!(session.messages.len(), 8);
    }

    #[test]
    fn prompt_quotes_the_budget() {
        let prompt = coder_system_prompt(25);
        assert!(prompt.contains("Total budget: 25 steps"));
        assert!(prompt.contains("execute_command"));
    }

    #[test]
    fn command_definition_schema() {
        let def = execute_command_definition();
        assert_eq!(def.name, "execute_command");
        assert_eq!(def.parameters["required"][0].as_str(), Some("command"));
        assert!(def.description.contains("Timeout: 120 s"));
    }
}
