//! The blocking chat loop: research-assistant turns over the tool registry.

use std::sync::Arc;

use paperstack_core::message::{Conversation, Message};
use paperstack_core::provider::{Provider, ProviderRequest};
use paperstack_core::tool::{ToolCall, ToolRegistry};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::phase::{LoopPhase, PhaseTracker};

/// Why a chat turn stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// The model answered without requesting more tools.
    Completed,
    /// The round limit was hit; the reply is the best answer so far.
    RoundLimitReached,
}

impl std::fmt::Display for Termination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Completed => "completed",
            Self::RoundLimitReached => "round_limit_reached",
        })
    }
}

/// The result of one chat turn.
#[derive(Debug, Clone, Serialize)]
pub struct ChatOutcome {
    /// The assistant's reply text.
    pub reply: String,
    /// Completion rounds used by this turn.
    pub rounds: usize,
    /// How the turn ended. `RoundLimitReached` is best-effort completion,
    /// not an error.
    pub termination: Termination,
}

/// The blocking conversation loop.
///
/// One `process` call drives a full turn: append the user message, call the
/// completion service with the whole history plus registry schemas, execute
/// any requested tools, and repeat until the model answers in plain text or
/// the round limit is hit.
pub struct ChatLoop {
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    tools: Arc<ToolRegistry>,
    system_prompt: String,
    max_rounds: usize,
}

impl ChatLoop {
    pub fn new(
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        temperature: f32,
        tools: Arc<ToolRegistry>,
        system_prompt: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature,
            max_tokens: None,
            tools,
            system_prompt: system_prompt.into(),
            max_rounds: 8,
        }
    }

    /// Set the hard round limit for one turn.
    pub fn with_max_rounds(mut self, max: usize) -> Self {
        self.max_rounds = max;
        self
    }

    /// Set the default max tokens per completion.
    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    /// Run one chat turn.
    ///
    /// The system prompt is sent on the wire each round but never stored in
    /// the conversation. Tool calls within a round are dispatched
    /// concurrently; exactly one result is appended per call, in request
    /// order, before the next completion call.
    pub async fn process(
        &self,
        conversation: &mut Conversation,
        user_message: &str,
    ) -> Result<ChatOutcome, paperstack_core::Error> {
        conversation.push(Message::user(user_message));

        info!(
            conversation_id = %conversation.id,
            history = conversation.messages.len(),
            "Chat turn starting"
        );

        let mut phase = PhaseTracker::new("chat");
        let tool_definitions = self.tools.definitions();
        let mut round = 0usize;

        loop {
            round += 1;
            if round > self.max_rounds {
                phase.transition(LoopPhase::Done);
                warn!(
                    conversation_id = %conversation.id,
                    rounds = self.max_rounds,
                    "Round limit reached, returning best-effort reply"
                );
                let reply = conversation
                    .last_assistant_text()
                    .unwrap_or_default()
                    .to_string();
                return Ok(ChatOutcome {
                    reply,
                    rounds: self.max_rounds,
                    termination: Termination::RoundLimitReached,
                });
            }

            debug!(conversation_id = %conversation.id, round, "Chat round");
            phase.transition(LoopPhase::AwaitingModel);

            let mut messages = vec![Message::system(&self.system_prompt)];
            messages.extend(conversation.messages.iter().cloned());

            let request = ProviderRequest {
                model: self.model.clone(),
                messages,
                temperature: self.temperature,
                max_tokens: self.max_tokens,
                tools: tool_definitions.clone(),
                stream: false,
                stop: vec![],
            };

            let response = match self.provider.complete(request).await {
                Ok(r) => r,
                Err(e) => {
                    phase.transition(LoopPhase::Error);
                    return Err(e.into());
                }
            };

            if response.message.tool_calls.is_empty() {
                let reply = response.message.content.clone();
                conversation.push(response.message);
                phase.transition(LoopPhase::Done);
                info!(conversation_id = %conversation.id, rounds = round, "Chat turn completed");
                return Ok(ChatOutcome {
                    reply,
                    rounds: round,
                    termination: Termination::Completed,
                });
            }

            // The assistant message goes in first, then exactly one result
            // per call in request order.
            let tool_calls = response.message.tool_calls.clone();
            conversation.push(response.message);

            phase.transition(LoopPhase::ExecutingTools);
            debug!(round, tool_count = tool_calls.len(), "Dispatching tool calls");

            let dispatches = tool_calls.iter().map(|tc| {
                let call = ToolCall {
                    id: tc.id.clone(),
                    name: tc.name.clone(),
                    arguments: serde_json::from_str(&tc.arguments).unwrap_or_default(),
                };
                async move { self.tools.dispatch(&call).await }
            });
            let results = futures::future::join_all(dispatches).await;

            for (tc, result) in tool_calls.iter().zip(results) {
                conversation.push(Message::tool_result(&tc.id, &result.output));
            }
        }
    }
}
