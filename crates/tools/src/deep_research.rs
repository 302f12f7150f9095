//! Nested research loop tool.
//!
//! Runs its own small completion/tool loop over the paper index, with its
//! own round budget, and returns the synthesized answer plus an ordered
//! trace of the sub-tool calls it made. The outer conversation sees it as
//! one tool call; the outer round budget is not consumed by the inner
//! iterations.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info};

use paperstack_core::error::ToolError;
use paperstack_core::message::{Message, Role};
use paperstack_core::provider::{Provider, ProviderRequest};
use paperstack_core::tool::{Tool, ToolCall, ToolRegistry, ToolResult};

use crate::index::PaperIndex;
use crate::paper_details::PaperDetailsTool;
use crate::search_papers::SearchPapersTool;

const RESEARCH_SYSTEM_PROMPT: &str = "You are a research analyst with access to an arXiv paper \
index. Answer the question using evidence from the index: search for relevant papers, fetch \
details for the most promising ones, and cite arXiv ids for every claim. Be concise and factual. \
When you have gathered enough evidence, answer directly without further tool calls.";

/// Bounded mini research loop over the paper index.
pub struct DeepResearchTool {
    provider: Arc<dyn Provider>,
    index: Arc<dyn PaperIndex>,
    model: String,
    max_rounds: usize,
}

impl DeepResearchTool {
    pub fn new(
        provider: Arc<dyn Provider>,
        index: Arc<dyn PaperIndex>,
        model: impl Into<String>,
        max_rounds: usize,
    ) -> Self {
        Self {
            provider,
            index,
            model: model.into(),
            max_rounds,
        }
    }
}

#[derive(Debug, Deserialize)]
struct DeepResearchArgs {
    question: String,
}

#[async_trait]
impl Tool for DeepResearchTool {
    fn name(&self) -> &str {
        "deep_research"
    }

    fn description(&self) -> &str {
        "Investigate a research question in depth: runs several rounds of paper search and detail lookups, then synthesizes an answer with citations. Slower than search_papers; use it for questions that need evidence from multiple papers."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "question": {
                    "type": "string",
                    "description": "The research question to investigate"
                }
            },
            "required": ["question"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let args: DeepResearchArgs = serde_json::from_value(arguments)
            .map_err(|e| ToolError::InvalidArguments(e.to_string()))?;

        let mut registry = ToolRegistry::new();
        registry.register(Box::new(SearchPapersTool::new(self.index.clone())));
        registry.register(Box::new(PaperDetailsTool::new(self.index.clone())));

        let mut messages = vec![
            Message::system(RESEARCH_SYSTEM_PROMPT),
            Message::user(args.question.clone()),
        ];
        let mut trace: Vec<serde_json::Value> = Vec::new();
        let mut answer: Option<String> = None;
        let mut rounds = 0;

        for _ in 0..self.max_rounds {
            rounds += 1;
            let request = ProviderRequest {
                model: self.model.clone(),
                messages: messages.clone(),
                temperature: 0.3,
                max_tokens: Some(1024),
                tools: registry.definitions(),
                stream: false,
                stop: vec![],
            };

            // An upstream failure here fails this tool call; the registry
            // turns it into an error payload for the outer loop.
            let response =
                self.provider
                    .complete(request)
                    .await
                    .map_err(|e| ToolError::ExecutionFailed {
                        tool_name: self.name().into(),
                        reason: format!("Research model call failed: {e}"),
                    })?;

            let assistant = response.message;
            if assistant.tool_calls.is_empty() {
                let text = assistant.content.trim().to_string();
                messages.push(assistant);
                answer = Some(text);
                break;
            }

            let calls: Vec<ToolCall> = assistant
                .tool_calls
                .iter()
                .map(|tc| ToolCall {
                    id: tc.id.clone(),
                    name: tc.name.clone(),
                    arguments: serde_json::from_str(&tc.arguments).unwrap_or_default(),
                })
                .collect();
            messages.push(assistant);

            for call in &calls {
                debug!(round = rounds, tool = %call.name, "Research sub-tool call");
                let result = registry.dispatch(call).await;
                trace.push(serde_json::json!({
                    "tool": call.name,
                    "arguments": call.arguments,
                    "success": result.success,
                }));
                messages.push(Message::tool_result(&result.call_id, &result.output));
            }
        }

        let answer = answer.unwrap_or_else(|| {
            // Budget ran out: surface the best partial answer we have
            messages
                .iter()
                .rev()
                .find(|m| m.role == Role::Assistant && !m.content.trim().is_empty())
                .map(|m| m.content.trim().to_string())
                .unwrap_or_else(|| {
                    "The research budget was exhausted before a final answer was reached.".into()
                })
        });
        info!(rounds, sub_calls = trace.len(), "Deep research finished");

        let data = serde_json::json!({
            "answer": answer,
            "rounds": rounds,
            "trace": trace,
        });
        Ok(ToolResult {
            call_id: String::new(),
            success: true,
            output: answer,
            data: Some(data),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::CatalogIndex;
    use paperstack_core::error::ProviderError;
    use paperstack_core::message::MessageToolCall;
    use paperstack_core::provider::ProviderResponse;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    struct ScriptedProvider {
        responses: Mutex<VecDeque<Message>>,
    }

    impl ScriptedProvider {
        fn new(responses: Vec<Message>) -> Self {
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

        async fn complete(
            &self,
            _request: ProviderRequest,
        ) -> Result<ProviderResponse, ProviderError> {
            let message = self.responses.lock().unwrap().pop_front().ok_or(
                ProviderError::ApiError {
                    status_code: 500,
                    message: "script exhausted".into(),
                },
            )?;
            Ok(ProviderResponse {
                message,
                usage: None,
                model: "scripted".into(),
                metadata: serde_json::Map::new(),
            })
        }
    }

    fn searching_assistant(query: &str) -> Message {
        let mut msg = Message::assistant("");
        msg.tool_calls = vec![MessageToolCall {
            id: "call_1".into(),
            name: "search_papers".into(),
            arguments: format!(r#"{{"query":"{query}"}}"#),
        }];
        msg
    }

    fn tool(provider: ScriptedProvider, max_rounds: usize) -> DeepResearchTool {
        DeepResearchTool::new(
            Arc::new(provider),
            Arc::new(CatalogIndex::new()),
            "claude-sonnet-4-20250514",
            max_rounds,
        )
    }

    #[tokio::test]
    async fn searches_then_answers_with_trace() {
        let provider = ScriptedProvider::new(vec![
            searching_assistant("retrieval domain shift"),
            Message::assistant("RetrievalBench (2602.11047) measures this degradation."),
        ]);
        let tool = tool(provider, 4);

        let result = tool
            .execute(serde_json::json!({"question": "How does retrieval degrade under domain shift?"}))
            .await
            .unwrap();

        assert!(result.success);
        assert!(result.output.contains("2602.11047"));
        let data = result.data.unwrap();
        assert_eq!(data["rounds"], 2);
        assert_eq!(data["trace"].as_array().unwrap().len(), 1);
        assert_eq!(data["trace"][0]["tool"], "search_papers");
        assert_eq!(data["trace"][0]["success"], true);
    }

    #[tokio::test]
    async fn budget_exhaustion_is_best_effort() {
        // The script never stops calling tools; the budget has to stop it
        let provider = ScriptedProvider::new(vec![
            searching_assistant("sparse routing"),
            searching_assistant("sparse routing experts"),
            searching_assistant("sparse routing ablation"),
        ]);
        let tool = tool(provider, 2);

        let result = tool
            .execute(serde_json::json!({"question": "What is known about sparse routing?"}))
            .await
            .unwrap();

        assert!(result.success);
        let data = result.data.unwrap();
        assert_eq!(data["rounds"], 2);
        assert_eq!(data["trace"].as_array().unwrap().len(), 2);
        assert!(result.output.contains("exhausted"));
    }

    #[tokio::test]
    async fn upstream_failure_fails_the_tool_call() {
        let tool = tool(ScriptedProvider::new(vec![]), 4);
        let err = tool
            .execute(serde_json::json!({"question": "anything"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::ExecutionFailed { .. }));
    }

    #[tokio::test]
    async fn missing_question_is_invalid_arguments() {
        let tool = tool(ScriptedProvider::new(vec![]), 4);
        let err = tool.execute(serde_json::json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }
}
