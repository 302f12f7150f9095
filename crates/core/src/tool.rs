//! Tool trait: the abstraction over assistant capabilities.
//!
//! Tools are what let the model act on the research library and the remote
//! sandbox: search papers, fetch details, save notes, deploy repositories.
//! Each tool is independently failable; failures surface as structured
//! payloads the model can read, never as loop-aborting errors.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::warn;
use crate::error::ToolError;
use crate::provider::ToolDefinition;

/// A request to execute a tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique call ID (matches the model's tool_call.id)
    pub id: String,

    /// Name of the tool to execute
    pub name: String,

    /// Arguments as a JSON value
    pub arguments: serde_json::Value,
}

/// The result of a tool execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// The call ID this result is for
    pub call_id: String,

    /// Whether the tool executed successfully
    pub success: bool,

    /// The output content
    pub output: String,

    /// Optional structured data (papers found, deployment steps, etc.)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl ToolResult {
    /// A successful result with plain text output.
    pub fn ok(call_id: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            success: true,
            output: output.into(),
            data: None,
        }
    }

    /// A failed result carrying a structured `{error, detail?}` payload as
    /// its content, so the model can explain the failure in natural language.
    pub fn failure(call_id: impl Into<String>, error: &ToolError) -> Self {
        let payload = match error {
            ToolError::ExecutionFailed { tool_name, reason } => serde_json::json!({
                "error": format!("{tool_name} failed"),
                "detail": reason,
            }),
            other => serde_json::json!({ "error": other.to_string() }),
        };
        Self {
            call_id: call_id.into(),
            success: false,
            output: payload.to_string(),
            data: Some(payload),
        }
    }
}

/// The core Tool trait.
///
/// Each registry tool (search_papers, get_paper_details, project corpus
/// search, deep_research, save_note, deploy_repository) implements this
/// trait. Implementations deserialize their arguments into a typed struct
/// first thing in `execute`, so validation happens once at the dispatch
/// boundary.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "search_papers").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the model).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Execute the tool with the given arguments.
    async fn execute(&self, arguments: serde_json::Value) -> std::result::Result<ToolResult, ToolError>;

    /// Convert this tool into a ToolDefinition for sending to the model.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// A registry of available tools.
///
/// The conversation loop uses this to:
/// 1. Get tool definitions to send to the model
/// 2. Dispatch tool calls when the model requests them
pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        let name = tool.name().to_string();
        self.tools.insert(name, tool);
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    /// Get all tool definitions (for sending to the model).
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.to_definition()).collect()
    }

    /// Execute a tool call, propagating tool errors to the caller.
    pub async fn execute(&self, call: &ToolCall) -> std::result::Result<ToolResult, ToolError> {
        let tool = self.tools.get(&call.name).ok_or_else(|| ToolError::NotFound(call.name.clone()))?;
        tool.execute(call.arguments.clone()).await
    }

    /// Dispatch a tool call for the conversation loop.
    ///
    /// Never fails: unknown tools, bad arguments, and execution errors all
    /// come back as a `success: false` result with a structured error
    /// payload, so exactly one result exists per call and the loop keeps
    /// running.
    pub async fn dispatch(&self, call: &ToolCall) -> ToolResult {
        match self.execute(call).await {
            Ok(mut result) => {
                result.call_id = call.id.clone();
                result
            }
            Err(e) => {
                warn!(tool = %call.name, error = %e, "Tool call failed");
                ToolResult::failure(&call.id, &e)
            }
        }
    }

    /// List all registered tool names.
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
