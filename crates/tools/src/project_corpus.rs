//! Project corpus search tool.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

use paperstack_core::error::ToolError;
use paperstack_core::tool::{Tool, ToolResult};

use crate::index::PaperIndex;

const MAX_RESULTS: usize = 15;
const DEFAULT_RESULTS: usize = 5;

/// Passage search over one project's indexed documents.
///
/// A project that was never indexed is a routine state, not a failure: the
/// tool answers with a success-shaped "not yet indexed" payload and the
/// conversation continues.
pub struct ProjectCorpusTool {
    index: Arc<dyn PaperIndex>,
}

impl ProjectCorpusTool {
    pub fn new(index: Arc<dyn PaperIndex>) -> Self {
        Self { index }
    }
}

#[derive(Debug, Deserialize)]
struct ProjectCorpusArgs {
    project_id: String,
    query: String,
    #[serde(default)]
    limit: Option<usize>,
}

#[async_trait]
impl Tool for ProjectCorpusTool {
    fn name(&self) -> &str {
        "search_project_corpus"
    }

    fn description(&self) -> &str {
        "Search the documents indexed for a specific project. Returns passage-level matches from that project's corpus only."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "project_id": {
                    "type": "string",
                    "description": "The project whose corpus to search"
                },
                "query": {
                    "type": "string",
                    "description": "Keywords to search the project's documents for"
                },
                "limit": {
                    "type": "integer",
                    "description": "Maximum number of passages to return (default 5, max 15)"
                }
            },
            "required": ["project_id", "query"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let args: ProjectCorpusArgs = serde_json::from_value(arguments)
            .map_err(|e| ToolError::InvalidArguments(e.to_string()))?;

        let limit = args.limit.unwrap_or(DEFAULT_RESULTS).min(MAX_RESULTS);
        debug!(project_id = %args.project_id, query = %args.query, limit, "Searching project corpus");

        let passages = self
            .index
            .search_project(&args.project_id, &args.query, limit)
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: self.name().into(),
                reason: e.to_string(),
            })?;

        let data = match passages {
            Some(passages) => serde_json::json!({
                "indexed": true,
                "project_id": args.project_id,
                "count": passages.len(),
                "passages": passages,
            }),
            None => serde_json::json!({
                "indexed": false,
                "project_id": args.project_id,
                "message": format!(
                    "Project '{}' is not yet indexed. Its documents must be ingested before the corpus can be searched.",
                    args.project_id
                ),
            }),
        };
        Ok(ToolResult {
            call_id: String::new(),
            success: true,
            output: serde_json::to_string_pretty(&data).unwrap_or_default(),
            data: Some(data),
        })
    }
}
