//! Paper catalog search tool.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

use paperstack_core::error::ToolError;
use paperstack_core::tool::{Tool, ToolResult};

use crate::index::PaperIndex;

const MAX_RESULTS: usize = 20;
const DEFAULT_RESULTS: usize = 10;

/// Ranked full-text search over the arXiv paper catalog.
pub struct SearchPapersTool {
    index: Arc<dyn PaperIndex>,
}

impl SearchPapersTool {
    pub fn new(index: Arc<dyn PaperIndex>) -> Self {
        Self { index }
    }
}

#[derive(Debug, Deserialize)]
struct SearchPapersArgs {
    query: String,
    #[serde(default)]
    limit: Option<usize>,
}

#[async_trait]
impl Tool for SearchPapersTool {
    fn name(&self) -> &str {
        "search_papers"
    }

    fn description(&self) -> &str {
        "Search the arXiv paper index by keyword. Returns ranked papers with id, title, authors, abstract, and categories."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Keywords to search titles and abstracts for"
                },
                "limit": {
                    "type": "integer",
                    "description": "Maximum number of papers to return (default 10, max 20)"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let args: SearchPapersArgs = serde_json::from_value(arguments)
            .map_err(|e| ToolError::InvalidArguments(e.to_string()))?;

        let limit = args.limit.unwrap_or(DEFAULT_RESULTS).min(MAX_RESULTS);
        debug!(query = %args.query, limit, "Searching papers");

        let papers = self
            .index
            .search(&args.query, limit)
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: self.name().into(),
                reason: e.to_string(),
            })?;

        let data = serde_json::json!({
            "query": args.query,
            "count": papers.len(),
            "papers": papers,
        });
        Ok(ToolResult {
            call_id: String::new(),
            success: true,
            output: serde_json::to_string_pretty(&data).unwrap_or_default(),
            data: Some(data),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::CatalogIndex;

    fn tool() -> SearchPapersTool {
        SearchPapersTool::new(Arc::new(CatalogIndex::new()))
    }

    #[tokio::test]
    async fn returns_ranked_papers() {
        let result = tool()
            .execute(serde_json::json!({"query": "retrieval"}))
            .await
            .unwrap();

        assert!(result.success);
        let data = result.data.unwrap();
        assert!(data["count"].as_u64().unwrap() > 0);
        assert!(data["papers"][0]["title"].as_str().unwrap().len() > 0);
        assert!(data["papers"][0]["abstract"].is_string());
    }

    #[tokio::test]
    async fn caps_limit_at_twenty() {
        let result = tool()
            .execute(serde_json::json!({"query": "model", "limit": 500}))
            .await
            .unwrap();

        let data = result.data.unwrap();
        assert!(data["papers"].as_array().unwrap().len() <= 20);
    }

    #[tokio::test]
    async fn no_hits_is_still_success() {
        let result = tool()
            .execute(serde_json::json!({"query": "zzzzzz qqqqqq"}))
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(result.data.unwrap()["count"], 0);
    }

    #[tokio::test]
    async fn missing_query_is_invalid_arguments() {
        let err = tool().execute(serde_json::json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }

    #[tokio::test]
    async fn wrong_argument_type_is_invalid_arguments() {
        let err = tool()
            .execute(serde_json::json!({"query": 42}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }

    #[test]
    fn tool_definition() {
        let def = tool().to_definition();
        assert_eq!(def.name, "search_papers");
        assert_eq!(def.parameters["required"][0], "query");
    }
}
