//! Single-paper lookup tool.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;

use paperstack_core::error::ToolError;
use paperstack_core::tool::{Tool, ToolResult};

use crate::index::PaperIndex;

/// Fetch the full record for one paper by arXiv id.
///
/// An unknown id is a normal outcome for the model to react to, so it comes
/// back as a success-shaped `found: false` payload rather than an error.
pub struct PaperDetailsTool {
    index: Arc<dyn PaperIndex>,
}

impl PaperDetailsTool {
    pub fn new(index: Arc<dyn PaperIndex>) -> Self {
        Self { index }
    }
}

#[derive(Debug, Deserialize)]
struct PaperDetailsArgs {
    arxiv_id: String,
}

#[async_trait]
impl Tool for PaperDetailsTool {
    fn name(&self) -> &str {
        "get_paper_details"
    }

    fn description(&self) -> &str {
        "Fetch the full record for a single paper by its arXiv id (e.g. 2601.03112)."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "arxiv_id": {
                    "type": "string",
                    "description": "The arXiv identifier of the paper"
                }
            },
            "required": ["arxiv_id"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let args: PaperDetailsArgs = serde_json::from_value(arguments)
            .map_err(|e| ToolError::InvalidArguments(e.to_string()))?;

        let paper = self
            .index
            .get(&args.arxiv_id)
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: self.name().into(),
                reason: e.to_string(),
            })?;

        let data = match paper {
            Some(paper) => serde_json::json!({ "found": true, "paper": paper }),
            None => serde_json::json!({
                "found": false,
                "arxiv_id": args.arxiv_id,
                "message": format!("No paper with id '{}' in the index", args.arxiv_id),
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::CatalogIndex;

    fn tool() -> PaperDetailsTool {
        PaperDetailsTool::new(Arc::new(CatalogIndex::new()))
    }

    #[tokio::test]
    async fn returns_full_record() {
        let result = tool()
            .execute(serde_json::json!({"arxiv_id": "2603.02218"}))
            .await
            .unwrap();

        assert!(result.success);
        let data = result.data.unwrap();
        assert_eq!(data["found"], true);
        assert!(data["paper"]["title"]
            .as_str()
            .unwrap()
            .contains("Self-Repairing"));
        assert!(data["paper"]["authors"].as_array().unwrap().len() >= 2);
    }

    #[tokio::test]
    async fn unknown_id_is_found_false_not_error() {
        let result = tool()
            .execute(serde_json::json!({"arxiv_id": "9999.99999"}))
            .await
            .unwrap();

        assert!(result.success);
        let data = result.data.unwrap();
        assert_eq!(data["found"], false);
        assert!(data["message"].as_str().unwrap().contains("9999.99999"));
    }

    #[tokio::test]
    async fn missing_arxiv_id_is_invalid_arguments() {
        let err = tool().execute(serde_json::json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }
}
