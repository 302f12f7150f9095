//! Note-taking tool.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;

use paperstack_core::error::ToolError;
use paperstack_core::tool::{Tool, ToolResult};

use crate::notes::{Note, NoteStore};

/// Persist a research note against a project.
pub struct SaveNoteTool {
    store: Arc<dyn NoteStore>,
}

impl SaveNoteTool {
    pub fn new(store: Arc<dyn NoteStore>) -> Self {
        Self { store }
    }
}

#[derive(Debug, Deserialize)]
struct SaveNoteArgs {
    project_id: String,
    content: String,
    #[serde(default)]
    paper_id: Option<String>,
}

#[async_trait]
impl Tool for SaveNoteTool {
    fn name(&self) -> &str {
        "save_note"
    }

    fn description(&self) -> &str {
        "Save a note to a project. Optionally associate it with a paper by arXiv id."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "project_id": {
                    "type": "string",
                    "description": "The project to attach the note to"
                },
                "content": {
                    "type": "string",
                    "description": "The note text"
                },
                "paper_id": {
                    "type": "string",
                    "description": "Optional arXiv id the note refers to"
                }
            },
            "required": ["project_id", "content"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let args: SaveNoteArgs = serde_json::from_value(arguments)
            .map_err(|e| ToolError::InvalidArguments(e.to_string()))?;

        if args.content.trim().is_empty() {
            return Err(ToolError::InvalidArguments("Note content is empty".into()));
        }

        let note = Note::new(args.project_id, args.content, args.paper_id);
        let note_id = self
            .store
            .save(note)
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: self.name().into(),
                reason: e.to_string(),
            })?;

        let data = serde_json::json!({
            "note_id": note_id,
            "message": "Note saved",
        });
        Ok(ToolResult {
            call_id: String::new(),
            success: true,
            output: serde_json::to_string_pretty(&data).unwrap_or_default(),
            data: Some(data),
        })
    }
}
