//! Repository deployment tool.
//!
//! Drives the remote deployment agent through the aggregation relay: the
//! whole nested run (clone, setup commands, verification) happens on the
//! runner under its own round budget, and this tool returns only the
//! terminal summary, bounded to the last few steps. A deployment that ends
//! in `error` or `max_steps_reached` is still a successful tool call; only
//! transport failures and streams that never complete fail it.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

use paperstack_core::error::ToolError;
use paperstack_core::event::DeploySummary;
use paperstack_core::tool::{Tool, ToolResult};
use paperstack_relay::{DeployRequest, RunnerClient, aggregate_stream};

use crate::index::PaperIndex;

const MAX_SUMMARY_STEPS: usize = 5;
const GITHUB_PREFIX: &str = "https://github.com/";

/// Deploy a repository (or a paper's linked repository) on the runner.
pub struct DeployRepositoryTool {
    client: RunnerClient,
    index: Arc<dyn PaperIndex>,
}

impl DeployRepositoryTool {
    pub fn new(client: RunnerClient, index: Arc<dyn PaperIndex>) -> Self {
        Self { client, index }
    }

    async fn resolve_repo(&self, args: &DeployArgs) -> Result<String, ToolError> {
        if let Some(ref url) = args.repo_url {
            if !url.starts_with(GITHUB_PREFIX) {
                return Err(ToolError::InvalidArguments(format!(
                    "repo_url must start with {GITHUB_PREFIX} (got '{url}')"
                )));
            }
            return Ok(url.clone());
        }

        let Some(ref paper_id) = args.paper_id else {
            return Err(ToolError::InvalidArguments(
                "Provide either repo_url or paper_id".into(),
            ));
        };

        let paper = self
            .index
            .get(paper_id)
            .await
            .map_err(|e| self.failed(e.to_string()))?;
        match paper {
            Some(paper) => paper
                .repo_url
                .ok_or_else(|| self.failed(format!("Paper {paper_id} has no linked repository"))),
            None => Err(self.failed(format!("Paper not found: {paper_id}"))),
        }
    }

    fn failed(&self, reason: String) -> ToolError {
        ToolError::ExecutionFailed {
            tool_name: self.name().into(),
            reason,
        }
    }
}

#[derive(Debug, Deserialize)]
struct DeployArgs {
    #[serde(default)]
    repo_url: Option<String>,
    #[serde(default)]
    paper_id: Option<String>,
    #[serde(default)]
    project_id: Option<String>,
    #[serde(default)]
    task: Option<String>,
}

#[async_trait]
impl Tool for DeployRepositoryTool {
    fn name(&self) -> &str {
        "deploy_repository"
    }

    fn description(&self) -> &str {
        "Clone a GitHub repository in a sandbox and get it running. Pass repo_url directly, or paper_id to deploy a paper's linked repository. Returns the run status, a summary, and the last few setup steps."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "repo_url": {
                    "type": "string",
                    "description": "GitHub repository URL (https://github.com/...)"
                },
                "paper_id": {
                    "type": "string",
                    "description": "arXiv id whose linked repository should be deployed"
                },
                "project_id": {
                    "type": "string",
                    "description": "Project to associate the deployment with"
                },
                "task": {
                    "type": "string",
                    "description": "Optional custom instruction for the deployment agent"
                }
            }
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let args: DeployArgs = serde_json::from_value(arguments)
            .map_err(|e| ToolError::InvalidArguments(e.to_string()))?;

        let repo_url = self.resolve_repo(&args).await?;
        info!(repo_url = %repo_url, "Starting deployment run");

        let request = DeployRequest {
            repo_url: Some(repo_url.clone()),
            paper_id: None,
            project_id: args.project_id,
            task: args.task,
        };
        let stream = self
            .client
            .deploy(&request)
            .await
            .map_err(|e| self.failed(e.to_string()))?;
        let summary = aggregate_stream(stream)
            .await
            .map_err(|e| self.failed(e.to_string()))?;

        info!(
            repo_url = %repo_url,
            status = ?summary.status,
            steps = summary.step_count,
            "Deployment run finished"
        );

        let data = bounded_summary(&repo_url, summary);
        Ok(ToolResult {
            call_id: String::new(),
            success: true,
            output: serde_json::to_string_pretty(&data).unwrap_or_default(),
            data: Some(data),
        })
    }
}

/// Shrink a run summary for the outer conversation: full status and text,
/// but only the last few steps.
fn bounded_summary(repo_url: &str, mut summary: DeploySummary) -> serde_json::Value {
    if summary.steps.len() > MAX_SUMMARY_STEPS {
        summary.steps = summary.steps.split_off(summary.steps.len() - MAX_SUMMARY_STEPS);
    }
    serde_json::json!({
        "repo_url": repo_url,
        "status": summary.status,
        "summary": summary.summary,
        "step_count": summary.step_count,
        "elapsed_seconds": summary.elapsed_seconds,
        "last_steps": summary.steps,
    })
}
