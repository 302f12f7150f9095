//! Registry tools for Paperstack.
//!
//! These give the research assistant its capabilities: search the paper
//! catalog, fetch paper details, search a project's indexed corpus, run a
//! nested deep-research loop, save notes, and deploy a repository in the
//! remote sandbox. The sandbox command runner for the coding agent also
//! lives here.

pub mod deep_research;
pub mod deploy_repository;
pub mod index;
pub mod notes;
pub mod paper_details;
pub mod project_corpus;
pub mod sandbox;
pub mod save_note;
pub mod search_papers;

use std::sync::Arc;

use paperstack_core::provider::Provider;
use paperstack_core::tool::ToolRegistry;
use paperstack_relay::RunnerClient;

pub use index::{CatalogIndex, CorpusPassage, ElasticIndex, Paper, PaperIndex};
pub use notes::{InMemoryNoteStore, Note, NoteStore};
pub use sandbox::SandboxRunner;

/// Create the general-chat tool registry with all six built-in tools.
///
/// `model` and `research_rounds` configure the nested deep-research loop;
/// the runner client points deployments at the configured runner.
pub fn default_registry(
    provider: Arc<dyn Provider>,
    index: Arc<dyn PaperIndex>,
    notes: Arc<dyn NoteStore>,
    runner: RunnerClient,
    model: impl Into<String>,
    research_rounds: usize,
) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(search_papers::SearchPapersTool::new(index.clone())));
    registry.register(Box::new(paper_details::PaperDetailsTool::new(index.clone())));
    registry.register(Box::new(project_corpus::ProjectCorpusTool::new(index.clone())));
    registry.register(Box::new(deep_research::DeepResearchTool::new(
        provider,
        index.clone(),
        model.into(),
        research_rounds,
    )));
    registry.register(Box::new(save_note::SaveNoteTool::new(notes)));
    registry.register(Box::new(deploy_repository::DeployRepositoryTool::new(
        runner, index,
    )));
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use paperstack_core::error::ProviderError;
    use paperstack_core::provider::{ProviderRequest, ProviderResponse};

    struct NullProvider;

    #[async_trait]
    impl Provider for NullProvider {
        fn name(&self) -> &str {
            "null"
        }
        async fn complete(
            &self,
            _request: ProviderRequest,
        ) -> Result<ProviderResponse, ProviderError> {
            Err(ProviderError::NotConfigured("null provider".into()))
        }
    }

    #[test]
    fn registry_has_all_six_tools() {
        let registry = default_registry(
            Arc::new(NullProvider),
            Arc::new(CatalogIndex::new()),
            Arc::new(InMemoryNoteStore::new()),
            RunnerClient::new("http://127.0.0.1:41601"),
            "claude-sonnet-4-20250514",
            4,
        );

        let mut names = registry.names();
        names.sort();
        assert_eq!(
            names,
            vec![
                "deep_research",
                "deploy_repository",
                "get_paper_details",
                "save_note",
                "search_papers",
                "search_project_corpus",
            ]
        );
    }
}
