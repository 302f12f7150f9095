//! HTTP/SSE gateway for Paperstack.
//!
//! One axum process serves three surfaces: the blocking chat endpoint
//! backed by the research tool loop, the remote coding-session endpoints
//! (create, message, inspect, delete), and the deployment endpoint. With
//! `runner.mode = "local"` sessions and deployments execute in-process
//! through the sandbox runner; with `"remote"` the same routes relay to a
//! runner instance at `runner.base_url`.

pub mod api_v1;
pub mod runner_api;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tracing::info;

use paperstack_config::AppConfig;
use paperstack_core::message::Conversation;
use paperstack_core::provider::Provider;
use paperstack_core::runner::CommandRunner;
use paperstack_core::session::SessionStore;
use paperstack_core::tool::ToolRegistry;
use paperstack_relay::RunnerClient;
use paperstack_sessions::{InMemorySessionStore, SessionReaper};
use paperstack_tools::{CatalogIndex, ElasticIndex, InMemoryNoteStore, PaperIndex, SandboxRunner};

/// How session and deployment work reaches a sandbox.
pub enum RunnerMode {
    /// Commands run in this process through the sandbox runner.
    Local { runner: Arc<dyn CommandRunner> },
    /// Session and deploy routes relay to a remote runner gateway.
    Remote { client: RunnerClient },
}

/// Shared gateway state, one per process.
pub struct AppState {
    pub config: AppConfig,
    pub provider: Arc<dyn Provider>,
    pub tools: Arc<ToolRegistry>,
    pub index: Arc<dyn PaperIndex>,
    pub conversations: RwLock<HashMap<String, Conversation>>,
    pub store: Arc<dyn SessionStore>,
    pub runner: RunnerMode,
}

pub type SharedState = Arc<AppState>;

/// Build the application state from configuration.
///
/// The provider, search index, and tool registry are built once and shared
/// by every route. Does not spawn background tasks; `start` does that.
pub fn build_state(config: AppConfig) -> Result<SharedState, paperstack_core::Error> {
    let provider = paperstack_providers::from_config(&config)?;

    let index: Arc<dyn PaperIndex> = if config.search.backend == "elastic" {
        let mut index = ElasticIndex::new(&config.search.url, &config.search.index);
        if let Some(ref key) = config.search.api_key {
            index = index.with_api_key(key);
        }
        Arc::new(index)
    } else {
        Arc::new(CatalogIndex::new())
    };

    let runner_client = RunnerClient::new(&config.runner.base_url);
    let tools = Arc::new(paperstack_tools::default_registry(
        provider.clone(),
        index.clone(),
        Arc::new(InMemoryNoteStore::new()),
        runner_client.clone(),
        config.default_model.as_str(),
        config.limits.research_rounds,
    ));

    let store: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new());

    let runner = if config.runner.mode == "remote" {
        RunnerMode::Remote {
            client: runner_client,
        }
    } else {
        RunnerMode::Local {
            runner: Arc::new(SandboxRunner::new(Duration::from_secs(
                config.runner.command_timeout_secs,
            ))),
        }
    };

    Ok(Arc::new(AppState {
        config,
        provider,
        tools,
        index,
        conversations: RwLock::new(HashMap::new()),
        store,
        runner,
    }))
}

/// Build the Axum router with all gateway routes.
pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .nest("/v1", api_v1::routes().merge(runner_api::routes()))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the gateway HTTP server.
///
/// Builds state, spawns the session reaper, binds, and serves until the
/// process exits.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);
    let state = build_state(config)?;

    SessionReaper::new(
        state.store.clone(),
        Duration::from_secs(state.config.sessions.idle_timeout_secs),
        Duration::from_secs(state.config.sessions.reap_interval_secs),
    )
    .spawn();

    let router = build_router(state);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %addr, "Gateway listening");
    axum::serve(listener, router).await?;
    Ok(())
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[cfg(test)]
pub(crate) mod test_support;
