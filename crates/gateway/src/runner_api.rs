//! Remote coding sessions and deployments.
//!
//! This is the runner-side surface: create a session (provision a
//! workspace, clone the repo), drive it with messages over SSE, inspect
//! or delete it, and run one-shot deployments. In remote mode every route
//! here relays to the configured runner instead, forwarding its SSE bytes
//! unmodified.

use std::collections::HashMap;
use std::convert::Infallible;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use axum::Json;
use axum::Router;
use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::sse::{Event as SseEvent, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use chrono::{DateTime, Utc};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{error, info, warn};
use uuid::Uuid;

use paperstack_agent::CoderLoop;
use paperstack_core::error::SessionError;
use paperstack_core::event::{AgentEvent, DeployEvent, DeployStatus, DeployStep, DeploySummary};
use paperstack_core::runner::{CommandRunner, truncate_chars};
use paperstack_core::session::RemoteSession;
use paperstack_relay::{ByteStream, DeployRequest};

use crate::api_v1::{ApiError, ErrorResponse, bad_request};
use crate::{RunnerMode, SharedState};

const GITHUB_PREFIX: &str = "https://github.com/";

pub fn routes() -> Router<SharedState> {
    Router::new()
        .route("/sessions", post(create_session))
        .route("/sessions/{id}", get(get_session).delete(delete_session))
        .route("/sessions/{id}/messages", post(send_session_message))
        .route("/deploy", post(deploy))
}

#[derive(Debug, Deserialize)]
struct CreateSessionRequest {
    #[serde(default)]
    repo_url: Option<String>,
    /// Written to the workspace as `.env` after a successful clone.
    #[serde(default)]
    env_vars: Option<HashMap<String, String>>,
}

#[derive(Debug, Serialize)]
struct SessionCreatedResponse {
    session_id: String,
    repo_url: String,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
struct SessionSummaryResponse {
    session_id: String,
    repo_url: String,
    created_at: DateTime<Utc>,
    last_activity: DateTime<Utc>,
    message_count: usize,
    step_count: usize,
}

#[derive(Debug, Deserialize)]
struct SessionMessageRequest {
    text: String,
}

async fn create_session(
    State(state): State<SharedState>,
    Json(payload): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<SessionCreatedResponse>), ApiError> {
    let repo_url = match payload.repo_url.as_deref().map(str::trim) {
        Some(url) if !url.is_empty() => url.to_string(),
        _ => return Err(bad_request("repo_url is required")),
    };
    if !repo_url.starts_with(GITHUB_PREFIX) {
        return Err(bad_request("Only public GitHub HTTPS URLs are supported."));
    }

    match &state.runner {
        RunnerMode::Remote { client } => {
            let created = client.create_session(&repo_url).await.map_err(|e| {
                warn!(error = %e, "Upstream session creation failed");
                (
                    StatusCode::BAD_GATEWAY,
                    Json(ErrorResponse::new(e.to_string())),
                )
            })?;
            Ok((
                StatusCode::CREATED,
                Json(SessionCreatedResponse {
                    session_id: created.session_id,
                    repo_url: created.repo_url,
                    created_at: created.created_at,
                }),
            ))
        }
        RunnerMode::Local { runner } => {
            let session_id = Uuid::new_v4().to_string();
            let workspace = provision_workspace(
                &state,
                runner.as_ref(),
                &session_id,
                &repo_url,
                payload.env_vars.as_ref(),
            )
            .await?;

            let session = RemoteSession::new(&session_id, &repo_url, workspace.to_string_lossy());
            let created_at = session.created_at;
            state.store.create(session).await;
            info!(session_id = %session_id, repo_url = %repo_url, "Session created");

            Ok((
                StatusCode::CREATED,
                Json(SessionCreatedResponse {
                    session_id,
                    repo_url,
                    created_at,
                }),
            ))
        }
    }
}

/// Create the session workspace and clone the repository into it.
async fn provision_workspace(
    state: &SharedState,
    runner: &dyn CommandRunner,
    session_id: &str,
    repo_url: &str,
    env_vars: Option<&HashMap<String, String>>,
) -> Result<PathBuf, ApiError> {
    let root = state.config.runner.resolved_workspace_root();
    if let Err(e) = tokio::fs::create_dir_all(&root).await {
        let err = SessionError::WorkspaceFailed(e.to_string());
        error!(error = %err, "Workspace root unavailable");
        return Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse::new(err.to_string())),
        ));
    }

    let workspace = root.join(session_id);
    let clone_cmd = format!("git clone --depth 1 {repo_url} '{}'", workspace.display());
    let output = runner.run(&clone_cmd, &root).await;
    if output.exit_code != 0 {
        warn!(repo_url = %repo_url, exit_code = output.exit_code, "Clone failed");
        let _ = tokio::fs::remove_dir_all(&workspace).await;
        let err = SessionError::CloneFailed(repo_url.to_string());
        return Err((
            StatusCode::BAD_GATEWAY,
            Json(ErrorResponse::with_detail(err.to_string(), output.stderr)),
        ));
    }

    if let Some(env_vars) = env_vars.filter(|vars| !vars.is_empty()) {
        let dotenv: String = env_vars
            .iter()
            .map(|(key, value)| format!("{key}={value}\n"))
            .collect();
        let write = async {
            tokio::fs::create_dir_all(&workspace).await?;
            tokio::fs::write(workspace.join(".env"), dotenv).await
        };
        if let Err(e) = write.await {
            let err = SessionError::WorkspaceFailed(format!("could not write .env: {e}"));
            return Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new(err.to_string())),
            ));
        }
    }

    Ok(workspace)
}

async fn get_session(
    State(state): State<SharedState>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionSummaryResponse>, ApiError> {
    let Some(session) = state.store.get(&session_id).await else {
        let err = SessionError::NotFound(session_id);
        return Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new(err.to_string())),
        ));
    };

    Ok(Json(SessionSummaryResponse {
        session_id: session.id,
        repo_url: session.repo_url,
        created_at: session.created_at,
        last_activity: session.last_activity,
        message_count: session.messages.len(),
        step_count: session.steps.len(),
    }))
}

async fn delete_session(
    State(state): State<SharedState>,
    Path(session_id): Path<String>,
) -> StatusCode {
    match &state.runner {
        RunnerMode::Local { .. } => {
            if let Some(session) = state.store.get(&session_id).await {
                state.store.delete(&session_id).await;
                // Teardown is best-effort; a failed removal never blocks the 204
                if let Err(e) = tokio::fs::remove_dir_all(&session.workspace).await {
                    warn!(session_id = %session_id, error = %e, "Workspace removal failed");
                }
                info!(session_id = %session_id, "Session deleted");
            }
        }
        RunnerMode::Remote { client } => {
            if let Err(e) = client.terminate_session(&session_id).await {
                warn!(session_id = %session_id, error = %e, "Upstream termination failed");
            }
        }
    }
    StatusCode::NO_CONTENT
}

async fn send_session_message(
    State(state): State<SharedState>,
    Path(session_id): Path<String>,
    Json(payload): Json<SessionMessageRequest>,
) -> Response {
    match &state.runner {
        RunnerMode::Local { runner } => {
            let coder = CoderLoop::new(
                state.provider.clone(),
                state.config.default_model.as_str(),
                state.store.clone(),
                runner.clone(),
            )
            .with_max_rounds(state.config.limits.session_rounds);

            let events = coder.run(&session_id, &payload.text).await;
            agent_event_sse(events)
        }
        RunnerMode::Remote { client } => {
            match client.send_message(&session_id, &payload.text).await {
                Ok(stream) => passthrough_response(stream),
                Err(e) => {
                    warn!(session_id = %session_id, error = %e, "Upstream message relay failed");
                    (
                        StatusCode::BAD_GATEWAY,
                        Json(ErrorResponse::new(e.to_string())),
                    )
                        .into_response()
                }
            }
        }
    }
}

async fn deploy(State(state): State<SharedState>, Json(payload): Json<DeployRequest>) -> Response {
    let repo_url = match resolve_deploy_target(&state, &payload).await {
        Ok(url) => url,
        Err(err) => return err.into_response(),
    };

    match &state.runner {
        RunnerMode::Local { runner } => {
            let (tx, events) = mpsc::channel(64);
            tokio::spawn(run_deploy(
                state.clone(),
                runner.clone(),
                repo_url,
                payload.task,
                tx,
            ));
            deploy_event_sse(events)
        }
        RunnerMode::Remote { client } => {
            let request = DeployRequest {
                repo_url: Some(repo_url),
                paper_id: None,
                project_id: payload.project_id,
                task: payload.task,
            };
            match client.deploy(&request).await {
                Ok(stream) => passthrough_response(stream),
                Err(e) => {
                    warn!(error = %e, "Upstream deploy relay failed");
                    (
                        StatusCode::BAD_GATEWAY,
                        Json(ErrorResponse::new(e.to_string())),
                    )
                        .into_response()
                }
            }
        }
    }
}

/// Resolve a deployment request to a GitHub URL.
///
/// Accepts `repo_url` directly, or a `paper_id`/`project_id` pair naming a
/// paper whose linked repository should be deployed.
async fn resolve_deploy_target(
    state: &SharedState,
    request: &DeployRequest,
) -> Result<String, ApiError> {
    if let Some(url) = request.repo_url.as_deref().map(str::trim) {
        if url.is_empty() {
            return Err(bad_request("repo_url is required"));
        }
        if !url.starts_with(GITHUB_PREFIX) {
            return Err(bad_request("Only public GitHub HTTPS URLs are supported."));
        }
        return Ok(url.to_string());
    }

    let (Some(paper_id), Some(_project_id)) = (&request.paper_id, &request.project_id) else {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::with_detail(
                "repo_url is required",
                "Pass repo_url directly, or paper_id with project_id.",
            )),
        ));
    };

    let paper = state.index.get(paper_id).await.map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse::new(e.to_string())),
        )
    })?;
    let Some(paper) = paper else {
        return Err(bad_request(format!("Paper not found: {paper_id}")));
    };
    let Some(url) = paper.repo_url else {
        return Err(bad_request(format!(
            "Paper {paper_id} has no linked repository"
        )));
    };
    if !url.starts_with(GITHUB_PREFIX) {
        return Err(bad_request("Only public GitHub HTTPS URLs are supported."));
    }
    Ok(url)
}

/// Drive one local deployment run, narrating it as `DeployEvent`s.
///
/// Clone is step 0; a clone failure is a terminal `complete` with status
/// `error`, not a transport error. The nested agent run happens against an
/// ephemeral session that is deleted when the run finishes.
async fn run_deploy(
    state: SharedState,
    runner: Arc<dyn CommandRunner>,
    repo_url: String,
    task: Option<String>,
    tx: mpsc::Sender<DeployEvent>,
) {
    let started = Instant::now();

    if tx
        .send(DeployEvent::Status {
            message: "Cloning repository...".into(),
        })
        .await
        .is_err()
    {
        return;
    }

    let root = state.config.runner.resolved_workspace_root();
    if let Err(e) = tokio::fs::create_dir_all(&root).await {
        let err = SessionError::WorkspaceFailed(e.to_string());
        error!(error = %err, "Deploy workspace unavailable");
        let _ = tx
            .send(DeployEvent::Complete(DeploySummary {
                status: DeployStatus::Error,
                summary: err.to_string(),
                steps: Vec::new(),
                step_count: 0,
                elapsed_seconds: round_tenths(started.elapsed().as_secs_f64()),
                repo_url: Some(repo_url),
            }))
            .await;
        return;
    }

    let session_id = format!("deploy-{}", Uuid::new_v4());
    let workspace = root.join(&session_id);
    let clone_cmd = format!("git clone --depth 1 {repo_url} '{}'", workspace.display());
    let clone = runner.run(&clone_cmd, &root).await;
    if clone.exit_code != 0 {
        warn!(repo_url = %repo_url, exit_code = clone.exit_code, "Deploy clone failed");
        let _ = tx
            .send(DeployEvent::Complete(DeploySummary {
                status: DeployStatus::Error,
                summary: format!("Failed to clone repository: {}", clone.stderr),
                steps: vec![DeployStep {
                    step: 0,
                    command: format!("git clone {repo_url}"),
                    exit_code: clone.exit_code,
                    output: clone.stderr,
                }],
                step_count: 0,
                elapsed_seconds: round_tenths(started.elapsed().as_secs_f64()),
                repo_url: Some(repo_url),
            }))
            .await;
        let _ = tokio::fs::remove_dir_all(&workspace).await;
        return;
    }

    let _ = tx
        .send(DeployEvent::Status {
            message: "Repository cloned. Starting the deployment agent...".into(),
        })
        .await;

    let session = RemoteSession::new(&session_id, &repo_url, workspace.to_string_lossy());
    state.store.create(session).await;

    let budget = state.config.limits.deploy_rounds;
    let coder = CoderLoop::new(
        state.provider.clone(),
        state.config.default_model.as_str(),
        state.store.clone(),
        runner,
    )
    .with_max_rounds(budget);

    let user_task = task.unwrap_or_else(|| default_deploy_task(&repo_url));
    let mut events = coder.run(&session_id, &user_task).await;

    let cap = state.config.runner.max_step_output;
    let mut steps: Vec<DeployStep> = Vec::new();
    let mut outcome: Option<(DeployStatus, String)> = None;
    let mut saw_done = false;

    while let Some(event) = events.recv().await {
        match event {
            AgentEvent::Thinking { .. } | AgentEvent::Command { .. } => {}
            AgentEvent::Output {
                command,
                stdout,
                stderr,
                exit_code,
            } => {
                let combined = format!("exit_code: {exit_code}\nstdout:\n{stdout}\nstderr:\n{stderr}");
                let step = DeployStep {
                    step: steps.len() + 1,
                    command,
                    exit_code,
                    output: truncate_chars(&combined, cap),
                };
                steps.push(step.clone());
                let sent = tx
                    .send(DeployEvent::Step {
                        step: step.step,
                        command: step.command,
                        exit_code: step.exit_code,
                        output: step.output,
                    })
                    .await;
                if sent.is_err() {
                    // Client went away; let the agent turn finish unobserved
                    break;
                }
            }
            AgentEvent::Message { text } => {
                outcome = Some((DeployStatus::Success, text));
            }
            AgentEvent::Error { text } => {
                outcome = Some((DeployStatus::Error, text));
            }
            AgentEvent::Done {} => {
                saw_done = true;
            }
        }
    }

    let (status, summary) = outcome.unwrap_or_else(|| {
        if saw_done {
            (
                DeployStatus::MaxStepsReached,
                format!(
                    "Agent used all {budget} steps without finishing. The repo may partially work — check the steps for details."
                ),
            )
        } else {
            (
                DeployStatus::Error,
                "Deployment stream ended unexpectedly".to_string(),
            )
        }
    });

    info!(
        repo_url = %repo_url,
        status = ?status,
        steps = steps.len(),
        "Deployment finished"
    );

    let _ = tx
        .send(DeployEvent::Complete(DeploySummary {
            status,
            summary,
            step_count: steps.len(),
            steps,
            elapsed_seconds: round_tenths(started.elapsed().as_secs_f64()),
            repo_url: Some(repo_url),
        }))
        .await;

    // The deployment session and workspace are ephemeral
    state.store.delete(&session_id).await;
    if let Err(e) = tokio::fs::remove_dir_all(&workspace).await {
        warn!(session_id = %session_id, error = %e, "Deploy workspace removal failed");
    }
}

fn default_deploy_task(repo_url: &str) -> String {
    format!(
        "Get this repository running: {repo_url}\n\
         Start by reading the README and understanding what the project does, \
         then install dependencies and run it."
    )
}

fn round_tenths(seconds: f64) -> f64 {
    (seconds * 10.0).round() / 10.0
}

fn agent_event_sse(events: mpsc::Receiver<AgentEvent>) -> Response {
    let stream = ReceiverStream::new(events).map(|event| {
        let data = serde_json::to_string(&event).unwrap_or_default();
        Ok::<_, Infallible>(SseEvent::default().event(event.event_type()).data(data))
    });
    Sse::new(stream).into_response()
}

fn deploy_event_sse(events: mpsc::Receiver<DeployEvent>) -> Response {
    let stream = ReceiverStream::new(events).map(|event| {
        let data = serde_json::to_string(&event).unwrap_or_default();
        Ok::<_, Infallible>(SseEvent::default().event(event.event_type()).data(data))
    });
    Sse::new(stream).into_response()
}

/// Forward an upstream SSE byte stream unmodified.
fn passthrough_response(stream: ByteStream) -> Response {
    let body = Body::from_stream(ReceiverStream::new(stream));
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        body,
    )
        .into_response()
}
