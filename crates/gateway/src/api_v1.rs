//! The general chat endpoint.
//!
//! `POST /v1/chat` runs one blocking research turn: the whole tool loop
//! completes server-side and the reply comes back as plain JSON. History
//! lives in an in-memory conversation map capped at
//! `gateway.max_conversations`; when the cap is hit, the oldest
//! conversation by creation time is evicted to make room.

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use paperstack_agent::{ChatLoop, Termination};
use paperstack_core::message::Conversation;

use crate::SharedState;

/// System prompt for the research loop. Sent on the wire every round,
/// never stored in conversations. The command-line client uses the same
/// prompt so both chat surfaces behave identically.
pub const RESEARCH_SYSTEM_PROMPT: &str = "\
You are a research assistant for arXiv papers. You help users find papers, \
understand them, and get their linked code running.

You have tools to search the paper catalog, fetch details for a specific \
paper, search a project's indexed documents, run a deeper multi-step \
research pass, save notes, and deploy a paper's repository in a sandbox.

Guidelines:
- Search before you answer. Cite arXiv ids (like 2601.03112) when you mention papers.
- Stay grounded in tool results. If a search comes back empty, say so.
- Deployments take minutes; only deploy when the user asks for it.
- Be concise. Lead with the most relevant papers.";

/// Standard error body: `{ error, detail? }`.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ErrorResponse {
    pub(crate) fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            detail: None,
        }
    }

    pub(crate) fn with_detail(error: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            detail: Some(detail.into()),
        }
    }
}

pub(crate) type ApiError = (StatusCode, Json<ErrorResponse>);

pub(crate) fn bad_request(error: impl Into<String>) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(ErrorResponse::new(error)))
}

pub fn routes() -> Router<SharedState> {
    Router::new().route("/chat", post(chat_handler))
}

#[derive(Debug, Deserialize)]
struct ChatRequest {
    message: String,
    #[serde(default)]
    conversation_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct ChatResponse {
    conversation_id: String,
    reply: String,
    rounds: usize,
    termination: Termination,
}

async fn chat_handler(
    State(state): State<SharedState>,
    Json(payload): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    if payload.message.trim().is_empty() {
        return Err(bad_request("Message is required"));
    }

    let conv_id = payload
        .conversation_id
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    // Clone the conversation out so the map is not locked across the turn.
    let mut conversation = {
        let mut conversations = state.conversations.write().await;
        if conversations.len() >= state.config.gateway.max_conversations
            && !conversations.contains_key(&conv_id)
        {
            if let Some(oldest_key) = conversations
                .iter()
                .min_by_key(|(_, c)| c.created_at)
                .map(|(k, _)| k.clone())
            {
                info!(conversation_id = %oldest_key, "Evicting oldest conversation");
                conversations.remove(&oldest_key);
            }
        }
        conversations
            .entry(conv_id.clone())
            .or_insert_with(|| Conversation::with_id(conv_id.clone()))
            .clone()
    };

    let chat = ChatLoop::new(
        state.provider.clone(),
        state.config.default_model.as_str(),
        state.config.default_temperature,
        state.tools.clone(),
        RESEARCH_SYSTEM_PROMPT,
    )
    .with_max_rounds(state.config.limits.chat_rounds)
    .with_max_tokens(state.config.default_max_tokens);

    let outcome = chat
        .process(&mut conversation, &payload.message)
        .await
        .map_err(|e| {
            warn!(conversation_id = %conv_id, error = %e, "Chat turn failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new(e.to_string())),
            )
        })?;

    // A concurrent turn on the same id may have raced us; last write wins.
    state
        .conversations
        .write()
        .await
        .insert(conv_id.clone(), conversation);

    Ok(Json(ChatResponse {
        conversation_id: conv_id,
        reply: outcome.reply,
        rounds: outcome.rounds,
        termination: outcome.termination,
    }))
}
