//! Error types for the Paperstack domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all Paperstack operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Session errors ---
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    // --- Relay errors ---
    #[error("Relay error: {0}")]
    Relay(#[from] RelayError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError {
        status_code: u16,
        message: String,
    },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

/// Errors from the remote session store and sandbox lifecycle.
///
/// `NotFound` is the "session expired" condition; callers surface it as a
/// distinct user-facing message, never as a crash.
#[derive(Debug, Clone, Error)]
pub enum SessionError {
    #[error("Session not found: {0} (it may have expired)")]
    NotFound(String),

    #[error("Workspace setup failed: {0}")]
    WorkspaceFailed(String),

    #[error("Repository clone failed: {0}")]
    CloneFailed(String),
}

/// Errors from the pass-through/aggregation relay.
#[derive(Debug, Clone, Error)]
pub enum RelayError {
    #[error("Upstream stream failed: {0}")]
    Upstream(String),

    /// The inner agent's stream ended without a terminal `complete` event.
    /// Never mistaken for success.
    #[error("Stream ended without a complete event after {events_seen} events")]
    MissingComplete { events_seen: usize },

    #[error("Malformed event payload: {0}")]
    Malformed(String),
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Tool timed out: {tool_name} after {timeout_secs}s")]
    Timeout { tool_name: String, timeout_secs: u64 },

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),
}
