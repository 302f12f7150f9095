//! # Paperstack Core
//!
//! Domain types, traits, and error definitions for the Paperstack research
//! assistant runtime. This crate has **zero framework dependencies**; it
//! defines the domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every subsystem is defined as a trait here. Implementations live in their
//! respective crates. This enables:
//! - Swapping implementations via configuration
//! - Easy testing with mock/stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod error;
pub mod event;
pub mod message;
pub mod provider;
pub mod runner;
pub mod session;
pub mod sse;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use error::{Error, Result};
pub use event::{AgentEvent, DeployEvent, DeployStatus, DeployStep, DeploySummary};
pub use message::{Conversation, ConversationId, Message, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse, StreamChunk};
pub use runner::{CommandOutput, CommandRunner};
pub use session::{CommandStep, RemoteSession, SessionStore};
pub use sse::{Frame, SseDecoder};
pub use tool::{Tool, ToolCall, ToolRegistry, ToolResult};
