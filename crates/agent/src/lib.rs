//! The conversation loop controllers at the heart of Paperstack.
//!
//! Two loops share the same skeleton (send history, maybe execute tools,
//! repeat until a plain-text answer or the round limit):
//!
//! 1. [`ChatLoop`]: the blocking research-assistant turn. Drives the full
//!    tool registry, returns one [`ChatOutcome`] when the turn settles.
//! 2. [`CoderLoop`]: the narrated coding-agent turn. Drives a single
//!    `execute_command` capability against a remote session and streams
//!    [`AgentEvent`](paperstack_core::event::AgentEvent)s as it works.
//!
//! Both report their progress through the shared [`LoopPhase`] state
//! machine, so logs read the same whichever loop produced them.

pub mod coder;
pub mod loop_runner;
pub mod phase;

pub use coder::{coder_system_prompt, execute_command_definition, CoderLoop};
pub use loop_runner::{ChatLoop, ChatOutcome, Termination};
pub use phase::{LoopPhase, PhaseTracker};

#[cfg(test)]
pub(crate) mod test_helpers;
