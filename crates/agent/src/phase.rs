//! Loop phase tracking.
//!
//! Both conversation loops step through an explicit phase machine so their
//! termination conditions are observable in logs and testable on their own.
//! `ExecutingTools` is the blocking loop's execution phase; `Streaming` is
//! its narrated counterpart, where command execution interleaves with event
//! emission.

use tracing::debug;

/// Where a conversation loop currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopPhase {
    /// A completion call is in flight.
    AwaitingModel,
    /// Tool calls from the last response are being executed.
    ExecutingTools,
    /// Events for the current round are being emitted to the client.
    Streaming,
    /// The loop terminated normally.
    Done,
    /// The loop aborted on an upstream failure.
    Error,
}

impl LoopPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AwaitingModel => "awaiting_model",
            Self::ExecutingTools => "executing_tools",
            Self::Streaming => "streaming",
            Self::Done => "done",
            Self::Error => "error",
        }
    }

    /// Terminal phases admit no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Error)
    }
}

impl std::fmt::Display for LoopPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tracks one loop's phase and logs every transition.
#[derive(Debug)]
pub struct PhaseTracker {
    loop_name: &'static str,
    phase: LoopPhase,
}

impl PhaseTracker {
    /// A fresh tracker; every loop starts by awaiting the model.
    pub fn new(loop_name: &'static str) -> Self {
        Self {
            loop_name,
            phase: LoopPhase::AwaitingModel,
        }
    }

    pub fn current(&self) -> LoopPhase {
        self.phase
    }

    /// Move to `next`, logging the transition. Re-entering the current
    /// phase is a no-op.
    pub fn transition(&mut self, next: LoopPhase) {
        if self.phase == next {
            return;
        }
        debug_assert!(
            !self.phase.is_terminal(),
            "transition out of terminal phase {}",
            self.phase
        );
        debug!(
            loop_name = self.loop_name,
            from = %self.phase,
            to = %next,
            "Loop phase transition"
        );
        self.phase = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_awaiting_model() {
        let tracker = PhaseTracker::new("chat");
        assert_eq!(tracker.current(), LoopPhase::AwaitingModel);
    }

    #[test]
    fn transition_updates_phase() {
        let mut tracker = PhaseTracker::new("chat");
        tracker.transition(LoopPhase::ExecutingTools);
        assert_eq!(tracker.current(), LoopPhase::ExecutingTools);
        tracker.transition(LoopPhase::AwaitingModel);
        tracker.transition(LoopPhase::Done);
        assert_eq!(tracker.current(), LoopPhase::Done);
    }

    #[test]
    fn same_phase_transition_is_noop() {
        let mut tracker = PhaseTracker::new("coder");
        tracker.transition(LoopPhase::AwaitingModel);
        assert_eq!(tracker.current(), LoopPhase::AwaitingModel);
    }

    #[test]
    fn terminal_phases() {
        assert!(LoopPhase::Done.is_terminal());
        assert!(LoopPhase::Error.is_terminal());
        assert!(!LoopPhase::AwaitingModel.is_terminal());
        assert!(!LoopPhase::ExecutingTools.is_terminal());
        assert!(!LoopPhase::Streaming.is_terminal());
    }

    #[test]
    fn phase_names_are_snake_case() {
        assert_eq!(LoopPhase::AwaitingModel.as_str(), "awaiting_model");
        assert_eq!(LoopPhase::ExecutingTools.as_str(), "executing_tools");
        assert_eq!(LoopPhase::Streaming.as_str(), "streaming");
        assert_eq!(LoopPhase::Done.to_string(), "done");
        assert_eq!(LoopPhase::Error.to_string(), "error");
    }
}
