//! Aggregation relay: collapse a deployment stream into its result.
//!
//! The deploy tool does not narrate progress to anyone; it needs the run's
//! outcome as a value. This mode consumes the whole event stream, buffers
//! `step` events, and parses the terminal `complete` payload. A stream that
//! ends without `complete` is an inner-agent non-termination and fails the
//! tool call: buffered steps alone are never promoted to a result.

use tracing::{trace, warn};

use paperstack_core::error::RelayError;
use paperstack_core::event::{DeployStep, DeploySummary};
use paperstack_core::sse::{Frame, SseDecoder};

use crate::client::ByteStream;

/// Incremental aggregator over a deployment SSE byte stream.
#[derive(Debug, Default)]
pub struct StepAggregator {
    decoder: SseDecoder,
    steps: Vec<DeployStep>,
    complete: Option<DeploySummary>,
    events_seen: usize,
}

impl StepAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw stream bytes. Chunk boundaries are irrelevant.
    pub fn feed(&mut self, bytes: &[u8]) {
        for frame in self.decoder.feed(bytes) {
            self.apply(frame);
        }
    }

    /// End of stream. Returns the terminal summary, or fails if no
    /// `complete` event ever arrived.
    pub fn finish(mut self) -> Result<DeploySummary, RelayError> {
        if let Some(frame) = self.decoder.finish() {
            self.apply(frame);
        }

        let Some(mut summary) = self.complete.take() else {
            return Err(RelayError::MissingComplete {
                events_seen: self.events_seen,
            });
        };

        // The terminal payload is authoritative. Streamed steps only fill
        // the step list when the payload carries none.
        if summary.steps.is_empty() && !self.steps.is_empty() {
            self.steps.sort_by_key(|s| s.step);
            summary.step_count = self.steps.len();
            summary.steps = std::mem::take(&mut self.steps);
        }
        Ok(summary)
    }

    fn apply(&mut self, frame: Frame) {
        self.events_seen += 1;
        match frame.event.as_str() {
            "step" => match frame.parse_data::<DeployStep>() {
                Ok(step) => self.push_step(step),
                Err(e) => warn!(error = %e, data = %frame.data, "Skipping malformed step event"),
            },
            "complete" => match frame.parse_data::<DeploySummary>() {
                // If the stream carries several, the last one wins.
                Ok(summary) => self.complete = Some(summary),
                Err(e) => {
                    warn!(error = %e, data = %frame.data, "Skipping malformed complete event");
                }
            },
            "status" => trace!(data = %frame.data, "Deploy progress"),
            other => trace!(event = other, "Ignoring unrecognized deploy event"),
        }
    }

    fn push_step(&mut self, step: DeployStep) {
        // A re-sent step number replaces the earlier copy.
        if let Some(existing) = self.steps.iter_mut().find(|s| s.step == step.step) {
            *existing = step;
        } else {
            self.steps.push(step);
        }
    }
}

/// Drain a relayed byte stream down to its terminal summary.
pub async fn aggregate_stream(mut stream: ByteStream) -> Result<DeploySummary, RelayError> {
    let mut aggregator = StepAggregator::new();
    while let Some(chunk) = stream.recv().await {
        aggregator.feed(&chunk?);
    }
    aggregator.finish()
}
