//! Relay layer between this process and a remote runner.
//!
//! Two modes over the same upstream byte stream:
//! - **pass-through** forwards raw bytes to the end client unchanged;
//! - **aggregate** consumes the stream and reduces it to the terminal
//!   deployment summary.

pub mod aggregate;
pub mod client;
pub mod passthrough;

pub use aggregate::{StepAggregator, aggregate_stream};
pub use client::{ByteStream, CreatedSession, DeployRequest, RunnerClient};
pub use passthrough::forward_raw;
