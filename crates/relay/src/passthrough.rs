//! Pass-through relay: raw bytes in, raw bytes out.
//!
//! Used when this process sits between a remote runner and the end client.
//! Nothing is parsed, so frame boundaries and chunk boundaries need not
//! coincide; the downstream decoder reassembles frames itself.

use futures::{Stream, StreamExt};
use tokio::sync::mpsc;

use paperstack_core::error::RelayError;

/// Forwards upstream chunks to a channel unmodified.
///
/// Stops when the upstream ends, the upstream fails (the error is forwarded
/// first), or the receiver hangs up.
pub async fn forward_raw<S, E>(mut upstream: S, tx: mpsc::Sender<Result<Vec<u8>, RelayError>>)
where
    S: Stream<Item = Result<Vec<u8>, E>> + Unpin,
    E: std::fmt::Display,
{
    while let Some(chunk) = upstream.next().await {
        let item = chunk.map_err(|e| RelayError::Upstream(e.to_string()));
        let failed = item.is_err();
        if tx.send(item).await.is_err() || failed {
            return;
        }
    }
}
