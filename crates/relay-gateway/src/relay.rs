//! Stream relay task
//!
//! Couples the backend byte stream to the caller through a bounded channel.
//! The task only pulls the next fragment once the previous one is queued,
//! so a slow caller slows the backend down instead of growing a buffer.

use std::fmt::Display;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::FragmentError;
use crate::response::FragmentStream;

/// Spawn the relay for one exchange.
///
/// `first` has already been read from the backend; `upstream` yields the
/// rest. The upstream stream is dropped, and with it the backend
/// connection, as soon as the returned [`FragmentStream`] goes away.
pub(crate) fn spawn_relay<S, E>(
    agent: String,
    first: Bytes,
    upstream: S,
    capacity: usize,
) -> FragmentStream
where
    S: Stream<Item = Result<Bytes, E>> + Send + Unpin + 'static,
    E: Display + Send + 'static,
{
    let (tx, rx) = mpsc::channel(capacity.max(1));
    tokio::spawn(relay_fragments(agent, first, upstream, tx));
    FragmentStream::new(rx)
}

async fn relay_fragments<S, E>(
    agent: String,
    first: Bytes,
    mut upstream: S,
    tx: mpsc::Sender<Result<Bytes, FragmentError>>,
) where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    E: Display,
{
    if tx.send(Ok(first)).await.is_err() {
        debug!(agent = %agent, "Caller disconnected before the first fragment, cancelling backend stream");
        return;
    }
    let mut relayed: u64 = 1;

    loop {
        // Watch the caller while waiting on a possibly silent backend.
        let next = tokio::select! {
            biased;
            _ = tx.closed() => {
                debug!(agent = %agent, relayed, "Caller disconnected, cancelling backend stream");
                return;
            }
            next = upstream.next() => next,
        };

        match next {
            Some(Ok(chunk)) if chunk.is_empty() => continue,
            Some(Ok(chunk)) => {
                if tx.send(Ok(chunk)).await.is_err() {
                    debug!(agent = %agent, relayed, "Caller disconnected, cancelling backend stream");
                    return;
                }
                relayed += 1;
            }
            Some(Err(e)) => {
                warn!(agent = %agent, relayed, error = %e, "Backend stream failed mid-relay");
                let _ = tx
                    .send(Err(FragmentError::Interrupted {
                        agent: agent.clone(),
                        reason: e.to_string(),
                    }))
                    .await;
                return;
            }
            None => {
                debug!(agent = %agent, relayed, "Backend stream complete");
                return;
            }
        }
    }
}
