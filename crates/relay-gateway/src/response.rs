//! Gateway responses

use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::Stream;
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::error::FragmentError;

/// What the backend sent, in the shape it sent it
#[derive(Debug)]
pub enum GatewayResponse {
    /// A single, fully received message
    Complete {
        status: StatusCode,
        headers: HeaderMap,
        body: Bytes,
    },
    /// An incremental response, relayed fragment by fragment
    Stream {
        status: StatusCode,
        headers: HeaderMap,
        fragments: FragmentStream,
    },
}

impl GatewayResponse {
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayResponse::Complete { status, .. } | GatewayResponse::Stream { status, .. } => {
                *status
            }
        }
    }

    pub fn headers(&self) -> &HeaderMap {
        match self {
            GatewayResponse::Complete { headers, .. }
            | GatewayResponse::Stream { headers, .. } => headers,
        }
    }

    pub fn is_stream(&self) -> bool {
        matches!(self, GatewayResponse::Stream { .. })
    }
}

/// Fragments of one relayed stream, in backend arrival order.
///
/// Ends with `None` when the backend finished cleanly, or with a single
/// `Err(FragmentError)` followed by `None` when it failed mid-stream.
/// Dropping the stream cancels the backend exchange.
pub struct FragmentStream {
    inner: ReceiverStream<Result<Bytes, FragmentError>>,
}

impl FragmentStream {
    pub(crate) fn new(receiver: mpsc::Receiver<Result<Bytes, FragmentError>>) -> Self {
        Self {
            inner: ReceiverStream::new(receiver),
        }
    }
}

impl Stream for FragmentStream {
    type Item = Result<Bytes, FragmentError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

impl fmt::Debug for FragmentStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FragmentStream").finish_non_exhaustive()
    }
}
