//! Gateway error types

use std::error::Error as StdError;

use relay_core::UnknownAgent;
use thiserror::Error;

/// Result type for gateway operations
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Per-request failures.
///
/// None of these outlive the request that produced them; the registry and
/// other in-flight exchanges are unaffected.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// The request does not say which agent it is for
    #[error("Request does not name a target agent")]
    MissingAgent,

    /// No registry entry for the named agent
    #[error("Agent '{0}' not found")]
    UnknownAgent(String),

    /// Backend could not be reached, or failed before sending anything
    #[error("Backend for agent '{agent}' is unavailable: {reason}")]
    BackendUnavailable { agent: String, reason: String },

    /// Backend sent nothing within the first-fragment limit
    #[error("Backend for agent '{agent}' sent no response within {waited_ms} ms")]
    BackendTimeout { agent: String, waited_ms: u64 },
}

impl GatewayError {
    /// Returns the HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            GatewayError::MissingAgent => 400,
            GatewayError::UnknownAgent(_) => 404,
            GatewayError::BackendUnavailable { .. } => 502,
            GatewayError::BackendTimeout { .. } => 504,
        }
    }

    /// The agent identifier involved, when there is one
    pub fn agent(&self) -> Option<&str> {
        match self {
            GatewayError::MissingAgent => None,
            GatewayError::UnknownAgent(agent)
            | GatewayError::BackendUnavailable { agent, .. }
            | GatewayError::BackendTimeout { agent, .. } => Some(agent),
        }
    }

    pub(crate) fn unavailable(agent: &str, err: &reqwest::Error) -> Self {
        GatewayError::BackendUnavailable {
            agent: agent.to_string(),
            reason: describe(err),
        }
    }
}

impl From<UnknownAgent> for GatewayError {
    fn from(err: UnknownAgent) -> Self {
        GatewayError::UnknownAgent(err.0)
    }
}

/// Abnormal end of a relayed stream.
///
/// Emitted as the last item of a [`FragmentStream`](crate::FragmentStream)
/// when the backend fails after at least one fragment went out. The HTTP
/// layer turns it into an aborted body rather than a clean end of stream.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FragmentError {
    #[error("Stream from agent '{agent}' ended abnormally: {reason}")]
    Interrupted { agent: String, reason: String },
}

/// Render a reqwest error with its source chain.
///
/// reqwest's own message is usually just "error sending request"; the
/// useful part (connection refused, reset by peer) sits in the sources.
pub(crate) fn describe(err: &reqwest::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
