//! Registry error types

use thiserror::Error;

/// Errors raised while building the registry from configuration.
///
/// These are fatal at startup: a process holding a half-valid registry
/// must not begin serving.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// Agent identifier is empty or whitespace
    #[error("Agent entry #{position} has an empty identifier")]
    EmptyIdentifier {
        /// Zero-based position of the entry in the configuration
        position: usize,
    },

    /// The same identifier appears more than once
    #[error("Duplicate agent identifier: {0}")]
    DuplicateIdentifier(String),

    /// Endpoint is not a usable backend address
    #[error("Invalid endpoint for agent '{id}': {reason}")]
    InvalidEndpoint {
        /// Agent the endpoint belongs to
        id: String,
        /// Why the address was rejected
        reason: String,
    },
}

/// No registry entry matches the requested identifier
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Agent '{0}' not found")]
pub struct UnknownAgent(pub String);

impl UnknownAgent {
    /// The identifier that failed to resolve
    pub fn agent(&self) -> &str {
        &self.0
    }
}
