//! relay-gateway - Routing gateway for agent backends
//!
//! The gateway receives every inbound agent request on one public endpoint,
//! resolves the requested agent through the [`AgentRegistry`] and forwards
//! the request to that agent's backend. Responses come back in the shape the
//! backend produced them: a single body stays a single body, a stream is
//! relayed fragment by fragment.
//!
//! # Architecture
//!
//! ```text
//!  caller ──► Gateway::handle ──► AgentRegistry::resolve
//!                  │
//!                  ▼
//!          reqwest (one attempt) ──────────────► agent backend
//!                  │                                   │
//!                  │   single body  ◄──────────────────┤
//!                  │                                   │
//!                  │   byte stream  ◄──────────────────┘
//!                  ▼
//!            relay task ──► bounded mpsc ──► FragmentStream ──► caller
//! ```
//!
//! The relay task stops pulling from the backend as soon as the caller's
//! side of the channel is dropped, which tears down the outbound connection.
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use relay_core::{AgentEntry, AgentRegistry};
//! use relay_gateway::{Gateway, GatewayConfig, GatewayResponse, InboundRequest};
//!
//! let registry = AgentRegistry::build([AgentEntry::new("sample_agent", "http://localhost:8000")])?;
//! let gateway = Gateway::new(Arc::new(registry), GatewayConfig::default())?;
//!
//! let request = InboundRequest::new(Method::POST, headers, body).with_agent("sample_agent");
//! match gateway.handle(request).await? {
//!     GatewayResponse::Complete { body, .. } => { /* one message */ }
//!     GatewayResponse::Stream { fragments, .. } => { /* fragments in arrival order */ }
//! }
//! ```

mod config;
mod error;
mod gateway;
mod relay;
mod request;
mod response;

pub use config::GatewayConfig;
pub use error::{FragmentError, GatewayError, GatewayResult};
pub use gateway::{AgentHealth, Gateway};
pub use request::InboundRequest;
pub use response::{FragmentStream, GatewayResponse};

// Re-export registry types for convenience
pub use relay_core::{AgentEndpoint, AgentEntry, AgentId, AgentRegistry, ConfigError};
