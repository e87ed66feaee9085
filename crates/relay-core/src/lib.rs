//! relay-core - Agent registry for the agent relay
//!
//! This crate holds the leaf component of the relay: a lookup table from an
//! agent identifier to the backend endpoint that serves it. The registry is
//! built once from configuration and never changes afterwards, so it can be
//! shared by every in-flight request without locking.
//!
//! # Usage
//!
//! ```
//! use relay_core::{AgentEntry, AgentRegistry};
//!
//! let registry = AgentRegistry::build([
//!     AgentEntry::new("sample_agent", "http://backend:8000/a"),
//!     AgentEntry::new("joke_agent", "http://backend:8000").with_path("/b"),
//! ])?;
//!
//! let endpoint = registry.resolve("joke_agent")?;
//! assert_eq!(endpoint.target().as_str(), "http://backend:8000/b");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod agent;
pub mod error;
pub mod registry;

pub use agent::{AgentEndpoint, AgentEntry, AgentId};
pub use error::{ConfigError, UnknownAgent};
pub use registry::{AgentRegistry, RegisteredAgent};
