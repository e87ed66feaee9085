//! relay-api - HTTP surface of the agent relay
//!
//! Maps the public `/copilotkit` endpoint onto a [`Gateway`](relay_gateway::Gateway).
//! Everything that is not agent traffic (access control, body limits,
//! listing, health) lives here so the gateway itself stays transport-agnostic.
//!
//! # Usage
//!
//! ```ignore
//! use relay_api::{create_router, AppState, RouterConfig};
//!
//! let state = AppState::new(gateway);
//! let config = RouterConfig::new(&["http://localhost:5173"])?;
//! let router = create_router(state, &config);
//! axum::serve(listener, router).await?;
//! ```

pub mod access;
pub mod error;
pub mod handlers;
pub mod state;
pub mod testing;

pub use access::{AccessPolicy, InvalidOrigin};
pub use error::ApiError;
pub use state::AppState;

use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{any, get};
use axum::Router;
use tower_http::trace::TraceLayer;

/// Public path agent traffic arrives on
pub const RELAY_PATH: &str = "/copilotkit";

/// Default cap on inbound request bodies (10 MiB)
pub const DEFAULT_MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Settings for the HTTP surface
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Origins browsers may call the relay from
    pub access: AccessPolicy,
    /// Largest request body accepted, in bytes
    pub max_body_bytes: usize,
}

impl RouterConfig {
    /// Allow-list the given origins, with the default body limit
    pub fn new<S: AsRef<str>>(origins: &[S]) -> Result<Self, InvalidOrigin> {
        Ok(Self {
            access: AccessPolicy::from_origins(origins)?,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        })
    }

    pub fn with_max_body_bytes(mut self, bytes: usize) -> Self {
        self.max_body_bytes = bytes;
        self
    }
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            access: AccessPolicy::default(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

/// Create the relay router with the given application state
pub fn create_router(state: AppState, config: &RouterConfig) -> Router {
    Router::new()
        // Liveness of the relay itself
        .route("/health", get(|| async { "OK" }))
        // Agent named in the payload
        .route(RELAY_PATH, any(handlers::relay::relay))
        // Registry listing; takes precedence over an agent called "agents"
        .route("/copilotkit/agents", get(handlers::agents::list_agents))
        // Agent named in the path
        .route("/copilotkit/{agent_id}", any(handlers::relay::relay_to_agent))
        .route(
            "/copilotkit/{agent_id}/health",
            get(handlers::agents::agent_health),
        )
        .layer(DefaultBodyLimit::max(config.max_body_bytes))
        .layer(middleware::from_fn_with_state(
            config.access.clone(),
            access::origin_guard,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(config.access.cors_layer())
        .with_state(state)
}
