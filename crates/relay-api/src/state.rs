//! Application state for the relay API

use std::sync::Arc;

use relay_gateway::{AgentRegistry, Gateway};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    gateway: Arc<Gateway>,
}

impl AppState {
    pub fn new(gateway: Gateway) -> Self {
        Self {
            gateway: Arc::new(gateway),
        }
    }

    pub fn gateway(&self) -> &Gateway {
        &self.gateway
    }

    pub fn registry(&self) -> &AgentRegistry {
        self.gateway.registry()
    }
}
