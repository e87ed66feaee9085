//! Configuration file handling for relayd
//!
//! Values come from three places, later ones winning: the TOML file, the
//! environment (`PORT`, `CORS_ORIGINS`, `AGENT_URL`), then CLI flags.

use std::path::Path;

use anyhow::{bail, Context, Result};
use relay_api::access::DEFAULT_ORIGIN;
use relay_api::{InvalidOrigin, RouterConfig, DEFAULT_MAX_BODY_BYTES};
use relay_gateway::{AgentEntry, GatewayConfig};
use serde::Deserialize;

/// Backend used when nothing else is configured
pub const DEFAULT_AGENT_URL: &str = "http://localhost:8000";
/// Agent registered when the configuration names none
pub const DEFAULT_AGENT_ID: &str = "sample_agent";

/// Root of the relayd configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub cors: CorsConfig,
    pub backend: BackendConfig,
    pub agents: Vec<AgentConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 4000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Browser origins allowed to call the relay
    pub origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            origins: vec![DEFAULT_ORIGIN.to_string()],
        }
    }
}

/// Settings shared by every agent backend
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Base URL for agents that do not set their own
    pub url: Option<String>,
    /// Bearer token sent when neither the caller nor the agent supplies one
    pub auth_token: Option<String>,
    pub first_fragment_timeout_ms: u64,
    pub connect_timeout_ms: u64,
    pub stream_buffer: usize,
    pub max_body_bytes: usize,
}

impl Default for BackendConfig {
    fn default() -> Self {
        let gateway = GatewayConfig::default();
        Self {
            url: None,
            auth_token: None,
            first_fragment_timeout_ms: gateway.first_fragment_timeout_ms,
            connect_timeout_ms: gateway.connect_timeout_ms,
            stream_buffer: gateway.stream_buffer,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

/// One `[[agents]]` table
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    pub id: String,
    /// Base URL; falls back to `[backend].url`
    #[serde(default)]
    pub url: Option<String>,
    /// Path suffix appended to the base URL
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// Overrides `[backend].auth_token` for this agent
    #[serde(default)]
    pub auth_token: Option<String>,
}

impl Config {
    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Apply environment overrides, reading variables through `var`
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(port) = var("PORT") {
            self.server.port = port
                .trim()
                .parse()
                .with_context(|| format!("PORT is not a valid port number: '{}'", port))?;
        }
        if let Some(origins) = var("CORS_ORIGINS") {
            self.cors.origins = origins
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(url) = var("AGENT_URL").filter(|u| !u.trim().is_empty()) {
            self.backend.url = Some(url);
        }
        Ok(())
    }

    /// Raw registry entries, with each agent's base URL and credential resolved.
    ///
    /// With no `[[agents]]` at all, a single `sample_agent` pointing at
    /// `[backend].url` (or the local default) is registered.
    pub fn registry_entries(&self) -> Result<Vec<AgentEntry>> {
        if self.agents.is_empty() {
            let url = self.backend.url.as_deref().unwrap_or(DEFAULT_AGENT_URL);
            tracing::info!(agent = DEFAULT_AGENT_ID, url, "No agents configured, using default");
            return Ok(vec![AgentEntry::new(DEFAULT_AGENT_ID, url)
                .with_description("A helpful assistant agent.")]);
        }

        let mut entries = Vec::with_capacity(self.agents.len());
        for agent in &self.agents {
            let Some(url) = agent.url.as_ref().or(self.backend.url.as_ref()) else {
                bail!(
                    "Agent '{}' has no url and no [backend].url is configured",
                    agent.id
                );
            };
            entries.push(AgentEntry {
                id: agent.id.clone(),
                url: url.clone(),
                path: agent.path.clone(),
                description: agent.description.clone(),
                credential: agent.auth_token.clone(),
            });
        }
        Ok(entries)
    }

    pub fn gateway_config(&self) -> GatewayConfig {
        GatewayConfig::default()
            .with_credential(self.backend.auth_token.clone())
            .with_first_fragment_timeout_ms(self.backend.first_fragment_timeout_ms)
            .with_connect_timeout_ms(self.backend.connect_timeout_ms)
            .with_stream_buffer(self.backend.stream_buffer)
    }

    pub fn router_config(&self) -> std::result::Result<RouterConfig, InvalidOrigin> {
        let config = RouterConfig::new(self.cors.origins.as_slice())?;
        Ok(config.with_max_body_bytes(self.backend.max_body_bytes))
    }
}
