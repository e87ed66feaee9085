//! Immutable agent registry

use std::collections::HashMap;

use tracing::debug;

use crate::agent::{AgentEndpoint, AgentEntry, AgentId};
use crate::error::{ConfigError, UnknownAgent};

/// An agent as held by the registry
#[derive(Debug, Clone)]
pub struct RegisteredAgent {
    id: AgentId,
    endpoint: AgentEndpoint,
    description: Option<String>,
}

impl RegisteredAgent {
    pub fn id(&self) -> &AgentId {
        &self.id
    }

    pub fn endpoint(&self) -> &AgentEndpoint {
        &self.endpoint
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }
}

/// Lookup table from agent identifier to backend endpoint.
///
/// Built once with [`AgentRegistry::build`] and read-only afterwards: there
/// is no way to add, remove or change an entry. Share it behind an `Arc`.
#[derive(Debug, Clone, Default)]
pub struct AgentRegistry {
    /// Agents in configuration order
    agents: Vec<RegisteredAgent>,
    /// Identifier -> position in `agents`
    index: HashMap<AgentId, usize>,
}

impl AgentRegistry {
    /// Build a registry from raw configuration entries.
    ///
    /// Fails on the first entry with a blank identifier, a repeated
    /// identifier, or an endpoint that is not a well-formed address.
    pub fn build<I>(entries: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = AgentEntry>,
    {
        let mut agents = Vec::new();
        let mut index = HashMap::new();

        for (position, entry) in entries.into_iter().enumerate() {
            let id = AgentId::new(entry.id).ok_or(ConfigError::EmptyIdentifier { position })?;
            if index.contains_key(&id) {
                return Err(ConfigError::DuplicateIdentifier(id.into_string()));
            }

            let endpoint = AgentEndpoint::parse(id.as_str(), &entry.url, entry.path.as_deref())?
                .with_credential(entry.credential);

            debug!(agent = %id, target = %endpoint, "Registered agent");

            index.insert(id.clone(), agents.len());
            agents.push(RegisteredAgent {
                id,
                endpoint,
                description: entry.description,
            });
        }

        Ok(Self { agents, index })
    }

    /// Resolve an identifier to its endpoint
    pub fn resolve(&self, id: &str) -> Result<&AgentEndpoint, UnknownAgent> {
        self.index
            .get(id)
            .map(|&i| &self.agents[i].endpoint)
            .ok_or_else(|| UnknownAgent(id.to_string()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Registered agents in configuration order
    pub fn agents(&self) -> impl Iterator<Item = &RegisteredAgent> {
        self.agents.iter()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}
