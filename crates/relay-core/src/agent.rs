//! Agent identifiers and backend endpoints

use std::borrow::Borrow;
use std::fmt;

use url::Url;

use crate::error::ConfigError;

/// Stable identifier of an agent, unique within a registry.
///
/// Identifiers are opaque: the relay never interprets them beyond exact
/// string comparison. The only invariant is that they are not blank.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AgentId(String);

impl AgentId {
    /// Wrap a raw identifier, rejecting empty or whitespace-only strings
    pub fn new(raw: impl Into<String>) -> Option<Self> {
        let raw = raw.into();
        if raw.trim().is_empty() {
            None
        } else {
            Some(Self(raw))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for AgentId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for AgentId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// One raw registry entry, as read from configuration.
///
/// Nothing is validated here; [`AgentRegistry::build`](crate::AgentRegistry::build)
/// checks every entry and rejects the whole set if any of them is bad.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AgentEntry {
    /// Agent identifier
    pub id: String,
    /// Base URL of the backend serving this agent
    pub url: String,
    /// Optional path suffix appended to the base URL
    pub path: Option<String>,
    /// Human-readable description, shown in the agent listing
    pub description: Option<String>,
    /// Credential attached as a bearer token when the caller sends none
    pub credential: Option<String>,
}

impl AgentEntry {
    pub fn new(id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_credential(mut self, credential: impl Into<String>) -> Self {
        self.credential = Some(credential.into());
        self
    }
}

/// Validated network address of an agent backend.
///
/// The forwarding target is the base URL with the optional path suffix
/// appended. Both are fixed once the registry is built.
#[derive(Clone, PartialEq, Eq)]
pub struct AgentEndpoint {
    base: Url,
    path: Option<String>,
    target: Url,
    credential: Option<String>,
}

impl AgentEndpoint {
    /// Validate a base URL and optional path suffix for agent `id`.
    ///
    /// Only absolute `http`/`https` URLs without query or fragment are
    /// accepted, and the suffix may not carry a query or fragment either.
    pub fn parse(id: &str, url: &str, path: Option<&str>) -> Result<Self, ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidEndpoint {
            id: id.to_string(),
            reason,
        };

        let base = Url::parse(url.trim()).map_err(|e| invalid(format!("'{}': {}", url, e)))?;

        match base.scheme() {
            "http" | "https" => {}
            other => return Err(invalid(format!("unsupported scheme '{}'", other))),
        }
        if base.query().is_some() || base.fragment().is_some() {
            return Err(invalid(format!(
                "'{}': base URL must not carry a query or fragment",
                url
            )));
        }

        let path = path
            .map(str::trim)
            .filter(|p| !p.is_empty() && *p != "/")
            .map(str::to_string);
        if let Some(ref suffix) = path {
            if suffix.contains(['?', '#']) {
                return Err(invalid(format!(
                    "path suffix '{}' must not carry a query or fragment",
                    suffix
                )));
            }
        }

        let target = join_path(&base, path.as_deref());

        Ok(Self {
            base,
            path,
            target,
            credential: None,
        })
    }

    /// Attach a per-agent backend credential
    pub fn with_credential(mut self, credential: Option<String>) -> Self {
        self.credential = credential.filter(|c| !c.trim().is_empty());
        self
    }

    /// Base URL as configured
    pub fn base(&self) -> &Url {
        &self.base
    }

    /// Path suffix, if one was configured
    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    /// Full URL requests for this agent are forwarded to
    pub fn target(&self) -> &Url {
        &self.target
    }

    /// Forwarding target carrying the caller's query string over
    pub fn target_with_query(&self, query: Option<&str>) -> Url {
        let mut url = self.target.clone();
        url.set_query(query.filter(|q| !q.is_empty()));
        url
    }

    /// Health probe URL: the forwarding target with `/health` appended
    pub fn health_target(&self) -> Url {
        join_path(&self.target, Some("health"))
    }

    /// Per-agent credential, if any
    pub fn credential(&self) -> Option<&str> {
        self.credential.as_deref()
    }
}

// Credentials stay out of logs.
impl fmt::Debug for AgentEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentEndpoint")
            .field("target", &self.target.as_str())
            .field("credential", &self.credential.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl fmt::Display for AgentEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.target.as_str())
    }
}

/// Append `suffix` to the path of `base` with exactly one `/` between them.
fn join_path(base: &Url, suffix: Option<&str>) -> Url {
    let mut url = base.clone();
    if let Some(suffix) = suffix {
        let joined = format!(
            "{}/{}",
            base.path().trim_end_matches('/'),
            suffix.trim_start_matches('/')
        );
        url.set_path(&joined);
    }
    url
}
