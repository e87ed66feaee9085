//! Inbound request model and header forwarding rules

use bytes::Bytes;
use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONNECTION, CONTENT_LENGTH, CONTENT_TYPE,
    HOST,
};
use reqwest::Method;
use serde::Deserialize;
use tracing::warn;

/// A caller's request as the gateway sees it.
///
/// The body is opaque. The only thing the gateway may read from it is the
/// target agent, and only when no explicit identifier was given.
#[derive(Debug, Clone)]
pub struct InboundRequest {
    agent: Option<String>,
    method: Method,
    headers: HeaderMap,
    query: Option<String>,
    body: Bytes,
}

impl InboundRequest {
    /// Create a request whose agent, if any, is named inside a JSON payload
    pub fn new(method: Method, headers: HeaderMap, body: Bytes) -> Self {
        let agent = agent_from_payload(&headers, &body);
        Self {
            agent,
            method,
            headers,
            query: None,
            body,
        }
    }

    /// Create a request whose target agent is already known, e.g. from the
    /// routing path. The payload is not inspected.
    pub fn for_agent(
        agent: impl Into<String>,
        method: Method,
        headers: HeaderMap,
        body: Bytes,
    ) -> Self {
        Self {
            agent: Some(agent.into()),
            method,
            headers,
            query: None,
            body,
        }
    }

    /// Name the target agent explicitly, overriding anything in the payload
    pub fn with_agent(mut self, agent: impl Into<String>) -> Self {
        self.agent = Some(agent.into());
        self
    }

    /// Query string to carry over to the backend (without the leading `?`)
    pub fn with_query(mut self, query: Option<String>) -> Self {
        self.query = query;
        self
    }

    /// Target agent; blank identifiers count as absent
    pub fn agent(&self) -> Option<&str> {
        self.agent.as_deref().filter(|a| !a.trim().is_empty())
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub(crate) fn into_parts(self) -> (Method, HeaderMap, Bytes) {
        (self.method, self.headers, self.body)
    }
}

/// Routing fields a chat client may put in its JSON payload
#[derive(Deserialize)]
struct RoutingFields {
    #[serde(default)]
    agent: Option<String>,
    #[serde(default, rename = "agentName")]
    agent_name: Option<String>,
    #[serde(default, rename = "agentSession")]
    agent_session: Option<AgentSession>,
}

#[derive(Deserialize)]
struct AgentSession {
    #[serde(default, rename = "agentName")]
    agent_name: Option<String>,
}

/// Read the target agent from a JSON body.
///
/// Looks at `agent`, then `agentName`, then `agentSession.agentName`.
/// Anything that is not a JSON object, or not declared as JSON, yields `None`.
fn agent_from_payload(headers: &HeaderMap, body: &Bytes) -> Option<String> {
    if body.is_empty() || !is_json(headers) {
        return None;
    }

    let fields: RoutingFields = serde_json::from_slice(body).ok()?;
    fields
        .agent
        .or(fields.agent_name)
        .or_else(|| fields.agent_session.and_then(|s| s.agent_name))
        .filter(|a| !a.trim().is_empty())
}

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(|mime| {
            let mime = mime.trim().to_ascii_lowercase();
            mime == "application/json" || mime.ends_with("+json")
        })
        .unwrap_or(false)
}

/// Headers that only describe a single connection and must not be relayed
fn is_hop_by_hop(name: &HeaderName) -> bool {
    matches!(
        name.as_str(),
        "connection"
            | "keep-alive"
            | "proxy-authenticate"
            | "proxy-authorization"
            | "te"
            | "trailer"
            | "transfer-encoding"
            | "upgrade"
    )
}

/// Header names listed in the `Connection` header, which are connection-scoped too
fn connection_scoped(headers: &HeaderMap) -> Vec<String> {
    headers
        .get_all(CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(|token| token.trim().to_ascii_lowercase())
        .filter(|token| !token.is_empty())
        .collect()
}

fn copy_end_to_end(source: &HeaderMap, skip: &[HeaderName]) -> HeaderMap {
    let scoped = connection_scoped(source);
    let mut out = HeaderMap::with_capacity(source.len());
    for (name, value) in source {
        if is_hop_by_hop(name) || skip.contains(name) || scoped.iter().any(|s| s == name.as_str())
        {
            continue;
        }
        out.append(name.clone(), value.clone());
    }
    out
}

/// Headers for the outbound request.
///
/// Everything end-to-end is copied verbatim (authorization, content type,
/// accept, cookies). `host` and `content-length` are left for the client to
/// set. When the caller sent no `authorization`, `credential` is attached as
/// a bearer token.
pub(crate) fn outbound_headers(inbound: &HeaderMap, credential: Option<&str>) -> HeaderMap {
    let mut headers = copy_end_to_end(inbound, &[HOST, CONTENT_LENGTH]);

    if !headers.contains_key(AUTHORIZATION) {
        if let Some(credential) = credential {
            match HeaderValue::from_str(&format!("Bearer {}", credential)) {
                Ok(mut value) => {
                    value.set_sensitive(true);
                    headers.insert(AUTHORIZATION, value);
                }
                Err(e) => warn!(error = %e, "Configured backend credential is not a valid header value"),
            }
        }
    }

    headers
}

/// Response headers relayed back to the caller.
///
/// `content-length` is dropped because the caller-facing body sets its own
/// framing.
pub(crate) fn relayed_headers(backend: &HeaderMap) -> HeaderMap {
    copy_end_to_end(backend, &[CONTENT_LENGTH])
}
