//! Agent listing and health handlers

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use relay_gateway::GatewayError;
use serde::Serialize;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct AgentSummary {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AgentList {
    pub agents: Vec<AgentSummary>,
}

#[derive(Debug, Serialize)]
pub struct AgentRef {
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct AgentHealthResponse {
    /// `ok` or `unavailable`
    pub status: &'static str,
    pub agent: AgentRef,
    /// Status the backend answered with, absent when it did not answer
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend_status: Option<u16>,
}

/// GET /copilotkit/agents
pub async fn list_agents(State(state): State<AppState>) -> Json<AgentList> {
    let agents = state
        .registry()
        .agents()
        .map(|agent| AgentSummary {
            name: agent.id().to_string(),
            description: agent.description().map(str::to_string),
        })
        .collect();
    Json(AgentList { agents })
}

/// GET /copilotkit/{agent_id}/health
///
/// Probes the agent's backend. Unknown agents are a 404; any backend that
/// does not answer with a success status is a 503.
pub async fn agent_health(
    State(state): State<AppState>,
    Path(agent_id): Path<String>,
) -> Result<(StatusCode, Json<AgentHealthResponse>), ApiError> {
    let (code, backend_status) = match state.gateway().probe(&agent_id).await {
        Ok(health) if health.healthy => (StatusCode::OK, Some(health.status)),
        Ok(health) => (StatusCode::SERVICE_UNAVAILABLE, Some(health.status)),
        Err(
            err @ (GatewayError::BackendUnavailable { .. } | GatewayError::BackendTimeout { .. }),
        ) => {
            tracing::warn!(agent = %agent_id, error = %err, "Agent health probe failed");
            (StatusCode::SERVICE_UNAVAILABLE, None)
        }
        Err(err) => return Err(err.into()),
    };

    let status = if code == StatusCode::OK {
        "ok"
    } else {
        "unavailable"
    };
    Ok((
        code,
        Json(AgentHealthResponse {
            status,
            agent: AgentRef { name: agent_id },
            backend_status,
        }),
    ))
}
