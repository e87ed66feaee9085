//! API error types and conversions

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use relay_gateway::GatewayError;
use serde::Serialize;

/// API error type that converts to HTTP responses
#[derive(Debug)]
pub enum ApiError {
    /// 400 Bad Request - no target agent in the request
    MissingAgent(String),
    /// 404 Not Found - agent not in the registry
    UnknownAgent { agent: String, message: String },
    /// 403 Forbidden
    Forbidden(String),
    /// 502 Bad Gateway - backend unreachable or failed before responding
    BackendUnavailable { agent: String, message: String },
    /// 504 Gateway Timeout - backend sent nothing in time
    BackendTimeout { agent: String, message: String },
}

/// Standard error response format
#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    agent: Option<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, message, agent) = match self {
            ApiError::MissingAgent(msg) => (StatusCode::BAD_REQUEST, "missing_agent", msg, None),
            ApiError::UnknownAgent { agent, message } => {
                (StatusCode::NOT_FOUND, "unknown_agent", message, Some(agent))
            }
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", msg, None),
            ApiError::BackendUnavailable { agent, message } => (
                StatusCode::BAD_GATEWAY,
                "backend_unavailable",
                message,
                Some(agent),
            ),
            ApiError::BackendTimeout { agent, message } => (
                StatusCode::GATEWAY_TIMEOUT,
                "backend_timeout",
                message,
                Some(agent),
            ),
        };

        // Log errors at appropriate levels
        if status.is_server_error() {
            tracing::error!(error, agent = agent.as_deref(), %message, "API error");
        } else {
            tracing::debug!(error, agent = agent.as_deref(), %message, "API client error");
        }

        let body = Json(ErrorResponse {
            error,
            message,
            agent,
        });

        (status, body).into_response()
    }
}

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        let message = err.to_string();
        match err {
            GatewayError::MissingAgent => ApiError::MissingAgent(message),
            GatewayError::UnknownAgent(agent) => ApiError::UnknownAgent { agent, message },
            GatewayError::BackendUnavailable { agent, .. } => {
                ApiError::BackendUnavailable { agent, message }
            }
            GatewayError::BackendTimeout { agent, .. } => ApiError::BackendTimeout { agent, message },
        }
    }
}
