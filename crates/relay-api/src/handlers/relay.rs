//! Agent traffic handlers

use axum::body::{Body, Bytes};
use axum::extract::{Path, State};
use axum::http::{HeaderMap, Method, Uri};
use axum::response::{IntoResponse, Response};
use relay_gateway::{GatewayResponse, InboundRequest};

use crate::error::ApiError;
use crate::state::AppState;

/// Any method on `/copilotkit`: the agent is named in the JSON payload
pub async fn relay(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let request = InboundRequest::new(method, headers, body).with_query(query(&uri));
    forward(&state, request).await
}

/// Any method on `/copilotkit/{agent_id}`
pub async fn relay_to_agent(
    State(state): State<AppState>,
    Path(agent_id): Path<String>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let request = InboundRequest::for_agent(agent_id, method, headers, body).with_query(query(&uri));
    forward(&state, request).await
}

fn query(uri: &Uri) -> Option<String> {
    uri.query().map(str::to_string)
}

async fn forward(state: &AppState, request: InboundRequest) -> Result<Response, ApiError> {
    // A stream item error aborts the response body, so the caller sees a
    // broken transfer rather than a clean end of stream.
    let response = match state.gateway().handle(request).await? {
        GatewayResponse::Complete {
            status,
            headers,
            body,
        } => (status, headers, Body::from(body)).into_response(),
        GatewayResponse::Stream {
            status,
            headers,
            fragments,
        } => (status, headers, Body::from_stream(fragments)).into_response(),
    };
    Ok(response)
}
