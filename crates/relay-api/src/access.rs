//! Browser access control - static origin allow-list
//!
//! Requests that carry an `Origin` header are admitted only when the origin
//! is on the list. Requests without one (server-to-server, curl) pass; they
//! are not subject to browser CORS rules in the first place.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::header::ORIGIN;
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::Response;
use thiserror::Error;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};

use crate::error::ApiError;

/// Origin allowed when nothing is configured: the local chat UI dev server
pub const DEFAULT_ORIGIN: &str = "http://localhost:5173";

/// Configured origin that cannot be used in an allow-list
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Invalid CORS origin '{origin}': {reason}")]
pub struct InvalidOrigin {
    pub origin: String,
    pub reason: &'static str,
}

/// Allow-listed origins, fixed at startup
#[derive(Debug, Clone)]
pub struct AccessPolicy {
    origins: Arc<Vec<HeaderValue>>,
}

impl AccessPolicy {
    /// Build the allow-list.
    ///
    /// Blank entries are skipped and a trailing `/` is dropped, so
    /// `http://localhost:5173/` and `http://localhost:5173` are the same
    /// origin. Wildcards are refused since credentials are allowed.
    pub fn from_origins<S: AsRef<str>>(origins: &[S]) -> Result<Self, InvalidOrigin> {
        let mut allowed = Vec::with_capacity(origins.len());
        for raw in origins {
            let origin = raw.as_ref().trim().trim_end_matches('/');
            if origin.is_empty() {
                continue;
            }
            let invalid = |reason| InvalidOrigin {
                origin: origin.to_string(),
                reason,
            };
            if origin == "*" {
                return Err(invalid("wildcard cannot be combined with credentials"));
            }
            if !(origin.starts_with("http://") || origin.starts_with("https://")) {
                return Err(invalid("expected scheme://host[:port]"));
            }
            let value = HeaderValue::from_str(origin).map_err(|_| invalid("not a valid header value"))?;
            if !allowed.contains(&value) {
                allowed.push(value);
            }
        }
        Ok(Self {
            origins: Arc::new(allowed),
        })
    }

    pub fn allows(&self, origin: &HeaderValue) -> bool {
        self.origins.iter().any(|allowed| allowed == origin)
    }

    pub fn origins(&self) -> impl Iterator<Item = &str> {
        self.origins.iter().filter_map(|o| o.to_str().ok())
    }

    /// CORS layer answering preflights and decorating responses for allowed origins
    pub fn cors_layer(&self) -> CorsLayer {
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(self.origins.iter().cloned()))
            .allow_credentials(true)
            .allow_methods(AllowMethods::mirror_request())
            .allow_headers(AllowHeaders::mirror_request())
    }
}

impl Default for AccessPolicy {
    fn default() -> Self {
        Self {
            origins: Arc::new(vec![HeaderValue::from_static(DEFAULT_ORIGIN)]),
        }
    }
}

/// Middleware rejecting requests from origins outside the allow-list
pub async fn origin_guard(
    State(policy): State<AccessPolicy>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if let Some(origin) = request.headers().get(ORIGIN) {
        if !policy.allows(origin) {
            tracing::warn!(
                origin = ?origin,
                path = %request.uri().path(),
                "Request from origin outside the allow-list"
            );
            return Err(ApiError::Forbidden(format!(
                "Origin '{}' is not allowed",
                origin.to_str().unwrap_or("<non-ascii>")
            )));
        }
    }
    Ok(next.run(request).await)
}
