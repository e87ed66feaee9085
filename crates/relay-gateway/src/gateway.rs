//! Routing gateway - resolves the target agent and forwards the exchange

use std::future::Future;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use futures::stream::BoxStream;
use futures::{StreamExt, TryStreamExt};
use relay_core::AgentRegistry;
use reqwest::header::HeaderMap;
use reqwest::{redirect, Client, StatusCode};
use tracing::{debug, field, info, instrument, warn, Span};
use uuid::Uuid;

use crate::config::GatewayConfig;
use crate::error::{describe, GatewayError, GatewayResult};
use crate::relay::spawn_relay;
use crate::request::{outbound_headers, relayed_headers, InboundRequest};
use crate::response::GatewayResponse;

type Upstream = BoxStream<'static, Result<Bytes, String>>;

/// Outcome of the exchange up to the first fragment
enum Exchange {
    /// Backend answered with no body at all
    Empty { status: StatusCode, headers: HeaderMap },
    /// First fragment received; `single` when the body has a declared length
    Started {
        status: StatusCode,
        headers: HeaderMap,
        first: Bytes,
        upstream: Upstream,
        single: bool,
    },
}

/// Result of probing an agent backend's health endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentHealth {
    /// Agent that was probed
    pub agent: String,
    /// HTTP status returned by the backend
    pub status: u16,
    /// Whether the backend answered with a success status
    pub healthy: bool,
}

/// Single entry point for agent traffic.
///
/// Holds the registry and one HTTP client whose connection pool is shared
/// by all exchanges. Everything else belongs to the request being handled.
#[derive(Debug, Clone)]
pub struct Gateway {
    registry: Arc<AgentRegistry>,
    client: Client,
    config: GatewayConfig,
}

impl Gateway {
    /// Create a gateway over an already built registry
    pub fn new(registry: Arc<AgentRegistry>, config: GatewayConfig) -> reqwest::Result<Self> {
        // Redirects are the caller's business; relay them untouched.
        let client = Client::builder()
            .connect_timeout(config.connect_timeout())
            .redirect(redirect::Policy::none())
            .build()?;

        info!(
            agents = registry.len(),
            ?config,
            "Routing gateway ready"
        );

        Ok(Self {
            registry,
            client,
            config,
        })
    }

    pub fn registry(&self) -> &AgentRegistry {
        &self.registry
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Forward one inbound request to its agent and relay the response.
    ///
    /// Exactly one outbound attempt is made. Nothing is sent when the agent
    /// is missing or unknown. Failures before the first fragment surface as
    /// [`GatewayError`]; failures after it end the returned stream with a
    /// [`FragmentError`](crate::FragmentError).
    #[instrument(
        name = "exchange",
        skip_all,
        fields(id = %Uuid::new_v4(), agent = field::Empty)
    )]
    pub async fn handle(&self, request: InboundRequest) -> GatewayResult<GatewayResponse> {
        let agent = request
            .agent()
            .ok_or(GatewayError::MissingAgent)?
            .to_string();
        Span::current().record("agent", agent.as_str());

        let endpoint = self.registry.resolve(&agent)?;
        let url = endpoint.target_with_query(request.query());
        let credential = endpoint
            .credential()
            .or(self.config.credential.as_deref());
        let headers = outbound_headers(request.headers(), credential);

        info!(method = %request.method(), target = %url, "Forwarding request to agent");

        let (method, _, body) = request.into_parts();
        let outbound = self.client.request(method, url).headers(headers).body(body);

        let exchange = self.exchange(&agent, outbound);
        match self.within_first_fragment_limit(&agent, exchange).await? {
            Exchange::Empty { status, headers } => {
                debug!(%status, "Relaying empty response");
                Ok(GatewayResponse::Complete {
                    status,
                    headers,
                    body: Bytes::new(),
                })
            }
            Exchange::Started {
                status,
                headers,
                first,
                upstream,
                single: true,
            } => {
                // Only the first fragment is time-limited.
                let body = read_remaining(&agent, first, upstream).await?;
                debug!(%status, bytes = body.len(), "Relaying single response");
                Ok(GatewayResponse::Complete {
                    status,
                    headers,
                    body,
                })
            }
            Exchange::Started {
                status,
                headers,
                first,
                upstream,
                single: false,
            } => {
                debug!(%status, "Relaying streamed response");
                let fragments =
                    spawn_relay(agent, first, upstream, self.config.stream_capacity());
                Ok(GatewayResponse::Stream {
                    status,
                    headers,
                    fragments,
                })
            }
        }
    }

    /// Probe `<target>/health` of an agent backend
    #[instrument(skip(self))]
    pub async fn probe(&self, agent: &str) -> GatewayResult<AgentHealth> {
        let endpoint = self.registry.resolve(agent)?;
        let mut request = self.client.get(endpoint.health_target());
        if let Some(credential) = endpoint
            .credential()
            .or(self.config.credential.as_deref())
        {
            request = request.bearer_auth(credential);
        }

        let probe = async move {
            request
                .send()
                .await
                .map_err(|e| GatewayError::unavailable(agent, &e))
        };
        let response = self.within_first_fragment_limit(agent, probe).await?;

        let status = response.status();
        debug!(%status, "Agent health probe answered");
        Ok(AgentHealth {
            agent: agent.to_string(),
            status: status.as_u16(),
            healthy: status.is_success(),
        })
    }

    /// Send the request and wait for the first fragment.
    ///
    /// A body with a declared length is a single message; anything else is
    /// a stream.
    async fn exchange(
        &self,
        agent: &str,
        outbound: reqwest::RequestBuilder,
    ) -> GatewayResult<Exchange> {
        let response = outbound.send().await.map_err(|e| {
            warn!(error = %describe(&e), "Backend unreachable");
            GatewayError::unavailable(agent, &e)
        })?;

        let status = response.status();
        let headers = relayed_headers(response.headers());

        let single = response.content_length().is_some();

        let mut upstream = response.bytes_stream().map_err(|e| describe(&e)).boxed();
        loop {
            match upstream.next().await {
                Some(Ok(chunk)) if chunk.is_empty() => continue,
                Some(Ok(first)) => {
                    return Ok(Exchange::Started {
                        status,
                        headers,
                        first,
                        upstream,
                        single,
                    })
                }
                Some(Err(reason)) => {
                    warn!(error = %reason, "Backend stream failed before the first fragment");
                    return Err(GatewayError::BackendUnavailable {
                        agent: agent.to_string(),
                        reason,
                    });
                }
                None => return Ok(Exchange::Empty { status, headers }),
            }
        }
    }

    async fn within_first_fragment_limit<T>(
        &self,
        agent: &str,
        fut: impl Future<Output = GatewayResult<T>>,
    ) -> GatewayResult<T> {
        let Some(limit) = self.config.first_fragment_timeout() else {
            return fut.await;
        };

        match tokio::time::timeout(limit, fut).await {
            Ok(result) => result,
            Err(_) => {
                warn!(waited_ms = limit.as_millis() as u64, "Backend sent nothing in time");
                Err(GatewayError::BackendTimeout {
                    agent: agent.to_string(),
                    waited_ms: limit.as_millis() as u64,
                })
            }
        }
    }
}

/// Collect the rest of a single-message body after its first fragment
async fn read_remaining(
    agent: &str,
    first: Bytes,
    mut upstream: Upstream,
) -> GatewayResult<Bytes> {
    let mut body = BytesMut::from(&first[..]);
    while let Some(chunk) = upstream.next().await {
        let chunk = chunk.map_err(|reason| {
            warn!(error = %reason, "Backend failed while sending its response");
            GatewayError::BackendUnavailable {
                agent: agent.to_string(),
                reason,
            }
        })?;
        body.extend_from_slice(&chunk);
    }
    Ok(body.freeze())
}
