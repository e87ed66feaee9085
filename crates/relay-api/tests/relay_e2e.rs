//! End-to-end tests: a real relay in front of stand-in agent backends
//!
//! Both sides run on local ephemeral ports. The backend echoes what it
//! received so each test can check what was actually forwarded.

use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::extract::{Path, State};
use axum::http::header::{AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE};
use axum::http::{HeaderMap, Uri};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::{stream, StreamExt};
use relay_api::testing::{closed_port, wait_for, TestServer};
use relay_api::{create_router, AppState, RouterConfig};
use relay_gateway::{AgentEntry, AgentRegistry, Gateway, GatewayConfig};
use serde_json::{json, Value};
use tokio::sync::Notify;

// =============================================================================
// Stand-in agent backend
// =============================================================================

#[derive(Clone, Default)]
struct Backend {
    hits: Arc<AtomicUsize>,
    release: Arc<Notify>,
    endless_dropped: Arc<AtomicBool>,
}

impl Backend {
    fn hit(&self) {
        self.hits.fetch_add(1, Ordering::SeqCst);
    }

    fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    fn router(self) -> Router {
        Router::new()
            .route("/{slot}", post(echo))
            .route("/{slot}/health", get(health))
            .route("/stream", post(sse))
            .route("/gated", post(gated))
            .route("/broken", post(broken))
            .route("/endless", post(endless))
            .route("/slow", post(slow))
            .route("/fails-early", post(fails_early))
            .route("/flaky", post(flaky))
            .route("/trickle", post(trickle))
            .with_state(self)
    }
}

/// Reply with everything the relay forwarded
async fn echo(
    State(backend): State<Backend>,
    Path(slot): Path<String>,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Json<Value> {
    backend.hit();
    Json(json!({
        "slot": slot,
        "authorization": headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()),
        "content_type": headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok()),
        "query": uri.query(),
        "body": String::from_utf8_lossy(&body),
    }))
}

async fn health(State(backend): State<Backend>, Path(slot): Path<String>) -> impl IntoResponse {
    backend.hit();
    if slot == "sick" {
        (axum::http::StatusCode::INTERNAL_SERVER_ERROR, "down")
    } else {
        (axum::http::StatusCode::OK, "OK")
    }
}

fn event_stream(body: Body) -> impl IntoResponse {
    ([(CONTENT_TYPE, "text/event-stream")], body)
}

fn fragment(text: &'static str) -> Result<Bytes, io::Error> {
    Ok(Bytes::from_static(text.as_bytes()))
}

/// Three fragments, paced so they leave the backend separately
async fn sse(State(backend): State<Backend>) -> impl IntoResponse {
    backend.hit();
    let fragments = stream::iter(["data: F1\n\n", "data: F2\n\n", "data: F3\n\n"]).then(
        |text| async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            fragment(text)
        },
    );
    event_stream(Body::from_stream(fragments))
}

/// F1, then nothing until the test releases the rest
async fn gated(State(backend): State<Backend>) -> impl IntoResponse {
    backend.hit();
    let release = backend.release.clone();
    let fragments = stream::once(async { fragment("data: F1\n\n") })
        .chain(stream::once(async move {
            release.notified().await;
            fragment("data: F2\n\n")
        }))
        .chain(stream::once(async { fragment("data: F3\n\n") }));
    event_stream(Body::from_stream(fragments))
}

/// F1, then the connection breaks
async fn broken(State(backend): State<Backend>) -> impl IntoResponse {
    backend.hit();
    let fragments = stream::once(async { fragment("data: F1\n\n") }).chain(stream::once(async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        Err(io::Error::new(io::ErrorKind::ConnectionReset, "agent crashed"))
    }));
    event_stream(Body::from_stream(fragments))
}

/// Sets a flag once the backend stops producing
struct DropFlag(Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// A fragment every 20 ms until the reader goes away
async fn endless(State(backend): State<Backend>) -> impl IntoResponse {
    backend.hit();
    let flag = DropFlag(backend.endless_dropped.clone());
    let fragments = stream::unfold((flag, 0u64), |(flag, n)| async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        let chunk = Bytes::from(format!("data: tick {}\n\n", n));
        Some((Ok::<_, io::Error>(chunk), (flag, n + 1)))
    });
    event_stream(Body::from_stream(fragments))
}

async fn slow(State(backend): State<Backend>) -> &'static str {
    backend.hit();
    tokio::time::sleep(Duration::from_secs(3)).await;
    "too late"
}

fn failing_stream() -> Body {
    Body::from_stream(stream::once(async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        Err::<Bytes, _>(io::Error::new(io::ErrorKind::ConnectionReset, "agent crashed"))
    }))
}

/// Headers go out, then the body breaks before a single byte
async fn fails_early(State(backend): State<Backend>) -> impl IntoResponse {
    backend.hit();
    event_stream(failing_stream())
}

/// Fails when asked to with `{"fail": true}`, streams one event otherwise
async fn flaky(State(backend): State<Backend>, Json(request): Json<Value>) -> impl IntoResponse {
    backend.hit();
    if request["fail"] == true {
        event_stream(failing_stream())
    } else {
        let fragments = stream::once(async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            fragment("data: ok\n\n")
        });
        event_stream(Body::from_stream(fragments))
    }
}

/// Declared-length reply whose second half arrives well after the first
async fn trickle(State(backend): State<Backend>) -> impl IntoResponse {
    backend.hit();
    let fragments = stream::once(async { fragment("first half, ") }).chain(stream::once(async {
        tokio::time::sleep(Duration::from_millis(400)).await;
        fragment("second half")
    }));
    ([(CONTENT_LENGTH, "23")], Body::from_stream(fragments))
}

// =============================================================================
// Harness
// =============================================================================

struct Harness {
    backend: Backend,
    relay: TestServer,
    _backend_server: TestServer,
}

impl Harness {
    async fn start() -> Self {
        Self::start_with(GatewayConfig::default()).await
    }

    async fn start_with(config: GatewayConfig) -> Self {
        let backend = Backend::default();
        let backend_server = TestServer::start(backend.clone().router()).await.unwrap();
        let base = backend_server.base_url();
        let dead = format!("http://{}", closed_port().await.unwrap());

        let registry = AgentRegistry::build([
            AgentEntry::new("sample_agent", format!("{}/a", base))
                .with_description("A helpful assistant agent."),
            AgentEntry::new("joke_agent", format!("{}/b", base)),
            AgentEntry::new("secured_agent", format!("{}/c", base)).with_credential("agent-token"),
            AgentEntry::new("sick_agent", format!("{}/sick", base)),
            AgentEntry::new("stream_agent", base.clone()).with_path("/stream"),
            AgentEntry::new("gated_agent", base.clone()).with_path("/gated"),
            AgentEntry::new("broken_agent", base.clone()).with_path("/broken"),
            AgentEntry::new("endless_agent", base.clone()).with_path("/endless"),
            AgentEntry::new("slow_agent", base.clone()).with_path("/slow"),
            AgentEntry::new("early_agent", base.clone()).with_path("/fails-early"),
            AgentEntry::new("flaky_agent", base.clone()).with_path("/flaky"),
            AgentEntry::new("trickle_agent", base.clone()).with_path("/trickle"),
            AgentEntry::new("dead_agent", dead),
        ])
        .unwrap();

        let gateway = Gateway::new(Arc::new(registry), config).unwrap();
        let router = create_router(AppState::new(gateway), &RouterConfig::default());
        let relay = TestServer::start(router).await.unwrap();

        Self {
            backend,
            relay,
            _backend_server: backend_server,
        }
    }

    fn url(&self, path: &str) -> String {
        self.relay.url(path)
    }

    async fn post_json(&self, path: &str, body: Value) -> reqwest::Response {
        self.relay
            .client
            .post(self.url(path))
            .json(&body)
            .send()
            .await
            .unwrap()
    }
}

fn chat(agent: &str) -> Value {
    json!({
        "agent": agent,
        "messages": [{"role": "user", "content": "tell me a joke"}],
    })
}

// =============================================================================
// Routing
// =============================================================================

#[tokio::test]
async fn request_is_forwarded_to_its_agent_verbatim() {
    let harness = Harness::start().await;
    let payload = r#"{"messages":[{"role":"user","content":"tell me a joke"}]}"#;

    let response = harness
        .relay
        .client
        .post(harness.url("/copilotkit/joke_agent"))
        .header(CONTENT_TYPE, "application/json")
        .header(AUTHORIZATION, "Bearer caller-token")
        .body(payload)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let echoed: Value = response.json().await.unwrap();
    assert_eq!(echoed["slot"], "b");
    assert_eq!(echoed["body"], payload);
    assert_eq!(echoed["authorization"], "Bearer caller-token");
    assert_eq!(echoed["content_type"], "application/json");
    assert_eq!(harness.backend.hits(), 1);
}

#[tokio::test]
async fn agent_named_in_payload_is_routed() {
    let harness = Harness::start().await;

    let response = harness.post_json("/copilotkit", chat("sample_agent")).await;

    assert_eq!(response.status(), 200);
    let echoed: Value = response.json().await.unwrap();
    assert_eq!(echoed["slot"], "a");
    let forwarded: Value = serde_json::from_str(echoed["body"].as_str().unwrap()).unwrap();
    assert_eq!(forwarded, chat("sample_agent"));
}

#[tokio::test]
async fn query_string_is_carried_over() {
    let harness = Harness::start().await;

    let response = harness
        .post_json("/copilotkit/sample_agent?thread=42", json!({}))
        .await;

    let echoed: Value = response.json().await.unwrap();
    assert_eq!(echoed["query"], "thread=42");
}

#[tokio::test]
async fn unknown_agent_is_rejected_without_contacting_backends() {
    let harness = Harness::start().await;

    let response = harness.post_json("/copilotkit", chat("ghost_agent")).await;

    assert_eq!(response.status(), 404);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "unknown_agent");
    assert_eq!(body["agent"], "ghost_agent");
    assert_eq!(harness.backend.hits(), 0);
}

#[tokio::test]
async fn missing_agent_is_rejected_without_contacting_backends() {
    let harness = Harness::start().await;

    let response = harness
        .post_json("/copilotkit", json!({"messages": []}))
        .await;

    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "missing_agent");
    assert_eq!(harness.backend.hits(), 0);
}

#[tokio::test]
async fn agent_credential_is_attached_when_caller_sends_none() {
    let harness = Harness::start().await;

    let response = harness.post_json("/copilotkit/secured_agent", json!({})).await;
    let echoed: Value = response.json().await.unwrap();
    assert_eq!(echoed["authorization"], "Bearer agent-token");

    let response = harness
        .relay
        .client
        .post(harness.url("/copilotkit/secured_agent"))
        .header(AUTHORIZATION, "Bearer caller-token")
        .json(&json!({}))
        .send()
        .await
        .unwrap();
    let echoed: Value = response.json().await.unwrap();
    assert_eq!(echoed["authorization"], "Bearer caller-token");
}

// =============================================================================
// Streaming
// =============================================================================

#[tokio::test]
async fn stream_is_relayed_in_order_with_its_content_type() {
    let harness = Harness::start().await;

    let response = harness.post_json("/copilotkit/stream_agent", json!({})).await;

    assert_eq!(response.status(), 200);
    assert_eq!(response.headers()[CONTENT_TYPE], "text/event-stream");
    let body = response.bytes().await.unwrap();
    assert_eq!(&body[..], b"data: F1\n\ndata: F2\n\ndata: F3\n\n");
}

#[tokio::test]
async fn first_fragment_arrives_before_the_backend_finishes() {
    let harness = Harness::start().await;

    let response = harness.post_json("/copilotkit/gated_agent", json!({})).await;
    let mut body = response.bytes_stream();

    // The backend is blocked after F1, so this only succeeds if the relay
    // forwards fragments as they arrive.
    let first = tokio::time::timeout(Duration::from_secs(5), body.next())
        .await
        .expect("first fragment was held back")
        .unwrap()
        .unwrap();
    assert_eq!(&first[..], b"data: F1\n\n");

    harness.backend.release.notify_one();

    let mut rest = Vec::new();
    while let Some(chunk) = body.next().await {
        rest.extend_from_slice(&chunk.unwrap());
    }
    assert_eq!(rest, b"data: F2\n\ndata: F3\n\n");
}

#[tokio::test]
async fn mid_stream_failure_is_not_a_clean_end() {
    let harness = Harness::start().await;

    let response = harness.post_json("/copilotkit/broken_agent", json!({})).await;
    assert_eq!(response.status(), 200);

    let mut body = response.bytes_stream();
    let mut received = Vec::new();
    let mut failed = false;
    while let Some(chunk) = body.next().await {
        match chunk {
            Ok(bytes) => received.extend_from_slice(&bytes),
            Err(_) => {
                failed = true;
                break;
            }
        }
    }

    assert_eq!(received, b"data: F1\n\n");
    assert!(failed, "caller saw a clean end of stream");
}

#[tokio::test]
async fn caller_disconnect_stops_the_backend_stream() {
    let harness = Harness::start().await;

    let response = harness.post_json("/copilotkit/endless_agent", json!({})).await;
    let mut body = response.bytes_stream();
    let first = body.next().await.unwrap().unwrap();
    assert!(first.starts_with(b"data: tick"));
    assert!(!harness.backend.endless_dropped.load(Ordering::SeqCst));

    drop(body);

    let flag = harness.backend.endless_dropped.clone();
    let stopped = wait_for(
        || {
            let flag = flag.clone();
            async move { flag.load(Ordering::SeqCst) }
        },
        Duration::from_secs(5),
    )
    .await;
    assert!(stopped, "backend kept streaming after the caller left");
}

// =============================================================================
// Failures and isolation
// =============================================================================

#[tokio::test]
async fn unreachable_backend_is_bad_gateway() {
    let harness = Harness::start().await;

    let response = harness.post_json("/copilotkit/dead_agent", json!({})).await;

    assert_eq!(response.status(), 502);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "backend_unavailable");
    assert_eq!(body["agent"], "dead_agent");
}

#[tokio::test]
async fn silent_backend_times_out() {
    let harness =
        Harness::start_with(GatewayConfig::default().with_first_fragment_timeout_ms(200)).await;

    let started = std::time::Instant::now();
    let response = harness.post_json("/copilotkit/slow_agent", json!({})).await;

    assert_eq!(response.status(), 504);
    assert!(started.elapsed() < Duration::from_secs(3));
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "backend_timeout");
}

#[tokio::test]
async fn backend_failing_before_first_fragment_is_bad_gateway() {
    let harness = Harness::start().await;

    let response = harness.post_json("/copilotkit/early_agent", json!({})).await;

    assert_eq!(response.status(), 502);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "backend_unavailable");
    assert_eq!(body["agent"], "early_agent");
    assert_eq!(harness.backend.hits(), 1);
}

#[tokio::test]
async fn slow_single_reply_is_not_cut_short() {
    let harness =
        Harness::start_with(GatewayConfig::default().with_first_fragment_timeout_ms(200)).await;

    let response = harness.post_json("/copilotkit/trickle_agent", json!({})).await;

    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), "first half, second half");
}

#[tokio::test]
async fn failure_on_one_exchange_does_not_affect_another_to_the_same_agent() {
    let harness = Harness::start().await;

    let (failed, ok) = tokio::join!(
        harness.post_json("/copilotkit/flaky_agent", json!({"fail": true})),
        harness.post_json("/copilotkit/flaky_agent", json!({"fail": false})),
    );

    assert_eq!(failed.status(), 502);
    assert_eq!(ok.status(), 200);
    assert_eq!(&ok.bytes().await.unwrap()[..], b"data: ok\n\n");
    assert_eq!(harness.backend.hits(), 2);
}

#[tokio::test]
async fn failing_agent_does_not_affect_others() {
    let harness = Harness::start().await;

    let (dead, joke, stream) = tokio::join!(
        harness.post_json("/copilotkit/dead_agent", json!({})),
        harness.post_json("/copilotkit/joke_agent", json!({"n": 1})),
        harness.post_json("/copilotkit/stream_agent", json!({})),
    );

    assert_eq!(dead.status(), 502);
    assert_eq!(joke.status(), 200);
    let echoed: Value = joke.json().await.unwrap();
    assert_eq!(echoed["slot"], "b");
    assert_eq!(
        &stream.bytes().await.unwrap()[..],
        b"data: F1\n\ndata: F2\n\ndata: F3\n\n"
    );
}

#[tokio::test]
async fn concurrent_exchanges_get_their_own_responses() {
    let harness = Harness::start().await;

    let requests = (0..8).map(|n| {
        let agent = if n % 2 == 0 { "sample_agent" } else { "joke_agent" };
        let harness = &harness;
        async move {
            let response = harness
                .post_json(&format!("/copilotkit/{}", agent), json!({ "n": n }))
                .await;
            (n, response.json::<Value>().await.unwrap())
        }
    });

    for (n, echoed) in futures::future::join_all(requests).await {
        let expected_slot = if n % 2 == 0 { "a" } else { "b" };
        assert_eq!(echoed["slot"], expected_slot);
        let forwarded: Value = serde_json::from_str(echoed["body"].as_str().unwrap()).unwrap();
        assert_eq!(forwarded["n"], n);
    }
}

// =============================================================================
// Listing, health, access control
// =============================================================================

#[tokio::test]
async fn agents_are_listed_in_configuration_order() {
    let harness = Harness::start().await;

    let body: Value = harness
        .relay
        .client
        .get(harness.url("/copilotkit/agents"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let names: Vec<&str> = body["agents"]
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["name"].as_str().unwrap())
        .collect();
    assert_eq!(names[..3], ["sample_agent", "joke_agent", "secured_agent"]);
    assert_eq!(body["agents"][0]["description"], "A helpful assistant agent.");
}

#[tokio::test]
async fn agent_health_reflects_backend() {
    let harness = Harness::start().await;
    let fetch = |path: &str| harness.relay.client.get(harness.url(path)).send();

    let ok = fetch("/copilotkit/sample_agent/health").await.unwrap();
    assert_eq!(ok.status(), 200);
    let body: Value = ok.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["agent"]["name"], "sample_agent");

    let sick = fetch("/copilotkit/sick_agent/health").await.unwrap();
    assert_eq!(sick.status(), 503);
    let body: Value = sick.json().await.unwrap();
    assert_eq!(body["backend_status"], 500);

    let dead = fetch("/copilotkit/dead_agent/health").await.unwrap();
    assert_eq!(dead.status(), 503);
    let body: Value = dead.json().await.unwrap();
    assert_eq!(body["status"], "unavailable");

    let ghost = fetch("/copilotkit/ghost_agent/health").await.unwrap();
    assert_eq!(ghost.status(), 404);
}

#[tokio::test]
async fn allowed_origin_gets_cors_headers() {
    let harness = Harness::start().await;

    let response = harness
        .relay
        .client
        .post(harness.url("/copilotkit/sample_agent"))
        .header("origin", "http://localhost:5173")
        .json(&json!({}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(
        response.headers()["access-control-allow-origin"],
        "http://localhost:5173"
    );
    assert_eq!(response.headers()["access-control-allow-credentials"], "true");
}

#[tokio::test]
async fn preflight_from_allowed_origin_is_answered() {
    let harness = Harness::start().await;

    let response = harness
        .relay
        .client
        .request(reqwest::Method::OPTIONS, harness.url("/copilotkit"))
        .header("origin", "http://localhost:5173")
        .header("access-control-request-method", "POST")
        .header("access-control-request-headers", "content-type,authorization")
        .send()
        .await
        .unwrap();

    assert!(response.status().is_success());
    assert_eq!(
        response.headers()["access-control-allow-origin"],
        "http://localhost:5173"
    );
    assert_eq!(harness.backend.hits(), 0);
}

#[tokio::test]
async fn foreign_origin_is_refused() {
    let harness = Harness::start().await;

    let response = harness
        .relay
        .client
        .post(harness.url("/copilotkit/sample_agent"))
        .header("origin", "http://evil.example")
        .json(&json!({}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 403);
    assert!(response.headers().get("access-control-allow-origin").is_none());
    assert_eq!(harness.backend.hits(), 0);
}
