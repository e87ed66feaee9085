//! Gateway tuning

use std::fmt;
use std::time::Duration;

/// Default wait for the first response fragment
pub const DEFAULT_FIRST_FRAGMENT_TIMEOUT_MS: u64 = 60_000;
/// Default TCP connect timeout towards backends
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 10_000;
/// Default number of fragments buffered between backend and caller
pub const DEFAULT_STREAM_BUFFER: usize = 16;

/// Settings shared by every forwarded exchange
#[derive(Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    /// Credential attached as a bearer token when neither the caller nor the
    /// agent's endpoint supplies one
    pub credential: Option<String>,
    /// Maximum wait from sending the request to the first fragment, in
    /// milliseconds. `0` disables the limit.
    pub first_fragment_timeout_ms: u64,
    /// TCP connect timeout towards backends, in milliseconds
    pub connect_timeout_ms: u64,
    /// Fragments buffered per stream before backpressure reaches the backend
    pub stream_buffer: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            credential: None,
            first_fragment_timeout_ms: DEFAULT_FIRST_FRAGMENT_TIMEOUT_MS,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            stream_buffer: DEFAULT_STREAM_BUFFER,
        }
    }
}

impl GatewayConfig {
    pub fn with_credential(mut self, credential: Option<String>) -> Self {
        self.credential = credential.filter(|c| !c.trim().is_empty());
        self
    }

    pub fn with_first_fragment_timeout_ms(mut self, ms: u64) -> Self {
        self.first_fragment_timeout_ms = ms;
        self
    }

    pub fn with_connect_timeout_ms(mut self, ms: u64) -> Self {
        self.connect_timeout_ms = ms;
        self
    }

    pub fn with_stream_buffer(mut self, fragments: usize) -> Self {
        self.stream_buffer = fragments;
        self
    }

    /// First-fragment limit, `None` when disabled
    pub fn first_fragment_timeout(&self) -> Option<Duration> {
        (self.first_fragment_timeout_ms > 0)
            .then(|| Duration::from_millis(self.first_fragment_timeout_ms))
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Channel capacity; a zero-sized buffer is not possible with mpsc
    pub fn stream_capacity(&self) -> usize {
        self.stream_buffer.max(1)
    }
}

impl fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("credential", &self.credential.as_ref().map(|_| "<redacted>"))
            .field("first_fragment_timeout_ms", &self.first_fragment_timeout_ms)
            .field("connect_timeout_ms", &self.connect_timeout_ms)
            .field("stream_buffer", &self.stream_buffer)
            .finish()
    }
}
