//! Configuration for a merge session client
//!
//! Every endpoint is derived from the backend origin plus the session id.
//! The library never reads the environment; the `merge-watch` binary does.

use std::time::Duration;

/// Default delay between reconnect attempts
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(500);

/// Default number of reconnect attempts before giving up
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 3;

/// Configuration for the sync engine
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Backend origin, e.g. `https://merge.example.com`
    pub origin: String,
    /// Fixed delay between reconnect attempts
    pub reconnect_delay: Duration,
    /// Maximum reconnect attempts per unexpected close
    pub max_reconnect_attempts: u32,
    /// Timeout applied to every REST request
    pub request_timeout: Duration,
    /// Maximum undo depth kept by the operation log
    pub max_history: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            origin: "http://localhost:8000".to_string(),
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            request_timeout: Duration::from_secs(30),
            max_history: 128,
        }
    }
}

impl SyncConfig {
    /// Create config for the given origin
    pub fn new(origin: impl Into<String>) -> Self {
        Self {
            origin: origin.into().trim_end_matches('/').to_string(),
            ..Default::default()
        }
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    pub fn with_max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = attempts;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_max_history(mut self, depth: usize) -> Self {
        self.max_history = depth;
        self
    }

    /// Endpoints for one session
    pub fn endpoints(&self, session_id: &str) -> SessionEndpoints {
        SessionEndpoints::new(&self.origin, session_id)
    }
}

/// URLs used by one merge session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionEndpoints {
    origin: String,
    session_id: String,
}

impl SessionEndpoints {
    pub fn new(origin: &str, session_id: &str) -> Self {
        Self {
            origin: origin.trim_end_matches('/').to_string(),
            session_id: session_id.to_string(),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Push channel URL: the origin's scheme mapped to ws/wss
    pub fn push_url(&self) -> String {
        let base = if let Some(rest) = self.origin.strip_prefix("https://") {
            format!("wss://{}", rest)
        } else if let Some(rest) = self.origin.strip_prefix("http://") {
            format!("ws://{}", rest)
        } else {
            self.origin.clone()
        };
        format!("{}/ws/{}", base, urlencoding::encode(&self.session_id))
    }

    /// `GET /merge/{sessionId}/visualization`
    pub fn visualization_url(&self) -> String {
        format!(
            "{}/merge/{}/visualization",
            self.origin,
            urlencoding::encode(&self.session_id)
        )
    }

    /// `GET /merge/{mergeId}/conflicts`
    pub fn conflicts_url(&self, merge_id: &str) -> String {
        format!(
            "{}/merge/{}/conflicts",
            self.origin,
            urlencoding::encode(merge_id)
        )
    }
}
