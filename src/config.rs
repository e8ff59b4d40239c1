//! Client configuration.
//!
//! Components take an explicit [`ClientConfig`] value at construction
//! instead of reading ambient globals, so tests and multi-backend setups
//! can point each client at a different provider.

use std::time::Duration;

/// Default backend base URL used by the mobile client.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";

/// Configuration for the API client and room subscriptions.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// HTTP base URL of the backend, e.g. `http://localhost:8080`.
    pub base_url: String,
    /// Connect timeout for one-shot HTTP requests.
    pub connect_timeout: Duration,
    /// Interval between snapshot re-requests on an otherwise idle room
    /// stream. This is a degraded-mode safety net for backends that do not
    /// reliably push after idle periods, not the primary delivery path.
    pub resync_interval: Duration,
    /// Reconnect behavior after a stream failure.
    pub reconnect: ReconnectConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            connect_timeout: Duration::from_secs(10),
            resync_interval: Duration::from_secs(30),
            reconnect: ReconnectConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Configuration pointing at a specific backend.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// WebSocket URL for the streaming endpoint, derived from the base URL.
    pub fn ws_url(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            format!("ws://{base}")
        }
    }
}

/// Configuration for stream reconnect behavior.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Maximum number of reconnect attempts (0 = infinite)
    pub max_attempts: u32,
    /// Initial delay in milliseconds
    pub initial_delay_ms: u64,
    /// Maximum delay in milliseconds
    pub max_delay_ms: u64,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            initial_delay_ms: 1000,
            max_delay_ms: 30000,
            backoff_multiplier: 1.5,
        }
    }
}

impl ReconnectConfig {
    /// Calculate delay for a given attempt number
    pub fn delay_for_attempt(&self, attempt: u32) -> u64 {
        let delay = self.initial_delay_ms as f32 * self.backoff_multiplier.powi(attempt as i32);
        (delay as u64).min(self.max_delay_ms)
    }
}
