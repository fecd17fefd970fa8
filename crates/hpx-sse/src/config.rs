//! SSE client configuration.

use std::time::Duration;

use crate::reconnect::{DEFAULT_MAX_DELAY, ReconnectPolicy};

/// Configuration for [`SseClient`](crate::SseClient).
///
/// Provides sensible defaults and chainable setter methods. Reconnect values
/// are the initial settings; they can be changed on a running client with
/// [`enable_auto_reconnect`](crate::SseClient::enable_auto_reconnect) and
/// [`disable_auto_reconnect`](crate::SseClient::disable_auto_reconnect).
#[derive(Clone, Debug)]
pub struct SseConfig {
    /// Additional HTTP headers to include with every SSE request.
    pub headers: http::HeaderMap,
    /// Upper bound on the wait for response headers.
    pub connect_timeout: Duration,
    /// Whether the client reconnects after a disconnect.
    pub auto_reconnect: bool,
    /// Delay before the first reconnection attempt.
    pub reconnect_base_delay: Duration,
    /// Maximum delay between reconnection attempts.
    pub reconnect_max_delay: Duration,
    /// Maximum number of consecutive reconnection attempts (0 = unlimited).
    pub reconnect_max_attempts: u32,
    /// Pause between disconnecting and connecting again on a manual
    /// [`reconnect`](crate::SseClient::reconnect).
    pub reconnect_settle_delay: Duration,
    /// Optional `User-Agent` header value.
    pub user_agent: Option<String>,
}

impl Default for SseConfig {
    fn default() -> Self {
        Self {
            headers: http::HeaderMap::new(),
            connect_timeout: Duration::from_secs(100),
            auto_reconnect: false,
            reconnect_base_delay: Duration::from_secs(5),
            reconnect_max_delay: DEFAULT_MAX_DELAY,
            reconnect_max_attempts: 0,
            reconnect_settle_delay: Duration::from_secs(1),
            user_agent: None,
        }
    }
}

impl SseConfig {
    /// Create a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set additional HTTP headers.
    #[must_use]
    pub fn headers(mut self, headers: http::HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Set the connection timeout.
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Enable or disable automatic reconnection.
    #[must_use]
    pub fn auto_reconnect(mut self, enabled: bool) -> Self {
        self.auto_reconnect = enabled;
        self
    }

    /// Set the base reconnection delay.
    #[must_use]
    pub fn reconnect_base_delay(mut self, delay: Duration) -> Self {
        self.reconnect_base_delay = delay;
        self
    }

    /// Set the maximum reconnection delay.
    #[must_use]
    pub fn reconnect_max_delay(mut self, delay: Duration) -> Self {
        self.reconnect_max_delay = delay;
        self
    }

    /// Set the maximum reconnection attempts (0 = unlimited).
    #[must_use]
    pub fn reconnect_max_attempts(mut self, attempts: u32) -> Self {
        self.reconnect_max_attempts = attempts;
        self
    }

    /// Set the settle delay used by manual reconnects.
    #[must_use]
    pub fn reconnect_settle_delay(mut self, delay: Duration) -> Self {
        self.reconnect_settle_delay = delay;
        self
    }

    /// Set the `User-Agent` header.
    #[must_use]
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// The reconnect policy described by this configuration.
    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            base_delay: self.reconnect_base_delay,
            max_delay: self.reconnect_max_delay,
            max_attempts: self.reconnect_max_attempts,
        }
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error message string if any field has an invalid value.
    pub fn validate(&self) -> Result<(), String> {
        if self.connect_timeout.is_zero() {
            return Err("Connect timeout must be > 0".to_string());
        }
        if let Some(user_agent) = &self.user_agent
            && http::HeaderValue::from_str(user_agent).is_err()
        {
            return Err("User agent is not a valid header value".to_string());
        }
        self.reconnect_policy().validate()
    }
}
