//! Event bus configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

/// Event bus (NATS) configuration
#[derive(Debug, Clone, Deserialize)]
pub struct EventBusConfig {
    /// Bus connection URL. `NATS_URL` is used when this is not set.
    #[serde(default = "default_url")]
    pub url: String,

    /// Fixed delay between reconnection attempts, in milliseconds
    #[serde(default = "default_reconnect_backoff")]
    pub reconnect_backoff_ms: u64,

    /// Connection timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl EventBusConfig {
    /// Get reconnect backoff as Duration
    pub fn reconnect_backoff(&self) -> Duration {
        Duration::from_millis(self.reconnect_backoff_ms)
    }

    /// Get connection timeout as Duration
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Validate event bus configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.url.is_empty() {
            return Err(ValidationError::MissingRequired("EVENT_BUS_URL"));
        }
        if !self.url.starts_with("nats://") && !self.url.starts_with("tls://") {
            return Err(ValidationError::InvalidEventBusUrl);
        }
        if self.reconnect_backoff_ms == 0 {
            return Err(ValidationError::InvalidReconnectBackoff);
        }
        Ok(())
    }
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            reconnect_backoff_ms: default_reconnect_backoff(),
            timeout_secs: default_timeout(),
        }
    }
}

fn default_url() -> String {
    "nats://localhost:4222".to_string()
}

fn default_reconnect_backoff() -> u64 {
    2_000
}

fn default_timeout() -> u64 {
    5
}
