//! Broadcast hub and client connection configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

/// What the hub does when a client's outbound queue is full.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Unregister the client and keep delivering to everyone else.
    #[default]
    Evict,
    /// Skip this message for the client and keep it registered.
    DropMessage,
}

/// Hub configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HubConfig {
    /// Capacity of each client's outbound queue
    #[serde(default = "default_queue_capacity")]
    pub client_queue_capacity: usize,

    /// Keepalive ping interval in seconds
    #[serde(default = "default_ping_interval")]
    pub ping_interval_secs: u64,

    /// Seconds without any inbound frame before a client is dropped
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,

    /// Time a pump gets to finish after its sibling exited, in milliseconds
    #[serde(default = "default_close_grace")]
    pub close_grace_ms: u64,

    /// Policy applied to saturated client queues
    #[serde(default)]
    pub overflow_policy: OverflowPolicy,
}

impl HubConfig {
    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn close_grace(&self) -> Duration {
        Duration::from_millis(self.close_grace_ms)
    }

    /// Validate hub configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.client_queue_capacity == 0 || self.client_queue_capacity > 65_536 {
            return Err(ValidationError::InvalidQueueCapacity);
        }
        if self.ping_interval_secs == 0 {
            return Err(ValidationError::InvalidPingInterval);
        }
        if self.idle_timeout_secs <= self.ping_interval_secs {
            return Err(ValidationError::IdleTimeoutTooShort);
        }
        Ok(())
    }
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            client_queue_capacity: default_queue_capacity(),
            ping_interval_secs: default_ping_interval(),
            idle_timeout_secs: default_idle_timeout(),
            close_grace_ms: default_close_grace(),
            overflow_policy: OverflowPolicy::default(),
        }
    }
}

// Absorbs a tick storm of a few hundred messages; a stalled client
// is evicted within that many broadcasts.
fn default_queue_capacity() -> usize {
    256
}

fn default_ping_interval() -> u64 {
    30
}

fn default_idle_timeout() -> u64 {
    60
}

fn default_close_grace() -> u64 {
    1_000
}
