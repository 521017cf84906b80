//! Configuration error types

use thiserror::Error;

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),
}

/// Errors that can occur during configuration validation
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required configuration missing: {0}")]
    MissingRequired(&'static str),

    #[error("Invalid port number")]
    InvalidPort,

    #[error("Invalid bind address: {0}")]
    InvalidBindAddress(String),

    #[error("Invalid event bus URL format")]
    InvalidEventBusUrl,

    #[error("Reconnect backoff must be greater than zero")]
    InvalidReconnectBackoff,

    #[error("Client queue capacity must be between 1 and 65536")]
    InvalidQueueCapacity,

    #[error("Ping interval must be greater than zero")]
    InvalidPingInterval,

    #[error("Idle timeout must exceed the ping interval")]
    IdleTimeoutTooShort,
}
