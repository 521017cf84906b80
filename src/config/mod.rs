//! Application configuration module
//!
//! This module provides type-safe configuration loading from environment variables
//! using the `config` and `dotenvy` crates. Configuration is loaded with the
//! `SIGNAL_HUB` prefix and nested values use double underscores as separators.
//! Every value has a default, so an empty environment yields a runnable config.
//! The broker address also honors the conventional `NATS_URL` variable.
//!
//! # Example
//!
//! ```no_run
//! use signal_hub::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//!
//! println!("Event bus at {}", config.event_bus.url);
//! ```

mod error;
mod event_bus;
mod hub;
mod server;

pub use error::{ConfigError, ValidationError};
pub use event_bus::EventBusConfig;
pub use hub::{HubConfig, OverflowPolicy};
pub use server::{Environment, ServerConfig};

use serde::Deserialize;

/// Root application configuration
///
/// Load using [`AppConfig::load()`] which reads from environment variables.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Server configuration (host, port, environment, logging)
    #[serde(default)]
    pub server: ServerConfig,

    /// Event bus configuration (NATS)
    #[serde(default)]
    pub event_bus: EventBusConfig,

    /// Broadcast hub and client connection tuning
    #[serde(default)]
    pub hub: HubConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// This function:
    /// 1. Loads `.env` file if present (for development)
    /// 2. Reads environment variables with `SIGNAL_HUB` prefix
    /// 3. Uses `__` (double underscore) to separate nested values
    /// 4. Falls back to `NATS_URL` for `event_bus.url` when no prefixed value is set
    /// 5. Deserializes into typed configuration structs
    ///
    /// # Environment Variable Format
    ///
    /// - `SIGNAL_HUB__SERVER__PORT=8080` -> `server.port = 8080`
    /// - `SIGNAL_HUB__EVENT_BUS__URL=...` -> `event_bus.url = ...`
    /// - `SIGNAL_HUB__HUB__CLIENT_QUEUE_CAPACITY=512` -> `hub.client_queue_capacity = 512`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if values cannot be parsed into expected types.
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (development)
        dotenvy::dotenv().ok();

        let mut builder = config::Config::builder();
        if let Ok(nats_url) = std::env::var("NATS_URL") {
            builder = builder.set_default("event_bus.url", nats_url)?;
        }

        let config = builder
            .add_source(
                config::Environment::default()
                    .prefix("SIGNAL_HUB")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if any configuration value is invalid.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.server.validate()?;
        self.event_bus.validate()?;
        self.hub.validate()?;
        Ok(())
    }

    /// Check if running in production environment
    pub fn is_production(&self) -> bool {
        self.server.is_production()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    // Mutex to ensure tests don't run in parallel (env vars are global)
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    const VARS: &[&str] = &[
        "SIGNAL_HUB__SERVER__PORT",
        "SIGNAL_HUB__SERVER__ENVIRONMENT",
        "SIGNAL_HUB__EVENT_BUS__URL",
        "SIGNAL_HUB__HUB__CLIENT_QUEUE_CAPACITY",
        "SIGNAL_HUB__HUB__OVERFLOW_POLICY",
        "NATS_URL",
    ];

    /// Helper to clear environment variables after testing
    fn clear_env() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    #[test]
    fn test_load_with_empty_environment_uses_defaults() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();
        let result = AppConfig::load();

        assert!(result.is_ok(), "Failed to load config: {:?}", result.err());
        let config = result.unwrap();
        assert_eq!(config.server.port, 6001);
        assert_eq!(config.event_bus.url, "nats://localhost:4222");
        assert_eq!(config.hub.client_queue_capacity, 256);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_environment() {
        let _guard = ENV_MUTEX.lock().unwrap();
        env::set_var("SIGNAL_HUB__SERVER__PORT", "3000");
        env::set_var("SIGNAL_HUB__EVENT_BUS__URL", "nats://bus.internal:4223");
        env::set_var("SIGNAL_HUB__HUB__CLIENT_QUEUE_CAPACITY", "512");
        env::set_var("SIGNAL_HUB__HUB__OVERFLOW_POLICY", "drop_message");
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.event_bus.url, "nats://bus.internal:4223");
        assert_eq!(config.hub.client_queue_capacity, 512);
        assert_eq!(config.hub.overflow_policy, OverflowPolicy::DropMessage);
    }

    #[test]
    fn test_nats_url_sets_event_bus_url() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();
        env::set_var("NATS_URL", "nats://broker:4222");
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert_eq!(config.event_bus.url, "nats://broker:4222");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_prefixed_url_overrides_nats_url() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();
        env::set_var("NATS_URL", "nats://broker:4222");
        env::set_var("SIGNAL_HUB__EVENT_BUS__URL", "nats://pinned:4222");
        let result = AppConfig::load();
        clear_env();

        assert_eq!(result.unwrap().event_bus.url, "nats://pinned:4222");
    }

    #[test]
    fn test_is_production() {
        let _guard = ENV_MUTEX.lock().unwrap();
        env::set_var("SIGNAL_HUB__SERVER__ENVIRONMENT", "production");
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert!(config.is_production());
    }

    #[test]
    fn test_validate_rejects_bad_section() {
        let mut config = AppConfig::default();
        config.event_bus.url = "redis://localhost:6379".to_string();
        assert_eq!(config.validate(), Err(ValidationError::InvalidEventBusUrl));
    }
}
