//! Configuration module.
//!
//! Supports JSON configuration files, environment variable overrides, and
//! compiled-in defaults.
//!
//! # Module Structure
//!
//! - [`server`]: lobby and session lifetime settings
//! - [`websocket`]: pump timings and buffer bounds
//! - [`security`]: CORS settings for the HTTP surface
//! - [`logging`]: logging configuration
//! - [`crate::config::loader`]: configuration loading functions
//! - [`crate::config::defaults`]: default value functions

pub mod defaults;
pub mod loader;
pub mod logging;
pub mod security;
pub mod server;
pub mod websocket;

use serde::{Deserialize, Serialize};

pub use loader::load;
pub use logging::{LogFormat, LogLevel, LoggingConfig};
pub use security::SecurityConfig;
pub use server::ServerConfig;
pub use websocket::WebSocketConfig;

use defaults::default_port;

/// Root configuration.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub websocket: WebSocketConfig,
    #[serde(default)]
    pub security: SecurityConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: default_port(),
            server: ServerConfig::default(),
            websocket: WebSocketConfig::default(),
            security: SecurityConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Validate every section; returns the first failure.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.server.validate()?;
        self.websocket.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = Config::default();

        assert_eq!(config.port, 8080);
        assert_eq!(config.server.lobby_capacity, 2);
        assert_eq!(config.server.session_ttl_hours, 24);
        assert_eq!(config.server.reconnect_token_ttl_secs, 300);

        assert_eq!(config.websocket.ping_interval_secs, 54);
        assert_eq!(config.websocket.read_timeout_secs, 60);
        assert_eq!(config.websocket.write_timeout_secs, 10);
        assert_eq!(config.websocket.max_message_size, 8192);
        assert_eq!(config.websocket.send_buffer_size, 256);

        assert_eq!(config.security.cors_origins, "*");
        assert_eq!(config.logging.dir, "logs");
        assert_eq!(config.logging.rotation, "daily");
    }

    #[test]
    fn test_config_serialization_round_trip() {
        let config = Config::default();
        let json = serde_json::to_string_pretty(&config).unwrap();
        let deserialized: Config = serde_json::from_str(&json).unwrap();

        assert_eq!(config.port, deserialized.port);
        assert_eq!(config.server.lobby_capacity, deserialized.server.lobby_capacity);
        assert_eq!(
            config.websocket.ping_interval_secs,
            deserialized.websocket.ping_interval_secs
        );
    }

    #[test]
    fn default_config_validates() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn ping_interval_must_undercut_read_timeout() {
        let mut config = Config::default();
        config.websocket.ping_interval_secs = 90;
        assert!(config.validate().is_err());
    }

    #[test]
    fn one_player_lobbies_are_rejected() {
        let mut config = Config::default();
        config.server.lobby_capacity = 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_log_level_parsing() {
        let level: LogLevel = serde_json::from_str("\"WARNING\"").unwrap();
        assert_eq!(level, LogLevel::Warn);
        assert_eq!(level.as_str(), "warn");
        assert!(serde_json::from_str::<LogLevel>("\"loud\"").is_err());
    }
}
