//! Session behavior configuration.

use super::defaults::{
    default_lobby_capacity, default_reconnect_token_ttl_secs, default_session_ttl_hours,
};
use serde::{Deserialize, Serialize};

/// Lobby and session lifetime settings.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    /// Players per lobby. Two for this game; the domain treats it as data.
    #[serde(default = "default_lobby_capacity")]
    pub lobby_capacity: usize,
    /// Hours an authenticated session stays valid.
    #[serde(default = "default_session_ttl_hours")]
    pub session_ttl_hours: u64,
    /// Seconds during which a reconnect token can evict the prior connection.
    #[serde(default = "default_reconnect_token_ttl_secs")]
    pub reconnect_token_ttl_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            lobby_capacity: default_lobby_capacity(),
            session_ttl_hours: default_session_ttl_hours(),
            reconnect_token_ttl_secs: default_reconnect_token_ttl_secs(),
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.lobby_capacity < 2 {
            anyhow::bail!(
                "server.lobby_capacity must be at least 2 (configured: {})",
                self.lobby_capacity
            );
        }
        if self.session_ttl_hours == 0 {
            anyhow::bail!("server.session_ttl_hours must be non-zero");
        }
        Ok(())
    }
}
