//! WebSocket configuration types.

use super::defaults::{
    default_max_message_size, default_ping_interval_secs, default_read_timeout_secs,
    default_send_buffer_size, default_write_timeout_secs,
};
use serde::{Deserialize, Serialize};

/// WebSocket connection settings: pump timings and buffer bounds.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct WebSocketConfig {
    /// Interval between transport-level pings from the write pump
    #[serde(default = "default_ping_interval_secs")]
    pub ping_interval_secs: u64,
    /// Read deadline; extended by each pong
    #[serde(default = "default_read_timeout_secs")]
    pub read_timeout_secs: u64,
    /// Per-frame write deadline
    #[serde(default = "default_write_timeout_secs")]
    pub write_timeout_secs: u64,
    /// Maximum inbound frame size in bytes
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,
    /// Capacity of the per-connection outbound buffer
    #[serde(default = "default_send_buffer_size")]
    pub send_buffer_size: usize,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            ping_interval_secs: default_ping_interval_secs(),
            read_timeout_secs: default_read_timeout_secs(),
            write_timeout_secs: default_write_timeout_secs(),
            max_message_size: default_max_message_size(),
            send_buffer_size: default_send_buffer_size(),
        }
    }
}

impl WebSocketConfig {
    /// Validate WebSocket configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.ping_interval_secs >= self.read_timeout_secs {
            anyhow::bail!(
                "websocket.ping_interval_secs ({}) must be below read_timeout_secs ({}) or every connection times out between pings",
                self.ping_interval_secs,
                self.read_timeout_secs
            );
        }
        if self.send_buffer_size == 0 {
            anyhow::bail!("websocket.send_buffer_size must be non-zero");
        }
        if self.max_message_size < 1024 {
            anyhow::bail!(
                "websocket.max_message_size must be at least 1024 bytes (configured: {})",
                self.max_message_size
            );
        }
        Ok(())
    }
}
