use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::{Arc, Weak};

use crate::hub::{ConnectionHub, DisconnectHandler};
use crate::lobby::{Lobby, LobbyRegistry};
use crate::protocol::{LobbyEvent, LobbySnapshot, LobbyUpdatedPayload, PlayerSnapshot, ServerKind};

mod auth;
mod dispatch;
mod ready_state;

pub use ready_state::ReadyTracker;

/// Runtime knobs for the session core.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Players per lobby. Two for this game.
    pub lobby_capacity: usize,
    /// How long an authenticated session stays valid.
    pub session_ttl: chrono::Duration,
    /// Window in which a reconnect token may evict the prior connection.
    pub reconnect_token_ttl: chrono::Duration,
    /// Transport pump timings and buffer bounds.
    pub websocket: crate::config::WebSocketConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            lobby_capacity: 2,
            session_ttl: chrono::Duration::hours(24),
            reconnect_token_ttl: chrono::Duration::minutes(5),
            websocket: crate::config::WebSocketConfig::default(),
        }
    }
}

impl SessionConfig {
    /// Derive the runtime configuration from the loaded file config.
    pub fn from_config(config: &crate::config::Config) -> Self {
        Self {
            lobby_capacity: config.server.lobby_capacity,
            session_ttl: chrono::Duration::hours(config.server.session_ttl_hours as i64),
            reconnect_token_ttl: chrono::Duration::seconds(
                config.server.reconnect_token_ttl_secs as i64,
            ),
            websocket: config.websocket.clone(),
        }
    }
}

/// The session core: lobby registry, connection hub, ephemeral ready state,
/// and the per-message dispatch that ties them together.
pub struct GameServer {
    registry: Arc<LobbyRegistry>,
    hub: Arc<ConnectionHub>,
    ready: ReadyTracker,
    config: SessionConfig,
}

impl GameServer {
    /// Build the server and wire the hub's disconnect hook back into the
    /// session layer.
    pub async fn new(config: SessionConfig) -> Arc<Self> {
        let registry = Arc::new(LobbyRegistry::new(config.lobby_capacity));
        let hub = ConnectionHub::new();

        let server = Arc::new(Self {
            registry,
            hub: Arc::clone(&hub),
            ready: ReadyTracker::new(),
            config,
        });

        let handler = Arc::new(ServerDisconnectHandler {
            server: Arc::downgrade(&server),
        });
        hub.set_disconnect_handler(handler).await;

        server
    }

    pub fn registry(&self) -> &Arc<LobbyRegistry> {
        &self.registry
    }

    pub fn hub(&self) -> &Arc<ConnectionHub> {
        &self.hub
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    #[cfg(test)]
    pub(crate) fn ready_tracker(&self) -> &ReadyTracker {
        &self.ready
    }

    /// Point-in-time lobby view for broadcast payloads. A player reads as
    /// ready only while marked ready in the tracker *and* connected, so a
    /// disconnection implicitly unreadies.
    pub(crate) async fn lobby_snapshot(&self, lobby: &Arc<Lobby>) -> LobbySnapshot {
        let host_id = lobby.host_id();
        let mut players = Vec::new();
        for player in lobby.players() {
            let connected = self.hub.is_connected(&player.id).await;
            let is_ready = connected && self.ready.is_ready(lobby.code(), &player.id);
            players.push(PlayerSnapshot {
                is_host: player.id == host_id,
                is_ready,
                connected,
                id: player.id,
                username: player.username,
            });
        }
        LobbySnapshot {
            code: lobby.code().to_string(),
            state: lobby.state(),
            players,
            host_id,
            max_players: lobby.max_players(),
        }
    }

    /// Broadcast a `lobby_updated` envelope with a fresh snapshot to every
    /// member of a lobby. A vanished lobby is a no-op.
    pub(crate) async fn broadcast_lobby_update(
        &self,
        lobby_code: &str,
        event: LobbyEvent,
        event_data: Option<Value>,
    ) {
        let Ok(lobby) = self.registry.get(lobby_code) else {
            return;
        };
        let payload = LobbyUpdatedPayload {
            event,
            lobby: self.lobby_snapshot(&lobby).await,
            event_data,
        };
        match serde_json::to_value(payload) {
            Ok(payload) => {
                self.hub
                    .broadcast_to_lobby(lobby_code, ServerKind::LobbyUpdated, &payload)
                    .await;
            }
            Err(err) => {
                tracing::error!(lobby_code, error = %err, "Failed to encode lobby update");
            }
        }
    }

    /// Disconnect-path cleanup, invoked by the hub after index removal:
    /// clear the player's ready entry and tell the remaining members.
    pub(crate) async fn handle_player_disconnected(&self, player_id: &str, lobby_code: &str) {
        self.ready.clear_player(lobby_code, player_id);
        self.broadcast_lobby_update(
            lobby_code,
            LobbyEvent::PlayerLeft,
            Some(json!({ "player_id": player_id })),
        )
        .await;
        tracing::info!(player_id, lobby_code, "Player disconnected");
    }
}

/// Adapter from the hub's disconnect seam into the session layer. Holds a
/// weak reference: the hub lives inside the server, so a strong reference
/// would cycle.
struct ServerDisconnectHandler {
    server: Weak<GameServer>,
}

#[async_trait]
impl DisconnectHandler for ServerDisconnectHandler {
    async fn on_disconnect(&self, player_id: &str, lobby_code: &str) {
        if let Some(server) = self.server.upgrade() {
            server.handle_player_disconnected(player_id, lobby_code).await;
        }
    }
}
