use chrono::Utc;
use rand::RngCore;
use std::fmt::Write as _;
use std::sync::Arc;

use super::GameServer;
use crate::hub::Connection;
use crate::lobby::LobbyError;
use crate::protocol::{
    AuthenticatePayload, AuthenticatedPayload, Envelope, ErrorCode, LobbyEvent,
    LobbyUpdatedPayload, ServerKind,
};

/// 32 cryptographically random bytes, hex-encoded.
fn generate_reconnect_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().fold(String::with_capacity(64), |mut out, b| {
        let _ = write!(out, "{b:02x}");
        out
    })
}

impl GameServer {
    /// The `authenticate` handler: bind asserted identity to this connection,
    /// evict or displace any prior session for the same player, and deliver
    /// the session credentials plus an initial lobby snapshot.
    pub(super) async fn handle_authenticate(&self, conn: &Arc<Connection>, envelope: Envelope) {
        let correlation_id = envelope.correlation_id;

        let payload: AuthenticatePayload = match serde_json::from_value(envelope.payload) {
            Ok(payload) => payload,
            Err(err) => {
                tracing::warn!(connection_id = %conn.id(), error = %err, "Unparseable authenticate payload");
                self.reject(conn, ErrorCode::AuthFailed, "invalid authenticate payload", correlation_id);
                return;
            }
        };

        if payload.player_id.is_empty() || payload.lobby_code.is_empty() {
            self.reject(
                conn,
                ErrorCode::AuthFailed,
                "player_id and lobby_code are required",
                correlation_id,
            );
            return;
        }

        // Codes are stored uppercase and compared bytewise; no normalization.
        let lobby = match self.registry().get(&payload.lobby_code) {
            Ok(lobby) => lobby,
            Err(err) => {
                debug_assert_eq!(LobbyError::from_anyhow(&err), Some(LobbyError::LobbyNotFound));
                self.reject(conn, ErrorCode::LobbyNotFound, "lobby not found", correlation_id);
                return;
            }
        };

        if !lobby.has_player(&payload.player_id) {
            self.reject(
                conn,
                ErrorCode::PlayerNotInLobby,
                "player is not a member of this lobby",
                correlation_id,
            );
            return;
        }

        // At most one live session per player: a validated reconnect token
        // evicts the prior connection explicitly; otherwise the new session
        // displaces it through the single-valued player index all the same.
        if let Some(prior) = self.hub().get_connection_by_player_id(&payload.player_id).await {
            if prior.id() != conn.id() {
                let resumed = payload.reconnect_token.as_deref().is_some_and(|token| {
                    prior.reconnect_token_valid(token, self.config().reconnect_token_ttl)
                });
                if resumed {
                    tracing::info!(
                        player_id = %payload.player_id,
                        prior_connection = %prior.id(),
                        "Reconnect token validated, evicting prior session"
                    );
                } else {
                    tracing::info!(
                        player_id = %payload.player_id,
                        prior_connection = %prior.id(),
                        "New authentication displaces existing session"
                    );
                }
                self.hub().unregister(prior).await;
            }
        }

        if let Some(last_seq) = payload.last_seq {
            // No replay buffer; the reported high-water mark is diagnostic only.
            tracing::debug!(player_id = %payload.player_id, last_seq, "Client reported last received seq");
        }

        let reconnect_token = generate_reconnect_token();
        let session_expires_at = Utc::now() + self.config().session_ttl;
        conn.activate(
            payload.player_id.clone(),
            payload.lobby_code.clone(),
            reconnect_token.clone(),
            session_expires_at,
        );
        self.hub().associate_with_lobby(conn).await;

        let authenticated = AuthenticatedPayload {
            player_id: payload.player_id.clone(),
            reconnect_token,
            session_expires_at,
        };
        match serde_json::to_value(authenticated) {
            Ok(body) => {
                if let Err(err) = conn.send(ServerKind::Authenticated, body, correlation_id) {
                    tracing::warn!(connection_id = %conn.id(), error = %err, "Failed to send authenticated response");
                    return;
                }
            }
            Err(err) => {
                tracing::error!(error = %err, "Failed to encode authenticated payload");
                return;
            }
        }

        let snapshot = LobbyUpdatedPayload {
            event: LobbyEvent::StateChanged,
            lobby: self.lobby_snapshot(&lobby).await,
            event_data: None,
        };
        if let Ok(body) = serde_json::to_value(snapshot) {
            if let Err(err) = conn.send(ServerKind::LobbyUpdated, body, None) {
                tracing::warn!(connection_id = %conn.id(), error = %err, "Failed to send lobby snapshot");
            }
        }

        tracing::info!(
            connection_id = %conn.id(),
            player_id = %payload.player_id,
            lobby_code = %payload.lobby_code,
            "Session authenticated"
        );
    }

    fn reject(
        &self,
        conn: &Arc<Connection>,
        code: ErrorCode,
        message: &str,
        correlation_id: Option<String>,
    ) {
        if let Err(err) = conn.send_error(code, message, correlation_id) {
            tracing::debug!(connection_id = %conn.id(), error = %err, "Failed to send auth rejection");
        }
    }
}
