use chrono::Utc;
use serde_json::json;
use std::sync::Arc;

use super::GameServer;
use crate::hub::{Connection, ConnectionState};
use crate::protocol::{
    ClientKind, Envelope, ErrorCode, HeartbeatAckPayload, LobbyEvent, LobbyUpdatedPayload,
    ServerKind, SetReadyPayload, PROTOCOL_VERSION,
};

impl GameServer {
    /// Handle one inbound text frame: validate the envelope, enforce the
    /// authentication gate, and dispatch by message kind.
    ///
    /// Framing errors are answered on the connection and never tear it down
    /// by themselves.
    pub async fn handle_frame(&self, conn: &Arc<Connection>, text: &str) {
        let envelope: Envelope = match serde_json::from_str(text) {
            Ok(envelope) => envelope,
            Err(err) => {
                tracing::debug!(connection_id = %conn.id(), error = %err, "Dropping unparseable frame");
                self.answer_error(conn, ErrorCode::MalformedMessage, "invalid message envelope", None);
                return;
            }
        };

        conn.record_inbound_seq(envelope.seq);

        if envelope.version != PROTOCOL_VERSION {
            self.answer_error(
                conn,
                ErrorCode::VersionMismatch,
                &format!(
                    "unsupported protocol version {} (expected {PROTOCOL_VERSION})",
                    envelope.version
                ),
                envelope.correlation_id,
            );
            return;
        }

        let Some(kind) = ClientKind::parse(&envelope.kind) else {
            self.answer_error(
                conn,
                ErrorCode::MalformedMessage,
                &format!("unknown message type {:?}", envelope.kind),
                envelope.correlation_id,
            );
            return;
        };

        // Everything except `authenticate` requires a live session.
        if kind != ClientKind::Authenticate && conn.state() != ConnectionState::Active {
            self.answer_error(
                conn,
                ErrorCode::AuthRequired,
                "authentication required",
                envelope.correlation_id,
            );
            return;
        }

        match kind {
            ClientKind::Authenticate => self.handle_authenticate(conn, envelope).await,
            ClientKind::Heartbeat => self.handle_heartbeat(conn, envelope.correlation_id),
            ClientKind::RequestLobbyState => {
                self.handle_request_lobby_state(conn, envelope.correlation_id).await;
            }
            ClientKind::SetReady => {
                let payload: SetReadyPayload = match serde_json::from_value(envelope.payload) {
                    Ok(payload) => payload,
                    Err(_) => {
                        self.answer_error(
                            conn,
                            ErrorCode::MalformedMessage,
                            "set_ready payload requires a boolean `ready`",
                            envelope.correlation_id,
                        );
                        return;
                    }
                };
                self.handle_set_ready(conn, payload.ready).await;
            }
            ClientKind::SubmitAction | ClientKind::RequestGameState | ClientKind::RequestRematch => {
                // Battle lifecycle is reserved; the session core stops at
                // game start.
                self.answer_error(
                    conn,
                    ErrorCode::InvalidState,
                    "no active battle",
                    envelope.correlation_id,
                );
            }
            ClientKind::LeaveGame => self.handle_leave_game(conn).await,
        }
    }

    fn handle_heartbeat(&self, conn: &Arc<Connection>, correlation_id: Option<String>) {
        conn.touch_heartbeat();
        let ack = HeartbeatAckPayload {
            server_time: Utc::now().timestamp_millis(),
        };
        if let Ok(body) = serde_json::to_value(ack) {
            if let Err(err) = conn.send(ServerKind::HeartbeatAck, body, correlation_id) {
                tracing::debug!(connection_id = %conn.id(), error = %err, "Failed to send heartbeat ack");
            }
        }
    }

    async fn handle_request_lobby_state(&self, conn: &Arc<Connection>, correlation_id: Option<String>) {
        let Some(lobby_code) = conn.lobby_code() else {
            return;
        };
        let lobby = match self.registry().get(&lobby_code) {
            Ok(lobby) => lobby,
            Err(_) => {
                self.answer_error(conn, ErrorCode::LobbyNotFound, "lobby not found", correlation_id);
                return;
            }
        };
        let payload = LobbyUpdatedPayload {
            event: LobbyEvent::StateChanged,
            lobby: self.lobby_snapshot(&lobby).await,
            event_data: None,
        };
        if let Ok(body) = serde_json::to_value(payload) {
            if let Err(err) = conn.send(ServerKind::LobbyUpdated, body, correlation_id) {
                tracing::debug!(connection_id = %conn.id(), error = %err, "Failed to send lobby state");
            }
        }
    }

    /// Orderly departure: clear ready state, remove the player from the
    /// lobby, notify the remaining member, then unregister the connection.
    async fn handle_leave_game(&self, conn: &Arc<Connection>) {
        let (Some(player_id), Some(lobby_code)) = (conn.player_id(), conn.lobby_code()) else {
            return;
        };

        self.ready.clear_player(&lobby_code, &player_id);

        if let Err(err) = self.registry().leave(&lobby_code, &player_id) {
            tracing::warn!(
                player_id = %player_id,
                lobby_code = %lobby_code,
                error = %err,
                "Leave-game could not remove player from lobby"
            );
        }

        // Only when the lobby survived the departure.
        if self.registry().get(&lobby_code).is_ok() {
            self.broadcast_lobby_update(
                &lobby_code,
                LobbyEvent::PlayerLeft,
                Some(json!({ "player_id": player_id })),
            )
            .await;
        }

        // The departure was just announced; CLOSING suppresses the hub's
        // disconnect hook so it is not announced twice.
        conn.close();
        self.hub().unregister(Arc::clone(conn)).await;
        tracing::info!(player_id = %player_id, lobby_code = %lobby_code, "Player left game");
    }

    fn answer_error(
        &self,
        conn: &Arc<Connection>,
        code: ErrorCode,
        message: &str,
        correlation_id: Option<String>,
    ) {
        if let Err(err) = conn.send_error(code, message, correlation_id) {
            tracing::debug!(connection_id = %conn.id(), error = %err, "Failed to send error envelope");
        }
    }
}
