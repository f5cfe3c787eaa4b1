use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error_codes::ErrorCode;
use crate::lobby::LobbyState;

/// Message kinds a client may send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientKind {
    Authenticate,
    Heartbeat,
    RequestLobbyState,
    SetReady,
    SubmitAction,
    RequestGameState,
    RequestRematch,
    LeaveGame,
}

impl ClientKind {
    /// Parse a wire `type` string. `None` means an unknown kind, which the
    /// dispatcher reports as `MALFORMED_MESSAGE`.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "authenticate" => Some(Self::Authenticate),
            "heartbeat" => Some(Self::Heartbeat),
            "request_lobby_state" => Some(Self::RequestLobbyState),
            "set_ready" => Some(Self::SetReady),
            "submit_action" => Some(Self::SubmitAction),
            "request_game_state" => Some(Self::RequestGameState),
            "request_rematch" => Some(Self::RequestRematch),
            "leave_game" => Some(Self::LeaveGame),
            _ => None,
        }
    }
}

/// Message kinds the server may send. The battle-lifecycle kinds from
/// `GameState` through `RematchStarting` are reserved vocabulary: declared so
/// the wire contract is stable, never emitted by the session core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServerKind {
    Authenticated,
    HeartbeatAck,
    LobbyUpdated,
    GameStarting,
    GameStarted,
    GameState,
    ActionAcknowledged,
    TurnResult,
    SwitchRequired,
    GameEnded,
    RematchRequested,
    RematchStarting,
    Error,
    DisconnectWarning,
}

impl ServerKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Authenticated => "authenticated",
            Self::HeartbeatAck => "heartbeat_ack",
            Self::LobbyUpdated => "lobby_updated",
            Self::GameStarting => "game_starting",
            Self::GameStarted => "game_started",
            Self::GameState => "game_state",
            Self::ActionAcknowledged => "action_acknowledged",
            Self::TurnResult => "turn_result",
            Self::SwitchRequired => "switch_required",
            Self::GameEnded => "game_ended",
            Self::RematchRequested => "rematch_requested",
            Self::RematchStarting => "rematch_starting",
            Self::Error => "error",
            Self::DisconnectWarning => "disconnect_warning",
        }
    }
}

/// Payload of the `authenticate` client message.
///
/// `session_token` is accepted but unused: identity is trusted as asserted,
/// and binding to a real identity provider happens outside the core.
/// `last_seq` lets a reconnecting client report its inbound high-water mark.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticatePayload {
    #[serde(default)]
    pub player_id: String,
    #[serde(default)]
    pub session_token: String,
    #[serde(default)]
    pub lobby_code: String,
    #[serde(default)]
    pub reconnect_token: Option<String>,
    #[serde(default)]
    pub last_seq: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetReadyPayload {
    pub ready: bool,
}

/// Payload of `submit_action`. Parsed for shape only; the session core has no
/// battle engine behind it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitActionPayload {
    pub turn_number: u32,
    pub action_type: String,
    #[serde(default)]
    pub action_data: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestGameStatePayload {
    #[serde(default)]
    pub include_history: bool,
}

/// Payload of the `authenticated` server response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticatedPayload {
    pub player_id: String,
    pub reconnect_token: String,
    pub session_expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatAckPayload {
    /// Server wall clock, milliseconds since the Unix epoch.
    pub server_time: i64,
}

/// Event tags carried on `lobby_updated` envelopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LobbyEvent {
    StateChanged,
    PlayerJoined,
    PlayerLeft,
    PlayerReadyChanged,
}

/// One player as seen in a lobby snapshot.
///
/// `is_ready` is ephemeral session state, not domain state: a player reads as
/// ready only while marked ready *and* connected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    pub id: String,
    pub username: String,
    pub is_host: bool,
    pub is_ready: bool,
    pub connected: bool,
}

/// Point-in-time view of a lobby, broadcast on every membership or readiness
/// change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LobbySnapshot {
    pub code: String,
    pub state: LobbyState,
    pub players: Vec<PlayerSnapshot>,
    pub host_id: String,
    pub max_players: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LobbyUpdatedPayload {
    pub event: LobbyEvent,
    pub lobby: LobbySnapshot,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_data: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameStartingPayload {
    /// Milliseconds since the Unix epoch.
    pub starts_at: i64,
    pub countdown_sec: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameStartedPayload {
    pub game_id: String,
}

/// Payload of every `error` envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub code: ErrorCode,
    pub message: String,
    pub recoverable: bool,
}

impl ErrorPayload {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            recoverable: code.recoverable(),
        }
    }
}
