use serde::{Deserialize, Serialize};

use crate::lobby::{Lobby, LobbyState};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerDto {
    pub id: String,
    pub username: String,
}

/// The lobby as exposed over REST. The WebSocket snapshot is richer (it adds
/// readiness and connectivity); this is purely domain state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LobbyDto {
    pub code: String,
    pub state: LobbyState,
    pub players: Vec<PlayerDto>,
    pub host_id: String,
    pub max_players: usize,
}

impl LobbyDto {
    pub fn from_lobby(lobby: &Lobby) -> Self {
        Self {
            code: lobby.code().to_string(),
            state: lobby.state(),
            players: lobby
                .players()
                .into_iter()
                .map(|p| PlayerDto {
                    id: p.id,
                    username: p.username,
                })
                .collect(),
            host_id: lobby.host_id(),
            max_players: lobby.max_players(),
        }
    }
}

/// Request bodies use optional fields so missing values map to a 400 with an
/// explanatory body instead of a bare deserialization rejection.
#[derive(Debug, Deserialize)]
pub struct CreateLobbyRequest {
    pub player_id: Option<String>,
    pub username: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct JoinLobbyRequest {
    pub player_id: Option<String>,
    pub username: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PlayerRequest {
    pub player_id: Option<String>,
}
