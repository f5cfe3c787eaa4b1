use chrono::Utc;
use dashmap::DashMap;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;

use super::GameServer;
use crate::hub::Connection;
use crate::protocol::{GameStartedPayload, GameStartingPayload, LobbyEvent, ServerKind};

/// Ephemeral per-lobby readiness, outside the lobby domain.
///
/// Entries are cleared per-player on disconnect and per-lobby when the game
/// starts; an emptied inner map is removed so no dangling lobby keys remain.
#[derive(Clone, Default)]
pub struct ReadyTracker {
    lobbies: Arc<DashMap<String, HashMap<String, bool>>>,
}

impl ReadyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, lobby_code: &str, player_id: &str, ready: bool) {
        self.lobbies
            .entry(lobby_code.to_string())
            .or_default()
            .insert(player_id.to_string(), ready);
    }

    pub fn is_ready(&self, lobby_code: &str, player_id: &str) -> bool {
        self.lobbies
            .get(lobby_code)
            .and_then(|players| players.get(player_id).copied())
            .unwrap_or(false)
    }

    pub fn clear_player(&self, lobby_code: &str, player_id: &str) {
        if let dashmap::mapref::entry::Entry::Occupied(mut entry) =
            self.lobbies.entry(lobby_code.to_string())
        {
            entry.get_mut().remove(player_id);
            if entry.get().is_empty() {
                entry.remove();
            }
        }
    }

    pub fn clear_lobby(&self, lobby_code: &str) {
        self.lobbies.remove(lobby_code);
    }

    /// Whether every listed player is marked ready. Vacuously true for an
    /// empty list.
    pub fn all_ready<'a>(&self, lobby_code: &str, player_ids: impl IntoIterator<Item = &'a str>) -> bool {
        player_ids
            .into_iter()
            .all(|player_id| self.is_ready(lobby_code, player_id))
    }

    pub fn has_lobby(&self, lobby_code: &str) -> bool {
        self.lobbies.contains_key(lobby_code)
    }
}

impl GameServer {
    /// Record a readiness toggle, broadcast the updated snapshot, and start
    /// the game when the lobby is fully ready and fully connected.
    pub(super) async fn handle_set_ready(&self, conn: &Arc<Connection>, ready: bool) {
        let (Some(player_id), Some(lobby_code)) = (conn.player_id(), conn.lobby_code()) else {
            return;
        };
        self.ready.set(&lobby_code, &player_id, ready);
        tracing::debug!(player_id = %player_id, lobby_code = %lobby_code, ready, "Ready state changed");

        self.broadcast_lobby_update(
            &lobby_code,
            LobbyEvent::PlayerReadyChanged,
            Some(json!({ "player_id": player_id, "ready": ready })),
        )
        .await;

        self.try_start_game(&lobby_code).await;
    }

    /// The start predicate: the lobby is at capacity, every member has a
    /// live connection, and every member is marked ready. When it holds,
    /// announce `game_starting` then `game_started` and drop the lobby's
    /// ready state.
    ///
    /// This path does not touch the domain lobby's state; domain ACTIVE is
    /// reserved for the host-initiated HTTP start.
    pub(super) async fn try_start_game(&self, lobby_code: &str) {
        let Ok(lobby) = self.registry().get(lobby_code) else {
            return;
        };
        let players = lobby.players();
        if players.len() != lobby.max_players() {
            return;
        }
        if self.hub().lobby_connection_count(lobby_code).await != lobby.max_players() {
            return;
        }
        if !self
            .ready
            .all_ready(lobby_code, players.iter().map(|p| p.id.as_str()))
        {
            return;
        }
        for player in &players {
            if !self.hub().is_connected(&player.id).await {
                return;
            }
        }

        let starting = GameStartingPayload {
            starts_at: Utc::now().timestamp_millis(),
            countdown_sec: 0,
        };
        let started = GameStartedPayload {
            game_id: lobby_code.to_string(),
        };
        let (Ok(starting), Ok(started)) = (
            serde_json::to_value(starting),
            serde_json::to_value(started),
        ) else {
            tracing::error!(lobby_code, "Failed to encode game start payloads");
            return;
        };

        self.hub()
            .broadcast_to_lobby(lobby_code, ServerKind::GameStarting, &starting)
            .await;
        self.hub()
            .broadcast_to_lobby(lobby_code, ServerKind::GameStarted, &started)
            .await;
        self.ready.clear_lobby(lobby_code);
        tracing::info!(lobby_code, "All players ready, game started");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggling_ready_round_trips() {
        let tracker = ReadyTracker::new();
        tracker.set("ROOM", "p1", true);
        assert!(tracker.is_ready("ROOM", "p1"));
        tracker.set("ROOM", "p1", false);
        assert!(!tracker.is_ready("ROOM", "p1"));
    }

    #[test]
    fn unknown_entries_read_unready() {
        let tracker = ReadyTracker::new();
        assert!(!tracker.is_ready("ROOM", "p1"));
    }

    #[test]
    fn clearing_the_last_player_removes_the_lobby_key() {
        let tracker = ReadyTracker::new();
        tracker.set("ROOM", "p1", true);
        tracker.set("ROOM", "p2", true);
        tracker.clear_player("ROOM", "p1");
        assert!(tracker.has_lobby("ROOM"));
        tracker.clear_player("ROOM", "p2");
        assert!(!tracker.has_lobby("ROOM"));
    }

    #[test]
    fn clear_lobby_drops_everything() {
        let tracker = ReadyTracker::new();
        tracker.set("ROOM", "p1", true);
        tracker.clear_lobby("ROOM");
        assert!(!tracker.has_lobby("ROOM"));
        assert!(!tracker.is_ready("ROOM", "p1"));
    }

    #[test]
    fn all_ready_is_vacuously_true_for_no_players() {
        let tracker = ReadyTracker::new();
        assert!(tracker.all_ready("ROOM", std::iter::empty()));
    }

    #[test]
    fn all_ready_requires_every_listed_player() {
        let tracker = ReadyTracker::new();
        tracker.set("ROOM", "p1", true);
        assert!(tracker.all_ready("ROOM", ["p1"]));
        assert!(!tracker.all_ready("ROOM", ["p1", "p2"]));
        tracker.set("ROOM", "p2", true);
        assert!(tracker.all_ready("ROOM", ["p1", "p2"]));
    }
}
