use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

use super::error::LobbyError;

/// Lobby lifecycle state.
///
/// WAITING and READY are derived from occupancy; ACTIVE is terminal with
/// respect to joins (a departure from ACTIVE does not transition back).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LobbyState {
    Waiting,
    Ready,
    Active,
}

impl LobbyState {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Waiting => "waiting",
            Self::Ready => "ready",
            Self::Active => "active",
        }
    }
}

/// A participant in a lobby. Immutable after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: String,
    pub username: String,
}

#[derive(Debug)]
struct LobbyInner {
    players: Vec<Player>,
    host_id: String,
    state: LobbyState,
}

/// A room for exactly two players.
///
/// All mutations and consistent reads go through the internal mutex; each
/// operation is atomic with respect to concurrent callers. Read accessors
/// return owned copies, never references into the guarded state.
#[derive(Debug)]
pub struct Lobby {
    code: String,
    max_players: usize,
    created_at: DateTime<Utc>,
    inner: Mutex<LobbyInner>,
}

impl Lobby {
    /// Create a lobby with the host as its sole player, in WAITING.
    pub fn new(code: String, host_id: String, host_name: String, max_players: usize) -> Self {
        let host = Player {
            id: host_id.clone(),
            username: host_name,
        };
        Self {
            code,
            max_players,
            created_at: Utc::now(),
            inner: Mutex::new(LobbyInner {
                players: vec![host],
                host_id,
                state: LobbyState::Waiting,
            }),
        }
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn max_players(&self) -> usize {
        self.max_players
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Append a player.
    ///
    /// The state check fires before the capacity check: a READY lobby is
    /// "full by state" and a racing third joiner observes
    /// [`LobbyError::InvalidStateForJoin`], not [`LobbyError::LobbyFull`].
    pub fn add_player(&self, id: &str, username: &str) -> Result<(), LobbyError> {
        let mut inner = self.lock();
        if inner.state != LobbyState::Waiting {
            return Err(LobbyError::InvalidStateForJoin);
        }
        if inner.players.iter().any(|p| p.id == id) {
            return Err(LobbyError::AlreadyJoined);
        }
        if inner.players.len() >= self.max_players {
            return Err(LobbyError::LobbyFull);
        }
        inner.players.push(Player {
            id: id.to_string(),
            username: username.to_string(),
        });
        if inner.players.len() == self.max_players {
            inner.state = LobbyState::Ready;
        }
        Ok(())
    }

    /// Remove a player. Reassigns the host to the first remaining player in
    /// insertion order and drops READY back to WAITING when the lobby is no
    /// longer full. ACTIVE is left untouched.
    pub fn remove_player(&self, id: &str) -> Result<(), LobbyError> {
        let mut inner = self.lock();
        let Some(idx) = inner.players.iter().position(|p| p.id == id) else {
            return Err(LobbyError::PlayerNotFound);
        };
        inner.players.remove(idx);
        if inner.state == LobbyState::Ready && inner.players.len() < self.max_players {
            inner.state = LobbyState::Waiting;
        }
        if inner.host_id == id {
            if let Some(next_host) = inner.players.first().map(|p| p.id.clone()) {
                inner.host_id = next_host;
            }
        }
        Ok(())
    }

    /// Transition READY -> ACTIVE. The caller enforces host-only access.
    pub fn start(&self) -> Result<(), LobbyError> {
        let mut inner = self.lock();
        if inner.state != LobbyState::Ready {
            return Err(LobbyError::InvalidStateForStart);
        }
        if inner.players.len() < self.max_players {
            return Err(LobbyError::NotEnoughPlayers);
        }
        inner.state = LobbyState::Active;
        Ok(())
    }

    pub fn state(&self) -> LobbyState {
        self.lock().state
    }

    pub fn player_count(&self) -> usize {
        self.lock().players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().players.is_empty()
    }

    /// Snapshot of the player sequence in insertion order.
    pub fn players(&self) -> Vec<Player> {
        self.lock().players.clone()
    }

    pub fn host_id(&self) -> String {
        self.lock().host_id.clone()
    }

    pub fn has_player(&self, id: &str) -> bool {
        self.lock().players.iter().any(|p| p.id == id)
    }

    pub fn is_host(&self, id: &str) -> bool {
        self.lock().host_id == id
    }

    pub fn can_start(&self) -> bool {
        let inner = self.lock();
        inner.state == LobbyState::Ready && inner.players.len() == self.max_players
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LobbyInner> {
        // A poisoned lobby mutex means a panic mid-mutation; propagating the
        // last consistent state is preferable to poisoning every caller.
        self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_player_lobby() -> Lobby {
        Lobby::new("ABCDEF".into(), "h".into(), "Host".into(), 2)
    }

    #[test]
    fn created_with_host_as_sole_player() {
        let lobby = two_player_lobby();
        assert_eq!(lobby.state(), LobbyState::Waiting);
        assert_eq!(lobby.player_count(), 1);
        assert_eq!(lobby.host_id(), "h");
        assert!(lobby.is_host("h"));
        assert!(lobby.has_player("h"));
        assert!(!lobby.can_start());
    }

    #[test]
    fn join_fills_to_ready() {
        let lobby = two_player_lobby();
        lobby.add_player("p", "Pat").unwrap();
        assert_eq!(lobby.state(), LobbyState::Ready);
        assert_eq!(lobby.player_count(), 2);
        assert!(lobby.can_start());
    }

    #[test]
    fn duplicate_join_is_rejected() {
        let lobby = two_player_lobby();
        assert_eq!(lobby.add_player("h", "Host"), Err(LobbyError::AlreadyJoined));
    }

    #[test]
    fn third_join_fails_with_state_error_not_full() {
        let lobby = two_player_lobby();
        lobby.add_player("p", "Pat").unwrap();
        // Full lobby is READY; the state check fires before capacity.
        assert_eq!(
            lobby.add_player("q", "Quinn"),
            Err(LobbyError::InvalidStateForJoin)
        );
    }

    #[test]
    fn leave_drops_ready_back_to_waiting() {
        let lobby = two_player_lobby();
        lobby.add_player("p", "Pat").unwrap();
        lobby.remove_player("p").unwrap();
        assert_eq!(lobby.state(), LobbyState::Waiting);
        assert_eq!(lobby.player_count(), 1);
    }

    #[test]
    fn host_departure_reassigns_in_insertion_order() {
        let lobby = two_player_lobby();
        lobby.add_player("p", "Pat").unwrap();
        lobby.remove_player("h").unwrap();
        assert_eq!(lobby.host_id(), "p");
        assert!(lobby.is_host("p"));
        assert_eq!(lobby.state(), LobbyState::Waiting);
    }

    #[test]
    fn remove_unknown_player_errors() {
        let lobby = two_player_lobby();
        assert_eq!(lobby.remove_player("zz"), Err(LobbyError::PlayerNotFound));
    }

    #[test]
    fn start_requires_ready() {
        let lobby = two_player_lobby();
        assert_eq!(lobby.start(), Err(LobbyError::InvalidStateForStart));
        lobby.add_player("p", "Pat").unwrap();
        lobby.start().unwrap();
        assert_eq!(lobby.state(), LobbyState::Active);
    }

    #[test]
    fn active_is_terminal_for_joins_but_allows_departures() {
        let lobby = two_player_lobby();
        lobby.add_player("p", "Pat").unwrap();
        lobby.start().unwrap();
        assert_eq!(
            lobby.add_player("q", "Quinn"),
            Err(LobbyError::InvalidStateForJoin)
        );
        lobby.remove_player("p").unwrap();
        // Departure from ACTIVE does not transition the state back.
        assert_eq!(lobby.state(), LobbyState::Active);
    }

    #[test]
    fn players_snapshot_is_a_defensive_copy() {
        let lobby = two_player_lobby();
        let mut snapshot = lobby.players();
        snapshot.clear();
        assert_eq!(lobby.player_count(), 1);
    }

    #[test]
    fn concurrent_joins_admit_exactly_one() {
        use std::sync::Arc;

        let lobby = Arc::new(two_player_lobby());
        let mut handles = Vec::new();
        for i in 0..8 {
            let lobby = Arc::clone(&lobby);
            handles.push(std::thread::spawn(move || {
                lobby.add_player(&format!("p{i}"), "Racer")
            }));
        }
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let successes = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(successes, 1);
        for r in &results {
            if let Err(e) = r {
                assert_eq!(*e, LobbyError::InvalidStateForJoin);
            }
        }
        assert_eq!(lobby.player_count(), 2);
        assert_eq!(lobby.state(), LobbyState::Ready);
    }

    #[test]
    fn state_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&LobbyState::Waiting).unwrap(),
            "\"waiting\""
        );
        assert_eq!(LobbyState::Active.as_str(), "active");
    }
}
