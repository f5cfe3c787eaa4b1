use anyhow::Context;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::codes;
use super::error::LobbyError;
use super::lobby::Lobby;

/// Process-wide registry mapping room codes to live lobbies.
///
/// The registry lock guards insert, delete, and lookup; each lobby guards its
/// own mutations. Lookups release the registry lock before touching the
/// lobby, except for [`LobbyRegistry::leave`], which holds the write lock for
/// the whole operation so "remove player and delete-if-empty" is atomic.
///
/// Domain errors cross this boundary wrapped with lobby/player context; the
/// HTTP and protocol layers recover the [`LobbyError`] sentinel by downcast.
pub struct LobbyRegistry {
    lobbies: RwLock<HashMap<String, Arc<Lobby>>>,
    capacity: usize,
}

impl LobbyRegistry {
    pub fn new(capacity: usize) -> Self {
        Self {
            lobbies: RwLock::new(HashMap::new()),
            capacity,
        }
    }

    /// Create a lobby with a freshly generated unique code.
    ///
    /// Codes are rejection-sampled: six characters over a ~30-symbol
    /// alphabet keep expected retries near zero at any realistic room count.
    pub fn create(&self, host_id: &str, host_name: &str) -> Arc<Lobby> {
        let mut lobbies = self.write();
        let code = loop {
            let candidate = codes::generate_code();
            if !lobbies.contains_key(&candidate) {
                break candidate;
            }
        };
        let lobby = Arc::new(Lobby::new(
            code.clone(),
            host_id.to_string(),
            host_name.to_string(),
            self.capacity,
        ));
        lobbies.insert(code.clone(), Arc::clone(&lobby));
        tracing::info!(lobby_code = %code, host_id, "Lobby created");
        lobby
    }

    /// Look up a lobby and delegate the join to its state machine.
    pub fn join(&self, code: &str, id: &str, username: &str) -> anyhow::Result<Arc<Lobby>> {
        let lobby = self.get(code)?;
        lobby
            .add_player(id, username)
            .with_context(|| format!("lobby {code:?}, player {id:?}"))?;
        tracing::info!(lobby_code = %code, player_id = %id, "Player joined lobby");
        Ok(lobby)
    }

    /// Remove a player and delete the lobby if it is now empty.
    pub fn leave(&self, code: &str, id: &str) -> anyhow::Result<()> {
        let mut lobbies = self.write();
        let lobby = lobbies
            .get(code)
            .cloned()
            .ok_or(LobbyError::LobbyNotFound)
            .with_context(|| format!("lobby {code:?}, player {id:?}"))?;
        lobby
            .remove_player(id)
            .with_context(|| format!("lobby {code:?}, player {id:?}"))?;
        if lobby.is_empty() {
            lobbies.remove(code);
            tracing::info!(lobby_code = %code, "Empty lobby deleted");
        }
        tracing::info!(lobby_code = %code, player_id = %id, "Player left lobby");
        Ok(())
    }

    pub fn get(&self, code: &str) -> anyhow::Result<Arc<Lobby>> {
        self.read()
            .get(code)
            .cloned()
            .ok_or(LobbyError::LobbyNotFound)
            .with_context(|| format!("lobby {code:?}"))
    }

    /// Snapshot of all live lobbies.
    pub fn list(&self) -> Vec<Arc<Lobby>> {
        self.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Host-gated READY -> ACTIVE transition.
    pub fn start_game(&self, code: &str, caller_id: &str) -> anyhow::Result<Arc<Lobby>> {
        let lobby = self.get(code)?;
        if !lobby.is_host(caller_id) {
            return Err(LobbyError::NotHost)
                .with_context(|| format!("lobby {code:?}, player {caller_id:?}"));
        }
        lobby
            .start()
            .with_context(|| format!("lobby {code:?}, player {caller_id:?}"))?;
        tracing::info!(lobby_code = %code, host_id = %caller_id, "Game started by host");
        Ok(lobby)
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Arc<Lobby>>> {
        self.lobbies
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Arc<Lobby>>> {
        self.lobbies
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lobby::LobbyState;

    fn registry() -> LobbyRegistry {
        LobbyRegistry::new(2)
    }

    #[test]
    fn create_then_list_contains_the_lobby() {
        let reg = registry();
        let lobby = reg.create("h", "Host");
        let listed = reg.list();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].code(), lobby.code());
    }

    #[test]
    fn join_unknown_code_is_lobby_not_found() {
        let reg = registry();
        let err = reg.join("ZZZZZZ", "p", "Pat").unwrap_err();
        assert_eq!(LobbyError::from_anyhow(&err), Some(LobbyError::LobbyNotFound));
    }

    #[test]
    fn last_leave_deletes_the_lobby() {
        let reg = registry();
        let lobby = reg.create("h", "Host");
        let code = lobby.code().to_string();
        reg.leave(&code, "h").unwrap();
        let err = reg.get(&code).unwrap_err();
        assert_eq!(LobbyError::from_anyhow(&err), Some(LobbyError::LobbyNotFound));
        assert!(reg.is_empty());
    }

    #[test]
    fn partial_leave_keeps_the_lobby_and_reassigns_host() {
        let reg = registry();
        let lobby = reg.create("h", "Host");
        let code = lobby.code().to_string();
        reg.join(&code, "p", "Pat").unwrap();
        reg.leave(&code, "h").unwrap();
        let lobby = reg.get(&code).unwrap();
        assert_eq!(lobby.host_id(), "p");
        assert_eq!(lobby.state(), LobbyState::Waiting);
        assert_eq!(lobby.player_count(), 1);
    }

    #[test]
    fn leave_by_unknown_player_is_player_not_found() {
        let reg = registry();
        let lobby = reg.create("h", "Host");
        let err = reg.leave(lobby.code(), "nobody").unwrap_err();
        assert_eq!(
            LobbyError::from_anyhow(&err),
            Some(LobbyError::PlayerNotFound)
        );
    }

    #[test]
    fn start_is_host_gated() {
        let reg = registry();
        let lobby = reg.create("h", "Host");
        let code = lobby.code().to_string();
        reg.join(&code, "p", "Pat").unwrap();

        let err = reg.start_game(&code, "p").unwrap_err();
        assert_eq!(LobbyError::from_anyhow(&err), Some(LobbyError::NotHost));

        let lobby = reg.start_game(&code, "h").unwrap();
        assert_eq!(lobby.state(), LobbyState::Active);
    }

    #[test]
    fn start_without_full_lobby_reports_invalid_state() {
        let reg = registry();
        let lobby = reg.create("h", "Host");
        let err = reg.start_game(lobby.code(), "h").unwrap_err();
        assert_eq!(
            LobbyError::from_anyhow(&err),
            Some(LobbyError::InvalidStateForStart)
        );
    }

    #[test]
    fn generated_codes_are_unique_across_lobbies() {
        let reg = registry();
        let mut codes = std::collections::HashSet::new();
        for i in 0..50 {
            let lobby = reg.create(&format!("h{i}"), "Host");
            assert!(codes.insert(lobby.code().to_string()));
        }
        assert_eq!(reg.len(), 50);
    }
}
