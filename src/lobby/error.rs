use thiserror::Error;

/// Sentinel errors produced by the lobby state machine and registry.
///
/// Display strings are client-facing: the HTTP adapter serializes them
/// verbatim into `{"error": ...}` bodies and the protocol layer reuses them
/// as error-envelope messages.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum LobbyError {
    #[error("lobby not found")]
    LobbyNotFound,

    #[error("lobby is full")]
    LobbyFull,

    #[error("player already joined")]
    AlreadyJoined,

    /// Join attempted while the lobby is READY or ACTIVE. Checked before
    /// capacity, so a full lobby reports this and not [`LobbyError::LobbyFull`].
    #[error("cannot join lobby in current state")]
    InvalidStateForJoin,

    #[error("cannot start game in current state")]
    InvalidStateForStart,

    #[error("not enough players to start")]
    NotEnoughPlayers,

    #[error("player not found in lobby")]
    PlayerNotFound,

    #[error("only the host can start the game")]
    NotHost,
}

impl LobbyError {
    /// Recover the sentinel from a context-wrapped [`anyhow::Error`].
    pub fn from_anyhow(err: &anyhow::Error) -> Option<Self> {
        err.downcast_ref::<Self>().copied()
    }
}
