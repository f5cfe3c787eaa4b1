use serde::{Deserialize, Serialize};
use std::fmt;

/// Wire error codes for structured error handling.
///
/// Every error envelope carries one of these plus a recoverability flag;
/// clients use the flag to decide whether to tear the session down.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Session errors
    AuthRequired,
    AuthFailed,
    SessionExpired,

    // Lobby errors
    LobbyNotFound,
    LobbyFull,
    InvalidState,
    PlayerNotInLobby,

    // Battle errors (reserved; the session core never enters a battle)
    InvalidAction,
    NotYourTurn,
    TurnMismatch,
    ActionTimeout,

    // Protocol framing errors
    MalformedMessage,
    VersionMismatch,

    // Server errors
    InternalError,
}

impl ErrorCode {
    /// Whether the client can keep the session after receiving this error.
    ///
    /// Anything not listed here signals a broken session: the client should
    /// reconnect and re-authenticate.
    pub const fn recoverable(self) -> bool {
        matches!(
            self,
            Self::InvalidState
                | Self::InvalidAction
                | Self::NotYourTurn
                | Self::TurnMismatch
                | Self::MalformedMessage
        )
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AuthRequired => "AUTH_REQUIRED",
            Self::AuthFailed => "AUTH_FAILED",
            Self::SessionExpired => "SESSION_EXPIRED",
            Self::LobbyNotFound => "LOBBY_NOT_FOUND",
            Self::LobbyFull => "LOBBY_FULL",
            Self::InvalidState => "INVALID_STATE",
            Self::PlayerNotInLobby => "PLAYER_NOT_IN_LOBBY",
            Self::InvalidAction => "INVALID_ACTION",
            Self::NotYourTurn => "NOT_YOUR_TURN",
            Self::TurnMismatch => "TURN_MISMATCH",
            Self::ActionTimeout => "ACTION_TIMEOUT",
            Self::MalformedMessage => "MALFORMED_MESSAGE",
            Self::VersionMismatch => "VERSION_MISMATCH",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialization_matches_wire_strings() {
        let json = serde_json::to_string(&ErrorCode::LobbyNotFound).unwrap();
        assert_eq!(json, "\"LOBBY_NOT_FOUND\"");
        let parsed: ErrorCode = serde_json::from_str("\"VERSION_MISMATCH\"").unwrap();
        assert_eq!(parsed, ErrorCode::VersionMismatch);
    }

    #[test]
    fn as_str_agrees_with_serde() {
        for code in [
            ErrorCode::AuthRequired,
            ErrorCode::AuthFailed,
            ErrorCode::SessionExpired,
            ErrorCode::LobbyNotFound,
            ErrorCode::LobbyFull,
            ErrorCode::InvalidState,
            ErrorCode::PlayerNotInLobby,
            ErrorCode::InvalidAction,
            ErrorCode::NotYourTurn,
            ErrorCode::TurnMismatch,
            ErrorCode::ActionTimeout,
            ErrorCode::MalformedMessage,
            ErrorCode::VersionMismatch,
            ErrorCode::InternalError,
        ] {
            let json = serde_json::to_string(&code).unwrap();
            assert_eq!(json, format!("\"{}\"", code.as_str()));
        }
    }

    #[test]
    fn recoverability_table() {
        for code in [
            ErrorCode::InvalidState,
            ErrorCode::InvalidAction,
            ErrorCode::NotYourTurn,
            ErrorCode::TurnMismatch,
            ErrorCode::MalformedMessage,
        ] {
            assert!(code.recoverable(), "{code} should be recoverable");
        }
        for code in [
            ErrorCode::AuthRequired,
            ErrorCode::AuthFailed,
            ErrorCode::SessionExpired,
            ErrorCode::LobbyNotFound,
            ErrorCode::LobbyFull,
            ErrorCode::PlayerNotInLobby,
            ErrorCode::ActionTimeout,
            ErrorCode::VersionMismatch,
            ErrorCode::InternalError,
        ] {
            assert!(!code.recoverable(), "{code} should not be recoverable");
        }
    }
}
