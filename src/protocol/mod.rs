// Protocol layer: versioned envelope, typed payloads, and wire error codes.

pub mod envelope;
pub mod error_codes;
pub mod messages;

pub use envelope::{Envelope, PROTOCOL_VERSION};
pub use error_codes::ErrorCode;
pub use messages::{
    AuthenticatePayload, AuthenticatedPayload, ClientKind, ErrorPayload, GameStartedPayload,
    GameStartingPayload, HeartbeatAckPayload, LobbyEvent, LobbySnapshot, LobbyUpdatedPayload,
    PlayerSnapshot, RequestGameStatePayload, ServerKind, SetReadyPayload, SubmitActionPayload,
};
