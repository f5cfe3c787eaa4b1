// Lobby domain: room lifecycle state machine, code generation, and the
// process-wide registry.

pub mod codes;
pub mod error;
#[allow(clippy::module_inception)]
pub mod lobby;
pub mod registry;

pub use error::LobbyError;
pub use lobby::{Lobby, LobbyState, Player};
pub use registry::LobbyRegistry;
