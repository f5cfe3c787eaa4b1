// WebSocket surface: the upgrade endpoint and the per-connection read and
// write pumps.

mod connection;
pub mod handler;

pub use handler::game_socket_handler;
