#![cfg_attr(not(test), deny(clippy::panic))]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions
)]

//! # Duelgate
//!
//! Server-authoritative lobby and real-time session server for a two-player,
//! turn-based battle game.
//!
//! In-memory only: no database, no external services. Clients create and
//! join lobbies over REST, then open a WebSocket session for the ready-up
//! handshake and authoritative game events.

/// REST lobby surface and router
pub mod api;

/// Server configuration and environment overrides
pub mod config;

/// Connection hub: live session registry and fan-out
pub mod hub;

/// Lobby domain state machine and registry
pub mod lobby;

/// Structured logging configuration
pub mod logging;

/// Wire protocol: envelope, messages, error codes
pub mod protocol;

/// Session core: dispatch, authentication, ready coordination
pub mod server;

/// WebSocket upgrade endpoint and connection pumps
pub mod websocket;
