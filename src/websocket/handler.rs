use axum::extract::{Path, State, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::sync::Arc;

use crate::server::GameServer;

/// `GET /ws/game/{code}`: upgrade a socket into a session for an existing
/// lobby. Unknown codes are refused before the upgrade.
pub async fn game_socket_handler(
    State(server): State<Arc<GameServer>>,
    Path(code): Path<String>,
    ws: WebSocketUpgrade,
) -> Response {
    if server.registry().get(&code).is_err() {
        return (StatusCode::NOT_FOUND, Json(json!({ "error": "lobby not found" }))).into_response();
    }

    let max_message_size = server.config().websocket.max_message_size;
    ws.max_message_size(max_message_size)
        .on_upgrade(move |socket| super::connection::handle_socket(socket, server, code))
}
