// REST lobby surface: a thin adapter that translates request bodies into
// registry operations and maps domain sentinels onto status codes.

pub mod dto;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use std::sync::Arc;

use crate::lobby::LobbyError;
use crate::server::GameServer;
use crate::websocket;
use dto::{CreateLobbyRequest, JoinLobbyRequest, LobbyDto, PlayerRequest};

/// Build the application router: lobby CRUD under `/api/v1`, the WebSocket
/// upgrade endpoint, and a health probe.
pub fn create_router(cors_origins: &str) -> Router<Arc<GameServer>> {
    use tower_http::cors::{Any, CorsLayer};
    use tower_http::trace::TraceLayer;

    let cors = if cors_origins == "*" {
        CorsLayer::permissive()
    } else {
        let origins: Vec<_> = cors_origins
            .split(',')
            .filter_map(|s| s.trim().parse::<axum::http::HeaderValue>().ok())
            .collect();

        if origins.is_empty() {
            tracing::warn!("No valid CORS origins configured, using permissive CORS");
            CorsLayer::permissive()
        } else {
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods(Any)
                .allow_headers(Any)
        }
    };

    Router::new()
        .route("/api/v1/lobbies", post(create_lobby).get(list_lobbies))
        .route("/api/v1/lobbies/{code}", get(get_lobby))
        .route("/api/v1/lobbies/{code}/join", post(join_lobby))
        .route("/api/v1/lobbies/{code}/leave", post(leave_lobby))
        .route("/api/v1/lobbies/{code}/start", post(start_lobby))
        .route("/ws/game/{code}", get(websocket::game_socket_handler))
        .route("/health", get(health_check))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

async fn health_check() -> &'static str {
    "OK"
}

async fn create_lobby(
    State(server): State<Arc<GameServer>>,
    Json(body): Json<CreateLobbyRequest>,
) -> Response {
    let (Some(player_id), Some(username)) = (non_empty(body.player_id), non_empty(body.username))
    else {
        return error_response(StatusCode::BAD_REQUEST, "player_id and username are required");
    };

    let lobby = server.registry().create(&player_id, &username);
    (StatusCode::CREATED, Json(LobbyDto::from_lobby(&lobby))).into_response()
}

async fn list_lobbies(State(server): State<Arc<GameServer>>) -> Response {
    let lobbies: Vec<LobbyDto> = server
        .registry()
        .list()
        .iter()
        .map(|lobby| LobbyDto::from_lobby(lobby))
        .collect();
    Json(lobbies).into_response()
}

async fn get_lobby(State(server): State<Arc<GameServer>>, Path(code): Path<String>) -> Response {
    match server.registry().get(&code) {
        Ok(lobby) => Json(LobbyDto::from_lobby(&lobby)).into_response(),
        Err(err) => lobby_error_response(&err),
    }
}

async fn join_lobby(
    State(server): State<Arc<GameServer>>,
    Path(code): Path<String>,
    Json(body): Json<JoinLobbyRequest>,
) -> Response {
    let (Some(player_id), Some(username)) = (non_empty(body.player_id), non_empty(body.username))
    else {
        return error_response(StatusCode::BAD_REQUEST, "player_id and username are required");
    };

    match server.registry().join(&code, &player_id, &username) {
        Ok(lobby) => Json(LobbyDto::from_lobby(&lobby)).into_response(),
        Err(err) => lobby_error_response(&err),
    }
}

async fn leave_lobby(
    State(server): State<Arc<GameServer>>,
    Path(code): Path<String>,
    Json(body): Json<PlayerRequest>,
) -> Response {
    let Some(player_id) = non_empty(body.player_id) else {
        return error_response(StatusCode::BAD_REQUEST, "player_id is required");
    };

    match server.registry().leave(&code, &player_id) {
        Ok(()) => Json(json!({ "message": "left lobby successfully" })).into_response(),
        Err(err) => lobby_error_response(&err),
    }
}

async fn start_lobby(
    State(server): State<Arc<GameServer>>,
    Path(code): Path<String>,
    Json(body): Json<PlayerRequest>,
) -> Response {
    let Some(player_id) = non_empty(body.player_id) else {
        return error_response(StatusCode::BAD_REQUEST, "player_id is required");
    };

    match server.registry().start_game(&code, &player_id) {
        Ok(lobby) => Json(LobbyDto::from_lobby(&lobby)).into_response(),
        Err(err) => lobby_error_response(&err),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

/// Map a context-wrapped domain sentinel onto its status code, serializing
/// the sentinel's own display string as the body.
fn lobby_error_response(err: &anyhow::Error) -> Response {
    let Some(sentinel) = LobbyError::from_anyhow(err) else {
        tracing::error!(error = %err, "Unclassified lobby operation failure");
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, "internal error");
    };

    let status = match sentinel {
        LobbyError::LobbyNotFound | LobbyError::PlayerNotFound => StatusCode::NOT_FOUND,
        LobbyError::NotHost => StatusCode::FORBIDDEN,
        LobbyError::LobbyFull
        | LobbyError::AlreadyJoined
        | LobbyError::InvalidStateForJoin
        | LobbyError::InvalidStateForStart
        | LobbyError::NotEnoughPlayers => StatusCode::CONFLICT,
    };
    error_response(status, &sentinel.to_string())
}
