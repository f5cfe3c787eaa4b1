// Connection hub: registry of live sessions indexed by identity and lobby.
//
// Index writes for registration and unregistration flow through a single
// coordinator task fed by two channels, which gives callers a lock-free
// registration path and a strict happens-before between a completed
// register/unregister and any later index read. Read paths (broadcast,
// lookup, counts) take the index read lock directly.

pub mod connection;

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, RwLock};
use uuid::Uuid;

use crate::protocol::{ErrorCode, ServerKind};

pub use connection::{Connection, ConnectionState, SendError, SEND_BUFFER_CAPACITY};

/// Hook invoked after a player's connection has been unregistered, outside
/// any hub lock. The session layer uses it to clear ephemeral ready state and
/// notify the player's lobby.
#[async_trait]
pub trait DisconnectHandler: Send + Sync {
    async fn on_disconnect(&self, player_id: &str, lobby_code: &str);
}

#[derive(Default)]
struct HubIndices {
    /// Every registered connection, authenticated or not.
    connections: HashMap<Uuid, Arc<Connection>>,
    by_lobby: HashMap<String, HashMap<Uuid, Arc<Connection>>>,
    /// At most one live connection per player; a second authentication for
    /// the same ID displaces the first.
    by_player: HashMap<String, Arc<Connection>>,
}

type HubEvent = (Arc<Connection>, oneshot::Sender<()>);

pub struct ConnectionHub {
    indices: Arc<RwLock<HubIndices>>,
    register_tx: mpsc::Sender<HubEvent>,
    unregister_tx: mpsc::Sender<HubEvent>,
    disconnect_handler: Arc<RwLock<Option<Arc<dyn DisconnectHandler>>>>,
}

impl ConnectionHub {
    /// Create the hub and spawn its coordinator task.
    pub fn new() -> Arc<Self> {
        let (register_tx, register_rx) = mpsc::channel::<HubEvent>(1);
        let (unregister_tx, unregister_rx) = mpsc::channel::<HubEvent>(1);
        let indices = Arc::new(RwLock::new(HubIndices::default()));
        let disconnect_handler = Arc::new(RwLock::new(None));

        tokio::spawn(coordinator_loop(
            Arc::clone(&indices),
            Arc::clone(&disconnect_handler),
            register_rx,
            unregister_rx,
        ));

        Arc::new(Self {
            indices,
            register_tx,
            unregister_tx,
            disconnect_handler,
        })
    }

    /// Install the disconnect hook. Wiring happens once at startup, before
    /// any connection is accepted.
    pub async fn set_disconnect_handler(&self, handler: Arc<dyn DisconnectHandler>) {
        *self.disconnect_handler.write().await = Some(handler);
    }

    /// Add a connection to the all-connections set. The connection is still
    /// PENDING at this point.
    pub async fn register(&self, conn: Arc<Connection>) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.register_tx.send((conn, done_tx)).await.is_err() {
            tracing::error!("Hub coordinator is gone; registration dropped");
            return;
        }
        let _ = done_rx.await;
    }

    /// Remove a connection from all indices, invoke the disconnect hook for
    /// an authenticated session, and close the connection's send channel.
    pub async fn unregister(&self, conn: Arc<Connection>) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.unregister_tx.send((conn, done_tx)).await.is_err() {
            tracing::error!("Hub coordinator is gone; unregistration dropped");
            return;
        }
        let _ = done_rx.await;
    }

    /// Index an authenticated connection under its player ID and lobby code.
    /// A pre-existing player entry is overwritten; the authentication flow
    /// unregisters the prior connection before calling this.
    pub async fn associate_with_lobby(&self, conn: &Arc<Connection>) {
        let (Some(player_id), Some(lobby_code)) = (conn.player_id(), conn.lobby_code()) else {
            tracing::error!(connection_id = %conn.id(), "Cannot associate an unauthenticated connection");
            return;
        };
        let mut indices = self.indices.write().await;
        indices
            .by_lobby
            .entry(lobby_code.clone())
            .or_default()
            .insert(conn.id(), Arc::clone(conn));
        indices.by_player.insert(player_id.clone(), Arc::clone(conn));
        drop(indices);
        tracing::debug!(
            connection_id = %conn.id(),
            player_id = %player_id,
            lobby_code = %lobby_code,
            "Connection associated with lobby"
        );
    }

    /// Fan an event out to every active connection in a lobby.
    ///
    /// The envelope is constructed and marshaled per recipient: each carries
    /// that connection's own seq, so sharing marshaled bytes would be wrong.
    pub async fn broadcast_to_lobby(&self, lobby_code: &str, kind: ServerKind, payload: &Value) {
        self.broadcast_filtered(lobby_code, kind, payload, |_| true).await;
    }

    /// As [`Self::broadcast_to_lobby`], skipping one player.
    pub async fn broadcast_to_lobby_except(
        &self,
        lobby_code: &str,
        except_player_id: &str,
        kind: ServerKind,
        payload: &Value,
    ) {
        self.broadcast_filtered(lobby_code, kind, payload, |conn| {
            conn.player_id().as_deref() != Some(except_player_id)
        })
        .await;
    }

    async fn broadcast_filtered<F>(&self, lobby_code: &str, kind: ServerKind, payload: &Value, keep: F)
    where
        F: Fn(&Arc<Connection>) -> bool,
    {
        let recipients = self.lobby_connections(lobby_code).await;
        for conn in recipients.iter().filter(|c| keep(c)) {
            match conn.send(kind, payload.clone(), None) {
                Ok(_) => {}
                Err(SendError::BufferFull) => {
                    // Stalled peer; the read deadline will remove it.
                    tracing::warn!(
                        connection_id = %conn.id(),
                        player_id = conn.player_id().as_deref().unwrap_or(""),
                        lobby_code = %lobby_code,
                        "Send buffer full during broadcast, dropping frame"
                    );
                }
                Err(err) => {
                    tracing::debug!(
                        connection_id = %conn.id(),
                        error = %err,
                        "Broadcast skipped closed connection"
                    );
                }
            }
        }
    }

    /// Deliver an event to one player. Absent player is a no-op, not an
    /// error.
    pub async fn send_to_player(&self, player_id: &str, kind: ServerKind, payload: Value) {
        self.send_to_player_with_correlation(player_id, kind, payload, None)
            .await;
    }

    /// As [`Self::send_to_player`], preserving a caller-supplied correlation
    /// ID on the outbound envelope.
    pub async fn send_to_player_with_correlation(
        &self,
        player_id: &str,
        kind: ServerKind,
        payload: Value,
        correlation_id: Option<String>,
    ) {
        let Some(conn) = self.get_connection_by_player_id(player_id).await else {
            return;
        };
        if let Err(err) = conn.send(kind, payload, correlation_id) {
            tracing::warn!(player_id = %player_id, error = %err, "Failed to deliver message to player");
        }
    }

    /// Deliver an ERROR-typed envelope to one player.
    pub async fn send_error_to_player(
        &self,
        player_id: &str,
        code: ErrorCode,
        message: &str,
        correlation_id: Option<String>,
    ) {
        let Some(conn) = self.get_connection_by_player_id(player_id).await else {
            return;
        };
        if let Err(err) = conn.send_error(code, message, correlation_id) {
            tracing::warn!(player_id = %player_id, error = %err, "Failed to deliver error to player");
        }
    }

    /// Force-disconnect whatever connection currently holds a player ID.
    pub async fn disconnect_player(&self, player_id: &str) {
        if let Some(conn) = self.get_connection_by_player_id(player_id).await {
            self.unregister(conn).await;
        }
    }

    pub async fn connection_count(&self) -> usize {
        self.indices.read().await.connections.len()
    }

    pub async fn lobby_connection_count(&self, lobby_code: &str) -> usize {
        self.indices
            .read()
            .await
            .by_lobby
            .get(lobby_code)
            .map_or(0, HashMap::len)
    }

    pub async fn is_connected(&self, player_id: &str) -> bool {
        self.indices.read().await.by_player.contains_key(player_id)
    }

    pub async fn get_connection_by_player_id(&self, player_id: &str) -> Option<Arc<Connection>> {
        self.indices.read().await.by_player.get(player_id).cloned()
    }

    /// Snapshot of the active connections in a lobby.
    pub async fn lobby_connections(&self, lobby_code: &str) -> Vec<Arc<Connection>> {
        self.indices
            .read()
            .await
            .by_lobby
            .get(lobby_code)
            .map(|conns| {
                conns
                    .values()
                    .filter(|c| c.state() == ConnectionState::Active)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Coordinator task: the single writer for registration and unregistration.
async fn coordinator_loop(
    indices: Arc<RwLock<HubIndices>>,
    disconnect_handler: Arc<RwLock<Option<Arc<dyn DisconnectHandler>>>>,
    mut register_rx: mpsc::Receiver<HubEvent>,
    mut unregister_rx: mpsc::Receiver<HubEvent>,
) {
    loop {
        tokio::select! {
            event = register_rx.recv() => {
                let Some((conn, done)) = event else { break };
                indices.write().await.connections.insert(conn.id(), conn);
                let _ = done.send(());
            }
            event = unregister_rx.recv() => {
                let Some((conn, done)) = event else { break };
                process_unregister(&indices, &disconnect_handler, conn).await;
                let _ = done.send(());
            }
        }
    }
    tracing::debug!("Hub coordinator stopped");
}

async fn process_unregister(
    indices: &Arc<RwLock<HubIndices>>,
    disconnect_handler: &Arc<RwLock<Option<Arc<dyn DisconnectHandler>>>>,
    conn: Arc<Connection>,
) {
    let player_id = conn.player_id();
    let lobby_code = conn.lobby_code();
    // A connection already in CLOSING announced its own departure (the
    // leave-game path); the disconnect hook must not repeat it.
    let was_closing = conn.state() == ConnectionState::Closing;

    let owned_session = {
        let mut idx = indices.write().await;
        let was_registered = idx.connections.remove(&conn.id()).is_some();

        if let Some(code) = &lobby_code {
            if let Some(members) = idx.by_lobby.get_mut(code) {
                members.remove(&conn.id());
                if members.is_empty() {
                    idx.by_lobby.remove(code);
                }
            }
        }

        // The player-index removal is conditional on the entry being *this*
        // connection, so a rapid re-authentication is not clobbered.
        let mut owned = false;
        if let Some(pid) = &player_id {
            if idx.by_player.get(pid).is_some_and(|c| c.id() == conn.id()) {
                idx.by_player.remove(pid);
                owned = true;
            }
        }
        was_registered && owned
    };

    // The hook is captured under its own lock and invoked with no hub lock
    // held: it is expected to call back into the hub.
    if owned_session && !was_closing {
        let handler = disconnect_handler.read().await.clone();
        if let (Some(handler), Some(pid), Some(code)) = (handler, &player_id, &lobby_code) {
            handler.on_disconnect(pid, code).await;
        }
    }

    conn.close();
    tracing::info!(
        connection_id = %conn.id(),
        player_id = player_id.as_deref().unwrap_or(""),
        "Connection unregistered"
    );
}
