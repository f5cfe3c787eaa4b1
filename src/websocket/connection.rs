use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval, sleep_until, timeout, Instant, MissedTickBehavior};

use crate::hub::Connection;
use crate::protocol::ErrorCode;
use crate::server::GameServer;

/// Drive one upgraded socket: register a PENDING connection with the hub,
/// run the two pumps, and unregister when either side finishes.
///
/// Handlers never touch the socket; everything outbound goes through the
/// connection's bounded buffer and is written here, in deposit order.
pub(super) async fn handle_socket(socket: WebSocket, server: Arc<GameServer>, lobby_code: String) {
    let ws_config = server.config().websocket.clone();
    let (sink, stream) = socket.split();
    let (tx, rx) = mpsc::channel::<Message>(ws_config.send_buffer_size);
    let conn = Arc::new(Connection::new(tx));
    server.hub().register(Arc::clone(&conn)).await;

    tracing::info!(
        connection_id = %conn.id(),
        lobby_code = %lobby_code,
        "WebSocket connection established"
    );

    let mut write_task = tokio::spawn(write_pump(
        sink,
        rx,
        Duration::from_secs(ws_config.ping_interval_secs),
        Duration::from_secs(ws_config.write_timeout_secs),
    ));
    let mut read_task = tokio::spawn(read_pump(
        stream,
        Arc::clone(&server),
        Arc::clone(&conn),
        Duration::from_secs(ws_config.read_timeout_secs),
    ));

    tokio::select! {
        _ = &mut write_task => {
            // The socket is unwritable; there is nothing left to read for.
            read_task.abort();
        }
        _ = &mut read_task => {
            // Unregister closes the buffer below; the write pump drains the
            // close frame and exits on its own.
        }
    }

    server.hub().unregister(Arc::clone(&conn)).await;
    tracing::info!(connection_id = %conn.id(), "WebSocket connection closed");
}

/// Read pump: deadline-bounded frame intake and dispatch.
///
/// The deadline is extended only by pongs; a peer that stops answering pings
/// is gone within one read-timeout window.
async fn read_pump(
    mut stream: SplitStream<WebSocket>,
    server: Arc<GameServer>,
    conn: Arc<Connection>,
    read_timeout: Duration,
) {
    let mut deadline = Instant::now() + read_timeout;
    loop {
        let frame = tokio::select! {
            frame = stream.next() => frame,
            () = sleep_until(deadline) => {
                tracing::warn!(
                    connection_id = %conn.id(),
                    player_id = conn.player_id().as_deref().unwrap_or(""),
                    "Read deadline exceeded, dropping connection"
                );
                return;
            }
        };

        let Some(frame) = frame else {
            return; // peer closed the stream
        };
        let frame = match frame {
            Ok(frame) => frame,
            Err(err) => {
                tracing::debug!(connection_id = %conn.id(), error = %err, "WebSocket read error");
                return;
            }
        };

        match frame {
            Message::Text(text) => {
                server.handle_frame(&conn, text.as_str()).await;
            }
            Message::Pong(_) => {
                deadline = Instant::now() + read_timeout;
            }
            Message::Ping(_) => {
                // axum answers pings on our behalf
            }
            Message::Binary(_) => {
                // One JSON envelope per text frame; binary has no meaning here.
                if conn
                    .send_error(ErrorCode::MalformedMessage, "binary frames are not supported", None)
                    .is_err()
                {
                    return;
                }
            }
            Message::Close(_) => {
                tracing::debug!(connection_id = %conn.id(), "Peer sent close frame");
                return;
            }
        }
    }
}

/// Write pump: drain the outbound buffer in order with a per-frame deadline,
/// interleaving transport pings. A close frame (deposited by the hub on
/// unregister) or a closed buffer ends the pump.
async fn write_pump(
    mut sink: SplitSink<WebSocket, Message>,
    mut rx: mpsc::Receiver<Message>,
    ping_interval: Duration,
    write_timeout: Duration,
) {
    let mut ping = interval(ping_interval);
    ping.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ping.tick().await; // the first tick fires immediately; skip it

    loop {
        tokio::select! {
            message = rx.recv() => {
                let Some(message) = message else {
                    // Every sender dropped; emit a best-effort close frame.
                    let _ = timeout(write_timeout, sink.send(Message::Close(None))).await;
                    return;
                };
                let closing = matches!(message, Message::Close(_));
                if !write_frame(&mut sink, message, write_timeout).await || closing {
                    return;
                }
            }
            _ = ping.tick() => {
                let ping_frame = Message::Ping(axum::body::Bytes::new());
                if !write_frame(&mut sink, ping_frame, write_timeout).await {
                    return;
                }
            }
        }
    }
}

async fn write_frame(
    sink: &mut SplitSink<WebSocket, Message>,
    message: Message,
    write_timeout: Duration,
) -> bool {
    match timeout(write_timeout, sink.send(message)).await {
        Ok(Ok(())) => true,
        Ok(Err(err)) => {
            tracing::debug!(error = %err, "WebSocket write failed");
            false
        }
        Err(_) => {
            tracing::warn!("Write deadline exceeded, dropping connection");
            false
        }
    }
}
