use axum::extract::ws::Message;
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use std::sync::Mutex;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use uuid::Uuid;

use crate::protocol::{Envelope, ErrorCode, ErrorPayload, ServerKind};

/// Capacity of the bounded outbound buffer between message producers and the
/// connection's write pump.
pub const SEND_BUFFER_CAPACITY: usize = 256;

/// Connection lifecycle: PENDING until `authenticate` succeeds, ACTIVE while
/// the session is live, CLOSING once teardown has begun.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Pending,
    Active,
    Closing,
}

/// Failure to enqueue an outbound frame.
///
/// `BufferFull` signals a stalled peer; the hub records it and lets the read
/// deadline remove the connection rather than retrying.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SendError {
    #[error("outbound send buffer is full")]
    BufferFull,
    #[error("connection is closed")]
    Closed,
    #[error("failed to encode envelope")]
    Encode,
}

#[derive(Debug)]
struct SessionFields {
    state: ConnectionState,
    player_id: Option<String>,
    lobby_code: Option<String>,
    /// Highest seq observed from the client; never regresses.
    last_inbound_seq: u64,
    reconnect_token: Option<String>,
    token_issued_at: Option<DateTime<Utc>>,
    session_expires_at: Option<DateTime<Utc>>,
    last_heartbeat: DateTime<Utc>,
}

/// One live bidirectional session.
///
/// Producers deposit fully marshaled frames into the bounded outbound buffer;
/// the write pump drains them in order. The outbound sequence counter is
/// allocated under the same lock as the enqueue, so delivered seq values are
/// strictly increasing and gap-free and queue order equals seq order.
#[derive(Debug)]
pub struct Connection {
    id: Uuid,
    outbound: mpsc::Sender<Message>,
    seq: Mutex<u64>,
    fields: Mutex<SessionFields>,
}

impl Connection {
    pub fn new(outbound: mpsc::Sender<Message>) -> Self {
        Self {
            id: Uuid::new_v4(),
            outbound,
            seq: Mutex::new(0),
            fields: Mutex::new(SessionFields {
                state: ConnectionState::Pending,
                player_id: None,
                lobby_code: None,
                last_inbound_seq: 0,
                reconnect_token: None,
                token_issued_at: None,
                session_expires_at: None,
                last_heartbeat: Utc::now(),
            }),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> ConnectionState {
        self.lock_fields().state
    }

    pub fn player_id(&self) -> Option<String> {
        self.lock_fields().player_id.clone()
    }

    pub fn lobby_code(&self) -> Option<String> {
        self.lock_fields().lobby_code.clone()
    }

    pub fn last_inbound_seq(&self) -> u64 {
        self.lock_fields().last_inbound_seq
    }

    pub fn last_heartbeat(&self) -> DateTime<Utc> {
        self.lock_fields().last_heartbeat
    }

    pub fn session_expires_at(&self) -> Option<DateTime<Utc>> {
        self.lock_fields().session_expires_at
    }

    pub fn reconnect_token(&self) -> Option<String> {
        self.lock_fields().reconnect_token.clone()
    }

    /// Bind the session identity after successful authentication and
    /// transition to ACTIVE. Issues the fields atomically so a concurrent
    /// reader never sees a half-authenticated connection.
    pub fn activate(
        &self,
        player_id: String,
        lobby_code: String,
        reconnect_token: String,
        session_expires_at: DateTime<Utc>,
    ) {
        let mut fields = self.lock_fields();
        fields.state = ConnectionState::Active;
        fields.player_id = Some(player_id);
        fields.lobby_code = Some(lobby_code);
        fields.reconnect_token = Some(reconnect_token);
        fields.token_issued_at = Some(Utc::now());
        fields.session_expires_at = Some(session_expires_at);
    }

    /// Record an inbound seq; the high-water mark never regresses.
    pub fn record_inbound_seq(&self, seq: u64) {
        let mut fields = self.lock_fields();
        if seq > fields.last_inbound_seq {
            fields.last_inbound_seq = seq;
        }
    }

    pub fn touch_heartbeat(&self) {
        self.lock_fields().last_heartbeat = Utc::now();
    }

    /// Validate a reconnect token supplied by a new authentication attempt
    /// against this (prior) connection's issued token.
    pub fn reconnect_token_valid(&self, supplied: &str, token_ttl: Duration) -> bool {
        let fields = self.lock_fields();
        let (Some(token), Some(issued_at), Some(expires_at)) = (
            fields.reconnect_token.as_deref(),
            fields.token_issued_at,
            fields.session_expires_at,
        ) else {
            return false;
        };
        let now = Utc::now();
        token == supplied && now <= issued_at + token_ttl && now < expires_at
    }

    /// Marshal an envelope for this connection and enqueue it.
    ///
    /// The seq counter and the enqueue are fused under one lock: the counter
    /// only advances when the frame is accepted, so a full buffer does not
    /// burn a sequence number.
    pub fn send(
        &self,
        kind: ServerKind,
        payload: Value,
        correlation_id: Option<String>,
    ) -> Result<u64, SendError> {
        if self.state() == ConnectionState::Closing {
            return Err(SendError::Closed);
        }
        let mut seq = self
            .seq
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let next = *seq + 1;
        let envelope = Envelope::outbound(kind, next, payload, correlation_id);
        let text = match serde_json::to_string(&envelope) {
            Ok(text) => text,
            Err(err) => {
                tracing::error!(connection_id = %self.id, error = %err, "Failed to encode envelope");
                return Err(SendError::Encode);
            }
        };
        match self.outbound.try_send(Message::Text(text.into())) {
            Ok(()) => {
                *seq = next;
                Ok(next)
            }
            Err(TrySendError::Full(_)) => Err(SendError::BufferFull),
            Err(TrySendError::Closed(_)) => Err(SendError::Closed),
        }
    }

    /// Enqueue an ERROR-typed envelope.
    pub fn send_error(
        &self,
        code: ErrorCode,
        message: impl Into<String>,
        correlation_id: Option<String>,
    ) -> Result<u64, SendError> {
        let payload = serde_json::to_value(ErrorPayload::new(code, message))
            .map_err(|_| SendError::Encode)?;
        self.send(ServerKind::Error, payload, correlation_id)
    }

    /// Begin teardown: no further envelopes are accepted and the write pump
    /// is asked to emit a close frame and exit.
    pub fn close(&self) {
        {
            let mut fields = self.lock_fields();
            if fields.state == ConnectionState::Closing {
                return;
            }
            fields.state = ConnectionState::Closing;
        }
        let _ = self.outbound.try_send(Message::Close(None));
    }

    fn lock_fields(&self) -> std::sync::MutexGuard<'_, SessionFields> {
        self.fields
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}
