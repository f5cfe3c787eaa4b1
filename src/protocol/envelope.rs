use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::messages::ServerKind;

/// Current protocol version. Envelopes carrying any other value are rejected
/// with `VERSION_MISMATCH`.
pub const PROTOCOL_VERSION: u32 = 1;

/// The outer structure of every message in both directions: one JSON object
/// per WebSocket text frame.
///
/// `seq` is set by the sender. Server-to-client envelopes carry the
/// per-connection monotone counter; client-to-server envelopes carry whatever
/// the client chose, tracked as an inbound high-water mark.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: String,
    /// Defaults to 0 when absent, which the version gate then rejects.
    #[serde(default)]
    pub version: u32,
    /// Milliseconds since the Unix epoch at send time.
    #[serde(default)]
    pub timestamp: i64,
    /// Client-chosen opaque string, echoed on directed responses.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    #[serde(default)]
    pub seq: u64,
    #[serde(default)]
    pub payload: Value,
}

impl Envelope {
    /// Build a server-originated envelope. `seq` must already be drawn from
    /// the recipient connection's counter.
    pub fn outbound(
        kind: ServerKind,
        seq: u64,
        payload: Value,
        correlation_id: Option<String>,
    ) -> Self {
        Self {
            kind: kind.as_str().to_string(),
            version: PROTOCOL_VERSION,
            timestamp: Utc::now().timestamp_millis(),
            correlation_id,
            seq,
            payload,
        }
    }
}
