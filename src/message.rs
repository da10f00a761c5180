//! Frame filtering and message decoding
//!
//! The upstream stream interleaves JSON message frames with near-empty
//! keep-alive frames (a bare line terminator). `has_payload` drops the
//! keep-alives before any parsing happens; `decode_frame` turns a surviving
//! frame into a `Message`.
//!
//! Decode policy: a malformed frame is an item-local fault. The caller logs
//! it and moves on; it must never take down an otherwise healthy connection.

use serde::Deserialize;

/// Frames at or below this length carry no message payload.
pub const KEEP_ALIVE_MAX_LEN: usize = 2;

/// One chat message decoded from a single stream frame. Immutable once
/// decoded; `sent_at` keeps the source timestamp format (RFC 3339).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: String,
    pub author: String,
    pub sent_at: String,
    pub text: String,
}

#[derive(Debug, Deserialize)]
struct WireMessage {
    id: String,
    text: String,
    sent: String,
    #[serde(rename = "fromUser")]
    from_user: WireUser,
}

#[derive(Debug, Deserialize)]
struct WireUser {
    #[serde(rename = "displayName")]
    display_name: String,
}

#[derive(Debug)]
pub struct DecodeError(serde_json::Error);

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid message frame: {}", self.0)
    }
}

impl std::error::Error for DecodeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.0)
    }
}

/// Keep-alive filter: pure predicate, keep frames longer than 2 bytes.
pub fn has_payload(chunk: &[u8]) -> bool {
    chunk.len() > KEEP_ALIVE_MAX_LEN
}

/// Parse one frame as a JSON message object.
///
/// Trailing line-terminator whitespace from the transport framing is
/// tolerated by the JSON parser.
pub fn decode_frame(chunk: &[u8]) -> Result<Message, DecodeError> {
    let wire: WireMessage = serde_json::from_slice(chunk).map_err(DecodeError)?;
    Ok(Message {
        id: wire.id,
        author: wire.from_user.display_name,
        sent_at: wire.sent,
        text: wire.text,
    })
}
