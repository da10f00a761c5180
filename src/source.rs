//! Upstream stream source
//!
//! Opens the single long-lived authenticated GET against the room's
//! streaming endpoint and exposes the response body as an unbounded byte
//! chunk stream. One connection per pipeline run; the stream is lazy and
//! non-restartable. Any transport error surfaces as an `Err` item and ends
//! the stream - reconnecting is the supervisor's job, never this module's.

use crate::error::RelayError;
use bytes::Bytes;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use reqwest::header::ACCEPT;

/// Streaming endpoint for a room's messages.
pub fn stream_url(room_id: &str) -> String {
    format!("https://stream.gitter.im/v1/rooms/{}/chatMessages", room_id)
}

/// Open the upstream connection and return its raw chunk stream.
///
/// Attaches the bearer token and JSON accept header before any data flows.
/// A non-2xx status is a connect fault; after that, each item is either one
/// raw frame or the stream's terminal transport error.
pub async fn connect(
    client: &reqwest::Client,
    url: &str,
    token: &str,
) -> Result<BoxStream<'static, Result<Bytes, RelayError>>, RelayError> {
    log::info!("🔌 Connecting to upstream stream: {}", url);

    let response = client
        .get(url)
        .bearer_auth(token)
        .header(ACCEPT, "application/json")
        .send()
        .await
        .map_err(|e| RelayError::Connect(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(RelayError::Connect(format!("upstream returned {}", status)));
    }

    log::info!("✅ Upstream connected ({})", status);

    Ok(response
        .bytes_stream()
        .map(|chunk| chunk.map_err(|e| RelayError::Stream(e.to_string())))
        .boxed())
}
