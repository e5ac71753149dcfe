//! Live log channel — websocket subscription and message normalization.
//!
//! The server pushes JSON envelopes `{ "event": "...", "data": ... }` over
//! one socket; this adapter keeps the subscription, normalizes envelopes
//! carrying [`LOG_EVENT`] into `LogEntry`, and hands them to the feed
//! session. Delivery is at-most-once and unacknowledged; a dropped socket
//! surfaces as a `ChannelError` on the feed's error channel. Reconnection
//! policy lives with the embedder, not here.

use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use url::Url;

use crate::auth::Credential;
use crate::errors::ClientError;
use crate::feed::entry::LogEntry;
use crate::feed::FeedSession;

/// Event name for new log entries on the live channel.
pub const LOG_EVENT: &str = "log:new";

#[derive(Debug, Deserialize)]
struct Envelope {
    event: String,
    data: serde_json::Value,
}

/// Parses one wire message. Envelopes for other events and malformed
/// payloads are dropped with a trace/warn, never an error — the channel
/// carries more than log traffic.
fn normalize(text: &str) -> Option<LogEntry> {
    let envelope: Envelope = match serde_json::from_str(text) {
        Ok(e) => e,
        Err(e) => {
            tracing::warn!("unparseable live message: {}", e);
            return None;
        }
    };
    if envelope.event != LOG_EVENT {
        tracing::trace!(event = %envelope.event, "ignoring non-log event");
        return None;
    }
    match serde_json::from_value(envelope.data) {
        Ok(entry) => Some(entry),
        Err(e) => {
            tracing::warn!("malformed log entry payload: {}", e);
            None
        }
    }
}

/// Owns the subscription task. `detach` (or drop) aborts the reader and
/// releases the socket; it never touches an in-flight credential refresh —
/// that is session-scoped, not view-scoped.
pub struct LiveChannelAdapter {
    task: tokio::task::JoinHandle<()>,
}

impl LiveChannelAdapter {
    pub async fn connect(
        stream_url: &Url,
        credential: Option<&Credential>,
        session: Arc<FeedSession>,
        errors: mpsc::UnboundedSender<ClientError>,
    ) -> Result<Self, ClientError> {
        let mut request = stream_url
            .as_str()
            .into_client_request()
            .map_err(|e| ClientError::Channel(e.to_string()))?;

        if let Some(cred) = credential {
            let value = HeaderValue::from_str(&format!("Bearer {}", cred.as_str()))
                .map_err(|e| ClientError::Channel(e.to_string()))?;
            request.headers_mut().insert(AUTHORIZATION, value);
        }

        let (ws, _) = connect_async(request)
            .await
            .map_err(|e| ClientError::Channel(e.to_string()))?;
        tracing::info!(url = %stream_url, "live channel connected");

        let task = tokio::spawn(read_loop(ws, session, errors));
        Ok(Self { task })
    }

    /// Detaches the subscription: no further entries reach the feed.
    pub fn detach(&self) {
        self.task.abort();
    }
}

impl Drop for LiveChannelAdapter {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn read_loop(
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
    session: Arc<FeedSession>,
    errors: mpsc::UnboundedSender<ClientError>,
) {
    let (mut sink, mut stream) = ws.split();
    let mut reported = false;

    while let Some(msg) = stream.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                if let Some(entry) = normalize(&text) {
                    session.apply_live(entry);
                }
            }
            Ok(Message::Ping(payload)) => {
                let _ = sink.send(Message::Pong(payload)).await;
            }
            Ok(Message::Close(frame)) => {
                let reason = frame
                    .map(|f| f.reason.to_string())
                    .unwrap_or_else(|| "closed by server".into());
                let _ = errors.send(ClientError::Channel(reason));
                reported = true;
                break;
            }
            Ok(_) => {}
            Err(e) => {
                let _ = errors.send(ClientError::Channel(e.to_string()));
                reported = true;
                break;
            }
        }
    }
    // a stream that just ends (EOF, no Close frame) is still a dropped
    // subscription and must not go silent
    if !reported {
        let _ = errors.send(ClientError::Channel("connection closed".into()));
    }
    tracing::debug!("live channel reader stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_accepts_log_event() {
        let entry = normalize(
            r#"{"event":"log:new","data":{"timestamp":"2026-08-24T10:00:00Z","level":"info","message":"hello"}}"#,
        )
        .unwrap();
        assert_eq!(entry.message, "hello");
    }

    #[test]
    fn normalize_ignores_other_events() {
        assert!(normalize(r#"{"event":"presence:join","data":{"user":"jane"}}"#).is_none());
    }

    #[test]
    fn normalize_drops_malformed_payloads() {
        assert!(normalize("not json").is_none());
        assert!(normalize(r#"{"event":"log:new","data":{"level":"info"}}"#).is_none());
    }
}
