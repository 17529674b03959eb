//! Raw output primitive for long-lived event-stream responses.
//!
//! The writer owns the sending half of a channel whose receiving half is the
//! HTTP response body. Every frame is sent as its own chunk so it is flushed
//! to the client immediately.

use axum::{
    body::{Body, Bytes},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::Response,
};
use mcpgate_types::jsonrpc::ping_notification;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::convert::Infallible;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

/// How keep-alive pings are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PingStyle {
    /// `event: ping` with an empty object as data.
    #[default]
    SseEvent,
    /// A bare JSON-RPC `ping` notification line.
    JsonRpcLine,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum StreamError {
    #[error("Response headers have not been sent")]
    HeadersNotSent,

    #[error("Response headers were already sent")]
    HeadersAlreadySent,

    #[error("Client disconnected")]
    Closed,
}

/// Writer side of a streaming response.
///
/// `Send + Sync`, so handlers holding `&StreamWriter` across awaits can be spawned.
pub struct StreamWriter {
    tx: mpsc::Sender<Result<Bytes, Infallible>>,
    /// Held until the headers go out.
    body: Mutex<Option<Body>>,
}

/// Create a writer and the body it feeds.
///
/// `capacity` bounds the number of frames buffered ahead of the client.
pub fn channel(capacity: usize) -> StreamWriter {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    StreamWriter {
        tx,
        body: Mutex::new(Some(Body::from_stream(ReceiverStream::new(rx)))),
    }
}

impl StreamWriter {
    /// Build the `200 OK` response carrying `headers` and the streaming body.
    ///
    /// Must be called exactly once, before any frame is written.
    pub fn send_headers(&mut self, headers: HeaderMap) -> Result<Response, StreamError> {
        let body = self.body.get_mut().take().ok_or(StreamError::HeadersAlreadySent)?;

        let mut response = Response::new(body);
        *response.status_mut() = StatusCode::OK;
        *response.headers_mut() = headers;
        response
            .headers_mut()
            .insert("x-accel-buffering", HeaderValue::from_static("no"));
        Ok(response)
    }

    /// `event: <name>` followed by the payload as `data:` lines.
    pub async fn send_event(&self, name: &str, data: &Value) -> Result<(), StreamError> {
        self.send_raw(format_event(name, data)).await
    }

    /// SSE comment line, ignored by clients.
    pub async fn send_comment(&self, text: &str) -> Result<(), StreamError> {
        self.send_raw(format!(": {}\n\n", text)).await
    }

    /// Bare JSON line.
    pub async fn send_message(&self, message: &Value) -> Result<(), StreamError> {
        self.send_raw(format!("{}\n", message)).await
    }

    pub async fn send_ping(&self, style: PingStyle) -> Result<(), StreamError> {
        match style {
            PingStyle::SseEvent => self.send_raw("event: ping\ndata: {}\n\n".to_string()).await,
            PingStyle::JsonRpcLine => self.send_message(&ping_notification()).await,
        }
    }

    /// Whether the client went away (the body was dropped).
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Resolves once the client has gone away.
    pub async fn closed(&self) {
        self.tx.closed().await
    }

    async fn send_raw(&self, frame: String) -> Result<(), StreamError> {
        let pending = self.body.lock().is_some();
        if pending {
            return Err(StreamError::HeadersNotSent);
        }
        self.tx
            .send(Ok(Bytes::from(frame)))
            .await
            .map_err(|_| StreamError::Closed)
    }
}

/// Format one SSE event. Strings are sent raw, everything else as compact JSON.
pub(crate) fn format_event(name: &str, data: &Value) -> String {
    let payload = match data {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    };

    let mut frame = format!("event: {}\n", name);
    for line in payload.split("\r\n").flat_map(|part| part.split(['\r', '\n'])) {
        frame.push_str("data: ");
        frame.push_str(line);
        frame.push('\n');
    }
    frame.push('\n');
    frame
}

/// Standard headers for an event-stream response.
pub(crate) fn event_stream_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/event-stream; charset=utf-8"),
    );
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers
}
