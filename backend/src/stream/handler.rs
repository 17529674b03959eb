//! Streaming loop for one open event-stream connection.

use super::{PingStyle, StreamWriter};
use crate::session::{SessionError, SessionManager};
use mcpgate_types::SessionId;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Timing of the streaming loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamSettings {
    /// Sleep between queue polls; bounds delivery latency.
    pub poll_interval: Duration,
    pub ping_interval: Duration,
    /// How often the session is re-validated (and kept alive).
    pub liveness_interval: Duration,
    pub ping_style: PingStyle,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            ping_interval: Duration::from_secs(15),
            liveness_interval: Duration::from_secs(5),
            ping_style: PingStyle::SseEvent,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Connecting,
    Streaming,
    ClosedByPeer,
    ClosedByServer,
}

/// Relays queued session events to one client.
pub struct StreamHandler {
    manager: Arc<SessionManager>,
    session_id: SessionId,
    writer: StreamWriter,
    settings: StreamSettings,
    initial_event: Option<(String, Value)>,
    terminate_on_disconnect: bool,
    state: StreamState,
}

impl StreamHandler {
    /// `writer` must already have sent its headers.
    pub fn new(
        manager: Arc<SessionManager>,
        session_id: SessionId,
        writer: StreamWriter,
        settings: StreamSettings,
    ) -> Self {
        Self {
            manager,
            session_id,
            writer,
            settings,
            initial_event: None,
            terminate_on_disconnect: false,
            state: StreamState::Connecting,
        }
    }

    /// Event sent right after the `connected` comment.
    pub fn with_initial_event(mut self, name: impl Into<String>, data: Value) -> Self {
        self.initial_event = Some((name.into(), data));
        self
    }

    /// Terminate the session when the client goes away.
    pub fn terminate_on_disconnect(mut self, enabled: bool) -> Self {
        self.terminate_on_disconnect = enabled;
        self
    }

    pub fn spawn(self) -> JoinHandle<StreamState> {
        tokio::spawn(self.run())
    }

    /// Run until the client disconnects or the session goes away.
    pub async fn run(mut self) -> StreamState {
        let service = self.manager.service_id().to_string();
        info!("[{}] Stream opened for session {}", service, self.session_id);

        let state = self.stream().await;
        self.state = state;

        if state == StreamState::ClosedByPeer && self.terminate_on_disconnect {
            match self.manager.terminate_session(&self.session_id).await {
                Ok(()) | Err(SessionError::NotFound(_)) => {}
                Err(e) => warn!(
                    "[{}] Failed to terminate session {} after disconnect: {}",
                    service, self.session_id, e
                ),
            }
        }

        info!(
            "[{}] Stream for session {} ended: {:?}",
            service, self.session_id, self.state
        );
        self.state
    }

    async fn stream(&mut self) -> StreamState {
        if self.writer.send_comment("connected").await.is_err() {
            return StreamState::ClosedByPeer;
        }
        if let Some((name, data)) = self.initial_event.take() {
            if self.writer.send_event(&name, &data).await.is_err() {
                return StreamState::ClosedByPeer;
            }
        }
        self.state = StreamState::Streaming;

        let mut last_liveness = Instant::now();
        let mut last_ping = Instant::now();

        loop {
            if self.writer.is_closed() {
                return StreamState::ClosedByPeer;
            }

            if last_liveness.elapsed() >= self.settings.liveness_interval {
                last_liveness = Instant::now();
                if let Err(e) = self.manager.get_active_session(&self.session_id, true).await {
                    self.log_session_failure(&e);
                    return StreamState::ClosedByServer;
                }
            }

            match self.manager.next_event(&self.session_id).await {
                Ok(Some(event)) => {
                    debug!(
                        "[{}] Relaying '{}' event to session {}",
                        self.manager.service_id(),
                        event.event,
                        self.session_id
                    );
                    if self.writer.send_event(&event.event, &event.data).await.is_err() {
                        return StreamState::ClosedByPeer;
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    self.log_session_failure(&e);
                    return StreamState::ClosedByServer;
                }
            }

            if last_ping.elapsed() >= self.settings.ping_interval {
                last_ping = Instant::now();
                if self.writer.send_ping(self.settings.ping_style).await.is_err() {
                    return StreamState::ClosedByPeer;
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(self.settings.poll_interval) => {}
                _ = self.writer.closed() => return StreamState::ClosedByPeer,
            }
        }
    }

    fn log_session_failure(&self, err: &SessionError) {
        match err {
            SessionError::NotFound(_) => info!(
                "[{}] Session {} is gone, closing stream",
                self.manager.service_id(),
                self.session_id
            ),
            other => warn!(
                "[{}] Store failure on stream for session {}: {}",
                self.manager.service_id(),
                self.session_id,
                other
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::FileSessionStore;
    use crate::stream::channel;
    use crate::stream::writer::event_stream_headers;
    use axum::body::Body;
    use http_body_util::BodyExt;
    use mcpgate_types::JsonRpcResponse;
    use serde_json::json;
    use tempfile::tempdir;

    fn settings() -> StreamSettings {
        StreamSettings {
            poll_interval: Duration::from_millis(5),
            ping_interval: Duration::from_secs(3600),
            liveness_interval: Duration::from_millis(20),
            ping_style: PingStyle::SseEvent,
        }
    }

    fn open(manager: &Arc<SessionManager>, id: SessionId) -> (StreamHandler, Body) {
        let mut writer = channel(16);
        let response = writer.send_headers(event_stream_headers()).unwrap();
        let handler = StreamHandler::new(manager.clone(), id, writer, settings());
        (handler, response.into_body())
    }

    /// Read body chunks until `needle` shows up.
    async fn read_until(body: &mut Body, needle: &str) -> String {
        let mut text = String::new();
        while !text.contains(needle) {
            let frame = tokio::time::timeout(Duration::from_secs(5), body.frame())
                .await
                .expect("timed out waiting for stream data")
                .expect("stream ended")
                .unwrap();
            if let Ok(data) = frame.into_data() {
                text.push_str(std::str::from_utf8(&data).unwrap());
            }
        }
        text
    }

    #[tokio::test]
    async fn test_relays_queued_events_in_order() {
        let dir = tempdir().unwrap();
        let manager = Arc::new(SessionManager::new(
            "assistant",
            Arc::new(FileSessionStore::new(dir.path())),
        ));
        let id = manager.create_session().await.unwrap();

        manager
            .enqueue_message(&id, &JsonRpcResponse::success(json!(1), json!({"a": 1})))
            .await
            .unwrap();
        manager
            .enqueue_message(&id, &JsonRpcResponse::success(json!(2), json!({"b": 2})))
            .await
            .unwrap();

        let (handler, mut body) = open(&manager, id);
        let task = handler.spawn();

        let text = read_until(&mut body, "\"id\":2").await;
        assert!(text.starts_with(": connected\n\n"));
        let first = text.find("\"id\":1").unwrap();
        let second = text.find("\"id\":2").unwrap();
        assert!(first < second);
        assert!(text.contains("event: message\ndata: {\"jsonrpc\":\"2.0\",\"id\":1,\"result\":{\"a\":1}}\n\n"));

        drop(body);
        let state = tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(state, StreamState::ClosedByPeer);

        // Plain streams leave the session alone
        assert!(manager.get_active_session(&id, false).await.is_ok());
    }

    #[tokio::test]
    async fn test_terminated_session_closes_stream() {
        let dir = tempdir().unwrap();
        let manager = Arc::new(SessionManager::new(
            "assistant",
            Arc::new(FileSessionStore::new(dir.path())),
        ));
        let id = manager.create_session().await.unwrap();

        let (handler, mut body) = open(&manager, id);
        let task = handler.spawn();
        read_until(&mut body, ": connected").await;

        manager.terminate_session(&id).await.unwrap();

        let state = tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(state, StreamState::ClosedByServer);
    }

    #[tokio::test]
    async fn test_initial_event_and_terminate_on_disconnect() {
        let dir = tempdir().unwrap();
        let manager = Arc::new(SessionManager::new(
            "assistant",
            Arc::new(FileSessionStore::new(dir.path())),
        ));
        let id = manager.create_session().await.unwrap();

        let (handler, mut body) = open(&manager, id);
        let task = handler
            .with_initial_event("endpoint", json!("/messages?sessionId=x"))
            .terminate_on_disconnect(true)
            .spawn();

        let text = read_until(&mut body, "endpoint").await;
        assert!(text.contains("event: endpoint\ndata: /messages?sessionId=x\n\n"));

        drop(body);
        let state = tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(state, StreamState::ClosedByPeer);
        assert!(matches!(
            manager.get_active_session(&id, false).await,
            Err(SessionError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_pings_on_interval() {
        let dir = tempdir().unwrap();
        let manager = Arc::new(SessionManager::new(
            "assistant",
            Arc::new(FileSessionStore::new(dir.path())),
        ));
        let id = manager.create_session().await.unwrap();

        let mut writer = channel(16);
        let response = writer.send_headers(event_stream_headers()).unwrap();
        let mut body = response.into_body();
        let handler = StreamHandler::new(
            manager.clone(),
            id,
            writer,
            StreamSettings {
                ping_interval: Duration::from_millis(10),
                ..settings()
            },
        );
        let _task = handler.spawn();

        read_until(&mut body, "event: ping\ndata: {}\n\n").await;
    }
}
