use std::future::Future;

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::db::models::Message as ChatMessage;
use crate::relay::registry::{ConnectionRegistry, ConnectionSender};

/// RFC 6455 policy violation.
pub const CLOSE_POLICY_VIOLATION: u16 = 1008;
/// RFC 6455 internal error.
pub const CLOSE_SERVER_ERROR: u16 = 1011;

/// Why a session ended abnormally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// Credential or peer could not be resolved.
    PolicyViolation,
    /// Something broke while the session was active.
    ServerError,
}

impl CloseReason {
    pub fn code(self) -> u16 {
        match self {
            CloseReason::PolicyViolation => CLOSE_POLICY_VIOLATION,
            CloseReason::ServerError => CLOSE_SERVER_ERROR,
        }
    }

    pub fn frame(self, reason: &str) -> Message {
        Message::Close(Some(CloseFrame {
            code: self.code(),
            reason: reason.to_string().into(),
        }))
    }
}

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("authentication rejected")]
    AuthenticationRejected,

    #[error("peer {0} not found")]
    PeerNotFound(i64),

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    #[error("persistence failure: {0}")]
    Persistence(String),
}

impl RelayError {
    pub fn close_reason(&self) -> CloseReason {
        match self {
            RelayError::AuthenticationRejected | RelayError::PeerNotFound(_) => {
                CloseReason::PolicyViolation
            }
            RelayError::Transport(_)
            | RelayError::MalformedPayload(_)
            | RelayError::Persistence(_) => CloseReason::ServerError,
        }
    }
}

/// The collaborators a chat session needs: credential check, user lookup and
/// message storage.
pub trait RelayBackend: Send + Sync {
    fn resolve_identity(&self, credential: &str) -> impl Future<Output = Result<i64, RelayError>> + Send;

    fn user_exists(&self, user_id: i64) -> impl Future<Output = Result<bool, RelayError>> + Send;

    fn insert_message(
        &self,
        sender_id: i64,
        recipient_id: i64,
        content: &str,
    ) -> impl Future<Output = Result<ChatMessage, RelayError>> + Send;
}

/// Client -> server frame. A missing `content` counts as empty.
#[derive(Debug, Deserialize)]
pub struct InboundMessage {
    #[serde(default)]
    pub content: String,
}

/// Server -> client frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    Message(ChatMessage),
}

/// Run one chat connection from handshake to close.
///
/// `credential` is the raw `token` query parameter; `peer_id` the user on the
/// other end of the conversation. Every exit path after registration releases
/// the registry entry exactly once.
pub async fn run<B: RelayBackend>(
    mut socket: WebSocket,
    backend: &B,
    registry: &ConnectionRegistry,
    credential: Option<&str>,
    peer_id: i64,
) {
    let self_id = match authenticate(backend, credential, peer_id).await {
        Ok(id) => id,
        Err(err) => {
            tracing::warn!(peer_id, error = %err, "Chat connection rejected");
            let reason = err.close_reason();
            let _ = socket.send(reason.frame(&err.to_string())).await;
            return;
        }
    };

    let (sink, mut stream) = socket.split();
    let (tx, rx) = mpsc::unbounded_channel::<Message>();
    let writer = tokio::spawn(writer_task(sink, rx));

    let registration = registry.register(self_id, tx.clone());
    tracing::info!(user_id = self_id, peer_id, "Chat session active");

    let session = ActiveSession {
        backend,
        registry,
        self_id,
        peer_id,
    };
    let outcome = session.pump(&mut stream, &tx).await;

    registry.release(&registration);

    match outcome {
        Ok(()) => tracing::info!(user_id = self_id, "Chat session closed"),
        Err(err) => {
            tracing::warn!(user_id = self_id, error = %err, "Chat session failed");
            let _ = tx.send(err.close_reason().frame("Internal error"));
        }
    }

    // Writer drains whatever is queued (including the close frame) and exits
    // once the last sender is gone.
    drop(tx);
    let _ = writer.await;
}

/// Authenticating state: credential first, then the peer.
pub async fn authenticate<B: RelayBackend>(
    backend: &B,
    credential: Option<&str>,
    peer_id: i64,
) -> Result<i64, RelayError> {
    let credential = credential
        .filter(|c| !c.is_empty())
        .ok_or(RelayError::AuthenticationRejected)?;
    let self_id = backend.resolve_identity(credential).await?;

    if !backend.user_exists(peer_id).await? {
        return Err(RelayError::PeerNotFound(peer_id));
    }

    Ok(self_id)
}

pub struct ActiveSession<'a, B> {
    pub backend: &'a B,
    pub registry: &'a ConnectionRegistry,
    pub self_id: i64,
    pub peer_id: i64,
}

impl<'a, B: RelayBackend> ActiveSession<'a, B> {
    /// Process inbound frames one at a time until the client goes away or
    /// something fails.
    async fn pump(
        &self,
        stream: &mut SplitStream<WebSocket>,
        own_tx: &ConnectionSender,
    ) -> Result<(), RelayError> {
        loop {
            let frame = tokio::select! {
                frame = stream.next() => frame,
                _ = own_tx.closed() => {
                    return Err(RelayError::Transport("outbound stream closed".to_string()));
                }
            };

            match frame {
                Some(Ok(Message::Text(text))) => {
                    self.handle_text(text.as_str()).await?;
                }
                Some(Ok(Message::Binary(_))) => {
                    return Err(RelayError::MalformedPayload(
                        "binary frames are not supported".to_string(),
                    ));
                }
                // Pings are answered by the transport layer.
                Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {}
                Some(Ok(Message::Close(_))) | None => return Ok(()),
                Some(Err(e)) => return Err(RelayError::Transport(e.to_string())),
            }
        }
    }

    /// Handle one text payload. Returns the delivered record, or `None` when
    /// the payload was blank and skipped.
    pub async fn handle_text(&self, text: &str) -> Result<Option<ChatMessage>, RelayError> {
        let inbound: InboundMessage = serde_json::from_str(text)
            .map_err(|e| RelayError::MalformedPayload(e.to_string()))?;

        let content = inbound.content.trim();
        if content.is_empty() {
            return Ok(None);
        }

        let record = self
            .backend
            .insert_message(self.self_id, self.peer_id, content)
            .await?;

        tracing::debug!(
            message_id = record.id,
            sender_id = record.sender_id,
            recipient_id = record.recipient_id,
            "Chat message stored"
        );

        self.registry.relay_pair(
            self.self_id,
            self.peer_id,
            &OutboundMessage::Message(record.clone()),
        );

        Ok(Some(record))
    }
}

async fn writer_task(
    mut sink: SplitSink<WebSocket, Message>,
    mut rx: mpsc::UnboundedReceiver<Message>,
) {
    while let Some(msg) = rx.recv().await {
        let closing = matches!(msg, Message::Close(_));
        if sink.send(msg).await.is_err() || closing {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::atomic::{AtomicI64, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeBackend {
        users: Vec<i64>,
        stored: Mutex<Vec<ChatMessage>>,
        next_id: AtomicI64,
        fail_inserts: bool,
    }

    impl FakeBackend {
        fn with_users(users: &[i64]) -> Self {
            FakeBackend {
                users: users.to_vec(),
                ..Default::default()
            }
        }
    }

    impl RelayBackend for FakeBackend {
        async fn resolve_identity(&self, credential: &str) -> Result<i64, RelayError> {
            credential
                .strip_prefix("token-")
                .and_then(|id| id.parse().ok())
                .filter(|id| self.users.contains(id))
                .ok_or(RelayError::AuthenticationRejected)
        }

        async fn user_exists(&self, user_id: i64) -> Result<bool, RelayError> {
            Ok(self.users.contains(&user_id))
        }

        async fn insert_message(
            &self,
            sender_id: i64,
            recipient_id: i64,
            content: &str,
        ) -> Result<ChatMessage, RelayError> {
            if self.fail_inserts {
                return Err(RelayError::Persistence("disk full".to_string()));
            }
            let record = ChatMessage {
                id: self.next_id.fetch_add(1, Ordering::SeqCst) + 1,
                sender_id,
                recipient_id,
                content: content.to_string(),
                created_at: Utc::now(),
                is_read: false,
            };
            self.stored.lock().unwrap().push(record.clone());
            Ok(record)
        }
    }

    fn outbound(rx: &mut mpsc::UnboundedReceiver<Message>) -> serde_json::Value {
        match rx.try_recv().expect("expected a frame") {
            Message::Text(text) => serde_json::from_str(text.as_str()).unwrap(),
            other => panic!("unexpected frame {:?}", other),
        }
    }

    #[tokio::test]
    async fn authenticate_accepts_valid_pair() {
        let backend = FakeBackend::with_users(&[1, 2]);
        assert_eq!(authenticate(&backend, Some("token-1"), 2).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn authenticate_rejects_bad_or_missing_token() {
        let backend = FakeBackend::with_users(&[1, 2]);

        let err = authenticate(&backend, Some("garbage"), 2).await.unwrap_err();
        assert_eq!(err.close_reason(), CloseReason::PolicyViolation);

        let err = authenticate(&backend, None, 2).await.unwrap_err();
        assert!(matches!(err, RelayError::AuthenticationRejected));
    }

    #[tokio::test]
    async fn authenticate_rejects_unknown_peer() {
        let backend = FakeBackend::with_users(&[1]);
        let err = authenticate(&backend, Some("token-1"), 99).await.unwrap_err();
        assert!(matches!(err, RelayError::PeerNotFound(99)));
        assert_eq!(err.close_reason().code(), CLOSE_POLICY_VIOLATION);
    }

    #[tokio::test]
    async fn message_is_stored_then_relayed_to_both() {
        let backend = FakeBackend::with_users(&[1, 2]);
        let registry = ConnectionRegistry::new();
        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();
        registry.register(1, tx_a);
        registry.register(2, tx_b);

        let session = ActiveSession { backend: &backend, registry: &registry, self_id: 1, peer_id: 2 };
        let record = session.handle_text(r#"{"content": "  hi  "}"#).await.unwrap().unwrap();

        assert_eq!(record.content, "hi");
        assert_eq!(backend.stored.lock().unwrap().len(), 1);

        for frame in [outbound(&mut rx_a), outbound(&mut rx_b)] {
            assert_eq!(frame["type"], "message");
            assert_eq!(frame["id"], record.id);
            assert_eq!(frame["sender_id"], 1);
            assert_eq!(frame["recipient_id"], 2);
            assert_eq!(frame["content"], "hi");
            assert_eq!(frame["is_read"], false);
            assert!(frame["created_at"].is_string());
        }
    }

    #[tokio::test]
    async fn blank_content_is_skipped() {
        let backend = FakeBackend::with_users(&[1, 2]);
        let registry = ConnectionRegistry::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        registry.register(1, tx);

        let session = ActiveSession { backend: &backend, registry: &registry, self_id: 1, peer_id: 2 };
        assert!(session.handle_text(r#"{"content": "   \n\t"}"#).await.unwrap().is_none());
        assert!(session.handle_text(r#"{}"#).await.unwrap().is_none());

        assert!(backend.stored.lock().unwrap().is_empty());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn malformed_payload_is_server_error() {
        let backend = FakeBackend::with_users(&[1, 2]);
        let registry = ConnectionRegistry::new();
        let session = ActiveSession { backend: &backend, registry: &registry, self_id: 1, peer_id: 2 };

        let err = session.handle_text("not json").await.unwrap_err();
        assert_eq!(err.close_reason(), CloseReason::ServerError);
    }

    #[tokio::test]
    async fn persistence_failure_delivers_nothing() {
        let backend = FakeBackend {
            users: vec![1, 2],
            fail_inserts: true,
            ..Default::default()
        };
        let registry = ConnectionRegistry::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        registry.register(2, tx);

        let session = ActiveSession { backend: &backend, registry: &registry, self_id: 1, peer_id: 2 };
        let err = session.handle_text(r#"{"content": "hi"}"#).await.unwrap_err();

        assert_eq!(err.close_reason().code(), CLOSE_SERVER_ERROR);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn ids_increase_across_messages() {
        let backend = FakeBackend::with_users(&[1, 2]);
        let registry = ConnectionRegistry::new();
        let session = ActiveSession { backend: &backend, registry: &registry, self_id: 1, peer_id: 2 };

        let first = session.handle_text(r#"{"content": "one"}"#).await.unwrap().unwrap();
        let second = session.handle_text(r#"{"content": "two"}"#).await.unwrap().unwrap();
        assert!(second.id > first.id);
    }
}
