use std::sync::atomic::{AtomicU64, Ordering};

use axum::extract::ws::{Message, Utf8Bytes};
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::mpsc;

/// Sender half feeding one socket's writer task.
pub type ConnectionSender = mpsc::UnboundedSender<Message>;

struct Connection {
    id: u64,
    tx: ConnectionSender,
}

/// Proof that a particular connection was registered. A closing session hands
/// it back through [`ConnectionRegistry::release`] so it only ever removes its
/// own entry, never a newer connection that replaced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Registration {
    pub user_id: i64,
    connection_id: u64,
}

/// Who is currently reachable: user id -> the single live socket for that user.
///
/// Backed by a sharded map, so every mutation and every lookup-and-send runs
/// under the lock of the shard that owns the key.
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: DashMap<i64, Connection>,
    next_connection_id: AtomicU64,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `tx` as the live connection for `user_id`. Any previous entry for
    /// the same user is replaced (last writer wins).
    pub fn register(&self, user_id: i64, tx: ConnectionSender) -> Registration {
        let connection_id = self.next_connection_id.fetch_add(1, Ordering::Relaxed);
        let previous = self
            .connections
            .insert(user_id, Connection { id: connection_id, tx });

        if previous.is_some() {
            tracing::debug!(user_id, "Connection replaced by newer registration");
        } else {
            tracing::debug!(user_id, "Connection registered");
        }

        Registration {
            user_id,
            connection_id,
        }
    }

    /// Remove whatever entry `user_id` has. No-op when absent.
    pub fn unregister(&self, user_id: i64) {
        if self.connections.remove(&user_id).is_some() {
            tracing::debug!(user_id, "Connection unregistered");
        }
    }

    /// Remove `user_id`'s entry and queue `close` on its socket, so the session
    /// ends instead of lingering unregistered. Returns whether a connection
    /// was live.
    pub fn disconnect(&self, user_id: i64, close: Message) -> bool {
        let Some((_, conn)) = self.connections.remove(&user_id) else {
            return false;
        };

        if conn.tx.send(close).is_err() {
            tracing::debug!(user_id, "Disconnected socket was already gone");
        } else {
            tracing::debug!(user_id, "Connection disconnected");
        }
        true
    }

    /// Remove the entry only if it still belongs to `registration`.
    /// Returns whether anything was removed.
    pub fn release(&self, registration: &Registration) -> bool {
        let removed = self
            .connections
            .remove_if(&registration.user_id, |_, conn| {
                conn.id == registration.connection_id
            })
            .is_some();

        if removed {
            tracing::debug!(user_id = registration.user_id, "Connection released");
        }
        removed
    }

    /// Push `payload` to `user_id` as a JSON text frame. Returns whether the
    /// frame was handed to a live connection. A dead connection is dropped
    /// from the registry; the failure never propagates to the caller.
    pub fn deliver<T: Serialize>(&self, user_id: i64, payload: &T) -> bool {
        match serde_json::to_string(payload) {
            Ok(text) => self.deliver_frame(user_id, text.into()),
            Err(e) => {
                tracing::error!(user_id, error = %e, "Failed to encode outbound payload");
                false
            }
        }
    }

    /// Deliver to `id_a` then `id_b`, unconditionally. Delivering to the
    /// sender echoes its own message back as the canonical copy.
    pub fn relay_pair<T: Serialize>(&self, id_a: i64, id_b: i64, payload: &T) {
        let text: Utf8Bytes = match serde_json::to_string(payload) {
            Ok(text) => text.into(),
            Err(e) => {
                tracing::error!(error = %e, "Failed to encode outbound payload");
                return;
            }
        };

        self.deliver_frame(id_a, text.clone());
        self.deliver_frame(id_b, text);
    }

    pub fn is_online(&self, user_id: i64) -> bool {
        self.connections.contains_key(&user_id)
    }

    pub fn online_count(&self) -> usize {
        self.connections.len()
    }

    fn deliver_frame(&self, user_id: i64, text: Utf8Bytes) -> bool {
        let failed_connection = {
            let Some(conn) = self.connections.get(&user_id) else {
                return false;
            };
            match conn.tx.send(Message::Text(text)) {
                Ok(()) => return true,
                Err(_) => conn.id,
            }
        };

        // The shard guard is released above; remove_if re-checks the id so a
        // connection registered in between is left alone.
        self.connections
            .remove_if(&user_id, |_, conn| conn.id == failed_connection);
        tracing::warn!(user_id, "Delivery failed, marking user offline");
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn channel() -> (ConnectionSender, mpsc::UnboundedReceiver<Message>) {
        mpsc::unbounded_channel()
    }

    fn text_of(msg: Message) -> String {
        match msg {
            Message::Text(text) => text.to_string(),
            other => panic!("expected text frame, got {:?}", other),
        }
    }

    #[test]
    fn register_and_unregister() {
        let registry = ConnectionRegistry::new();
        let (tx, _rx) = channel();

        registry.register(1, tx);
        assert!(registry.is_online(1));
        assert!(!registry.is_online(2));

        registry.unregister(1);
        assert!(!registry.is_online(1));

        // Unregistering an absent id is a no-op.
        registry.unregister(1);
        assert_eq!(registry.online_count(), 0);
    }

    #[test]
    fn disconnect_closes_the_live_socket() {
        use axum::extract::ws::CloseFrame;

        let registry = ConnectionRegistry::new();
        let (tx, mut rx) = channel();
        registry.register(1, tx);

        let close = Message::Close(Some(CloseFrame {
            code: 1008,
            reason: "gone".into(),
        }));
        assert!(registry.disconnect(1, close));
        assert!(!registry.is_online(1));

        match rx.try_recv().unwrap() {
            Message::Close(Some(frame)) => assert_eq!(frame.code, 1008),
            other => panic!("expected close frame, got {:?}", other),
        }

        // Nothing left to disconnect.
        assert!(!registry.disconnect(1, Message::Close(None)));
    }

    #[test]
    fn deliver_to_offline_user_is_silent() {
        let registry = ConnectionRegistry::new();
        assert!(!registry.deliver(9, &serde_json::json!({"content": "hi"})));
    }

    #[test]
    fn deliver_pushes_json_text() {
        let registry = ConnectionRegistry::new();
        let (tx, mut rx) = channel();
        registry.register(1, tx);

        assert!(registry.deliver(1, &serde_json::json!({"content": "hi"})));
        let received: serde_json::Value = serde_json::from_str(&text_of(rx.try_recv().unwrap())).unwrap();
        assert_eq!(received["content"], "hi");
    }

    #[test]
    fn failed_delivery_unregisters() {
        let registry = ConnectionRegistry::new();
        let (tx, rx) = channel();
        registry.register(1, tx);
        drop(rx);

        assert!(!registry.deliver(1, &"payload"));
        assert!(!registry.is_online(1));
    }

    #[test]
    fn relay_pair_reaches_both_and_echoes_sender() {
        let registry = ConnectionRegistry::new();
        let (tx_a, mut rx_a) = channel();
        let (tx_b, mut rx_b) = channel();
        registry.register(1, tx_a);
        registry.register(2, tx_b);

        registry.relay_pair(1, 2, &serde_json::json!({"id": 5}));

        assert!(text_of(rx_a.try_recv().unwrap()).contains("\"id\":5"));
        assert!(text_of(rx_b.try_recv().unwrap()).contains("\"id\":5"));
        assert!(rx_a.try_recv().is_err());
        assert!(rx_b.try_recv().is_err());
    }

    #[test]
    fn relay_pair_with_offline_peer_still_echoes() {
        let registry = ConnectionRegistry::new();
        let (tx_a, mut rx_a) = channel();
        registry.register(1, tx_a);

        registry.relay_pair(1, 2, &serde_json::json!({"id": 1}));

        assert!(rx_a.try_recv().is_ok());
        assert!(registry.is_online(1));
        assert!(!registry.is_online(2));
    }

    #[test]
    fn reregistration_routes_to_newest_socket() {
        let registry = ConnectionRegistry::new();
        let (old_tx, mut old_rx) = channel();
        let (new_tx, mut new_rx) = channel();

        let old = registry.register(1, old_tx);
        let new = registry.register(1, new_tx);
        assert!(registry.is_online(1));

        registry.deliver(1, &"x");
        assert!(new_rx.try_recv().is_ok());
        assert!(old_rx.try_recv().is_err());

        // The stale session closing must not evict the newer one.
        assert!(!registry.release(&old));
        assert!(registry.is_online(1));

        assert!(registry.release(&new));
        assert!(!registry.is_online(1));
    }

    #[test]
    fn stale_failure_does_not_evict_newer_connection() {
        let registry = ConnectionRegistry::new();
        let (old_tx, old_rx) = channel();
        registry.register(1, old_tx);
        drop(old_rx);

        let (new_tx, mut new_rx) = channel();
        registry.register(1, new_tx);

        assert!(registry.deliver(1, &"y"));
        assert!(new_rx.try_recv().is_ok());
        assert!(registry.is_online(1));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_registration_of_distinct_ids() {
        let registry = Arc::new(ConnectionRegistry::new());
        let mut receivers = Vec::new();
        let mut handles = Vec::new();

        for user_id in 0..64i64 {
            let (tx, rx) = channel();
            receivers.push(rx);
            let registry = registry.clone();
            handles.push(tokio::spawn(async move {
                registry.register(user_id, tx);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(registry.online_count(), 64);
        for user_id in 0..64i64 {
            assert!(registry.deliver(user_id, &user_id));
        }
        for (user_id, rx) in receivers.iter_mut().enumerate() {
            assert_eq!(text_of(rx.try_recv().unwrap()), user_id.to_string());
        }
    }
}
