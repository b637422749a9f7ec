use crate::common::models::{LiveEvent, UserId};
use async_trait::async_trait;
use log::debug;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio_tungstenite::tungstenite::Message;
use uuid::Uuid;

pub type ConnectionId = Uuid;

/// Abstract sink for live events. Business logic only depends on this, not
/// on the registry itself, so it can run without any transport attached.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Best-effort delivery: dropped silently when the user has no live
    /// connection.
    async fn send(&self, user_id: UserId, event: &LiveEvent);
}

/// A registered live connection: the writer half is an unbounded channel
/// drained by the connection's pump task.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    pub id: ConnectionId,
    pub sender: mpsc::UnboundedSender<Message>,
}

#[derive(Default)]
struct RegistryInner {
    by_user: HashMap<UserId, ConnectionHandle>,
    owners: HashMap<ConnectionId, UserId>,
}

/// In-memory map of user -> live connection. One connection per user:
/// registering again replaces (and closes) the previous one.
#[derive(Clone, Default)]
pub struct ConnectionRegistry {
    inner: Arc<Mutex<RegistryInner>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last-write-wins: a prior connection for the same user is sent a
    /// Close frame and dropped from the maps.
    pub async fn register(&self, user_id: UserId, handle: ConnectionHandle) {
        let mut inner = self.inner.lock().await;
        inner.owners.insert(handle.id, user_id);
        if let Some(prev) = inner.by_user.insert(user_id, handle) {
            inner.owners.remove(&prev.id);
            let _ = prev.sender.send(Message::Close(None));
            debug!("Replaced live connection for user {}", user_id);
        }
    }

    /// Idempotent; a stale disconnect (connection id no longer registered
    /// for this user) must not evict a newer connection.
    pub async fn unregister(&self, user_id: UserId, connection_id: ConnectionId) {
        let mut inner = self.inner.lock().await;
        let current = inner.by_user.get(&user_id).map(|h| h.id);
        if current == Some(connection_id) {
            inner.by_user.remove(&user_id);
        }
        inner.owners.remove(&connection_id);
    }

    /// Reverse lookup for connection-level events that arrive without an
    /// explicit identity.
    pub async fn lookup_owner(&self, connection_id: ConnectionId) -> Option<UserId> {
        let inner = self.inner.lock().await;
        inner.owners.get(&connection_id).copied()
    }

    pub async fn send_event(&self, user_id: UserId, event: &LiveEvent) {
        let inner = self.inner.lock().await;
        let handle = match inner.by_user.get(&user_id) {
            Some(h) if !h.sender.is_closed() => h,
            _ => {
                debug!("No live connection for user {}, dropping {} event", user_id, event.kind);
                return;
            }
        };
        match serde_json::to_string(event) {
            Ok(json) => {
                let _ = handle.sender.send(Message::Text(json));
            }
            Err(e) => debug!("Failed to serialize live event: {}", e),
        }
    }

    /// Force-close the user's connection, then drop it from the maps.
    pub async fn close_and_unregister(&self, user_id: UserId) {
        let mut inner = self.inner.lock().await;
        if let Some(handle) = inner.by_user.remove(&user_id) {
            inner.owners.remove(&handle.id);
            let _ = handle.sender.send(Message::Close(None));
        }
    }
}

#[async_trait]
impl EventSink for ConnectionRegistry {
    async fn send(&self, user_id: UserId, event: &LiveEvent) {
        self.send_event(user_id, event).await;
    }
}
