use crate::common::models::{now_millis, ChatEvent, ChatMessage, NotificationKind, UserId};
use crate::server::chat_store::ChatStore;
use crate::server::error::{EngineError, EngineResult};
use crate::server::fanout::NotificationFanout;
use serde_json::Map;

/// Message send, history windows, and scheduled-event lifecycle for a chat.
/// Every operation requires membership; non-members get NotFound so chat
/// ids cannot be probed.
#[derive(Clone)]
pub struct ChatOrchestrator {
    chats: ChatStore,
    fanout: NotificationFanout,
    max_message_length: usize,
}

impl ChatOrchestrator {
    pub fn new(chats: ChatStore, fanout: NotificationFanout, max_message_length: usize) -> Self {
        Self { chats, fanout, max_message_length }
    }

    async fn require_membership(&self, chat_id: i64, user_id: UserId) -> EngineResult<Vec<UserId>> {
        let members = self.chats.members(chat_id).await?;
        if !members.contains(&user_id) {
            return Err(EngineError::NotFound);
        }
        Ok(members)
    }

    pub async fn send_message(
        &self,
        sender_id: UserId,
        chat_id: i64,
        content: &str,
    ) -> EngineResult<ChatMessage> {
        if content.is_empty() {
            return Err(EngineError::BadRequest("empty message".into()));
        }
        if content.len() > self.max_message_length {
            return Err(EngineError::BadRequest(format!(
                "message too long (max {} chars)",
                self.max_message_length
            )));
        }
        let members = self.require_membership(chat_id, sender_id).await?;

        let message = self.chats.insert_message(chat_id, sender_id, content).await?;

        for member in members.iter().filter(|m| **m != sender_id) {
            let mut extra = Map::new();
            extra.insert("chat_id".into(), chat_id.into());
            extra.insert("content".into(), content.into());
            self.fanout
                .notify_with(*member, sender_id, NotificationKind::Message, message.id, extra)
                .await?;
        }
        Ok(message)
    }

    /// Newest-first window `[from, to]` inclusive. Messages from a sender
    /// the requester blocked stay visible only if sent before the block.
    pub async fn get_messages(
        &self,
        requester_id: UserId,
        chat_id: i64,
        from: i64,
        to: i64,
    ) -> EngineResult<Vec<ChatMessage>> {
        if from < 0 || to < from {
            return Err(EngineError::BadRequest("invalid message window".into()));
        }
        self.require_membership(chat_id, requester_id).await?;
        self.chats.messages_window(chat_id, requester_id, from, to).await
    }

    pub async fn create_event(
        &self,
        user_id: UserId,
        chat_id: i64,
        title: &str,
        lat: f64,
        lng: f64,
        date: i64,
    ) -> EngineResult<ChatEvent> {
        let members = self.require_membership(chat_id, user_id).await?;
        if title.trim().is_empty() {
            return Err(EngineError::BadRequest("event title is empty".into()));
        }
        if date <= now_millis() {
            return Err(EngineError::BadRequest("event date must be in the future".into()));
        }
        if self.chats.event_of(chat_id).await?.is_some() {
            return Err(EngineError::Conflict("chat already has an event".into()));
        }

        let event = match self.chats.insert_event(chat_id, title, lat, lng, date).await {
            Ok(event) => event,
            // The UNIQUE(chat_id) constraint backstops a concurrent create.
            Err(EngineError::Database(e)) if EngineError::is_unique_violation(&e) => {
                return Err(EngineError::Conflict("chat already has an event".into()));
            }
            Err(e) => return Err(e),
        };

        for member in &members {
            let mut extra = Map::new();
            extra.insert("chat_id".into(), chat_id.into());
            extra.insert("title".into(), title.into());
            self.fanout
                .notify_with(*member, user_id, NotificationKind::ChatEvent, event.id, extra)
                .await?;
        }
        Ok(event)
    }

    pub async fn delete_event(&self, user_id: UserId, chat_id: i64) -> EngineResult<()> {
        self.require_membership(chat_id, user_id).await?;
        if !self.chats.delete_event(chat_id).await? {
            return Err(EngineError::NotFound);
        }
        Ok(())
    }
}
