use crate::common::models::{Chat, ChatEvent, ChatMessage, Notification, NotificationKind, UserId};
use crate::server::chat::ChatOrchestrator;
use crate::server::chat_store::ChatStore;
use crate::server::database::Database;
use crate::server::error::{EngineError, EngineResult};
use crate::server::fame;
use crate::server::fanout::NotificationFanout;
use crate::server::matching::{LikeOutcome, MatchingEngine, PairLocks};
use crate::server::registry::EventSink;
use crate::server::social_graph::SocialGraphStore;
use std::sync::Arc;

/// The surface exposed to collaborators (HTTP layer, transport layer).
/// Owns the stores and wires every component through the one fan-out.
#[derive(Clone)]
pub struct Engine {
    graph: SocialGraphStore,
    chats: ChatStore,
    fanout: NotificationFanout,
    matching: MatchingEngine,
    orchestrator: ChatOrchestrator,
}

impl Engine {
    pub fn new(db: Database, sink: Arc<dyn EventSink>, max_message_length: usize) -> Self {
        let graph = SocialGraphStore::new(db.clone());
        let chats = ChatStore::new(db.clone());
        let fanout = NotificationFanout::new(db.clone(), sink);
        let locks = PairLocks::new();
        let matching = MatchingEngine::new(db, graph.clone(), fanout.clone(), locks);
        let orchestrator = ChatOrchestrator::new(chats.clone(), fanout.clone(), max_message_length);
        Self { graph, chats, fanout, matching, orchestrator }
    }

    pub async fn like(&self, actor_id: UserId, target_id: UserId) -> EngineResult<LikeOutcome> {
        self.matching.like(actor_id, target_id).await
    }

    pub async fn unlike(&self, actor_id: UserId, target_id: UserId) -> EngineResult<()> {
        self.matching.unlike(actor_id, target_id).await
    }

    pub async fn record_view(&self, viewer_id: UserId, viewed_id: UserId) -> EngineResult<()> {
        // Looking at your own profile leaves no trace.
        if viewer_id == viewed_id {
            return Ok(());
        }
        if !self.graph.user_exists(viewed_id).await? {
            return Err(EngineError::NotFound);
        }
        if self.graph.blocked_either(viewer_id, viewed_id).await? {
            return Err(EngineError::NotFound);
        }
        self.graph.insert_view(viewer_id, viewed_id).await?;
        // The fan-out dedups view notifications per ordered pair.
        self.fanout
            .notify(viewed_id, viewer_id, NotificationKind::View, viewer_id)
            .await?;
        Ok(())
    }

    /// Blocking hides the pair from each other but leaves likes and any
    /// existing chat in place; messages are filtered by block time on read.
    pub async fn block(&self, actor_id: UserId, target_id: UserId) -> EngineResult<()> {
        if actor_id == target_id {
            return Err(EngineError::BadRequest("cannot block yourself".into()));
        }
        if !self.graph.user_exists(target_id).await? {
            return Err(EngineError::NotFound);
        }
        self.graph.insert_block(actor_id, target_id).await
    }

    pub async fn unblock(&self, actor_id: UserId, target_id: UserId) -> EngineResult<()> {
        if !self.graph.delete_block(actor_id, target_id).await? {
            return Err(EngineError::NotFound);
        }
        Ok(())
    }

    pub async fn get_notifications(&self, user_id: UserId) -> EngineResult<Vec<Notification>> {
        self.fanout.get_notifications(user_id).await
    }

    pub async fn fame_rate(&self, user_id: UserId) -> EngineResult<i64> {
        if !self.graph.user_exists(user_id).await? {
            return Err(EngineError::NotFound);
        }
        fame::fame_rate(&self.graph, user_id).await
    }

    pub async fn send_message(
        &self,
        sender_id: UserId,
        chat_id: i64,
        content: &str,
    ) -> EngineResult<ChatMessage> {
        self.orchestrator.send_message(sender_id, chat_id, content).await
    }

    pub async fn get_messages(
        &self,
        requester_id: UserId,
        chat_id: i64,
        from: i64,
        to: i64,
    ) -> EngineResult<Vec<ChatMessage>> {
        self.orchestrator.get_messages(requester_id, chat_id, from, to).await
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
        self.orchestrator.create_event(user_id, chat_id, title, lat, lng, date).await
    }

    pub async fn delete_event(&self, user_id: UserId, chat_id: i64) -> EngineResult<()> {
        self.orchestrator.delete_event(user_id, chat_id).await
    }

    pub async fn get_chat(&self, actor_id: UserId, chat_id: i64) -> EngineResult<Chat> {
        match self.chats.get_chat(chat_id).await? {
            Some(chat) if chat.users.contains(&actor_id) => Ok(chat),
            _ => Err(EngineError::NotFound),
        }
    }

    pub async fn list_chats(&self, actor_id: UserId) -> EngineResult<Vec<Chat>> {
        self.chats.list_chats(actor_id).await
    }
}
