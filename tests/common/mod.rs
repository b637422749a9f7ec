#![allow(dead_code)]

use async_trait::async_trait;
use scintilla::common::models::{now_millis, LiveEvent, NotificationKind, UserId};
use scintilla::server::database::Database;
use scintilla::server::engine::Engine;
use scintilla::server::registry::EventSink;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Event sink that records pushes instead of delivering them, so tests can
/// assert exactly what would have gone over the wire.
pub struct RecordingSink {
    events: Mutex<Vec<(UserId, LiveEvent)>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self { events: Mutex::new(Vec::new()) })
    }

    pub async fn events_for(&self, user_id: UserId) -> Vec<LiveEvent> {
        self.events
            .lock()
            .await
            .iter()
            .filter(|(uid, _)| *uid == user_id)
            .map(|(_, e)| e.clone())
            .collect()
    }

    pub async fn count(&self, user_id: UserId, kind: NotificationKind) -> usize {
        self.events_for(user_id)
            .await
            .iter()
            .filter(|e| e.kind == kind)
            .count()
    }
}

#[async_trait]
impl EventSink for RecordingSink {
    async fn send(&self, user_id: UserId, event: &LiveEvent) {
        self.events.lock().await.push((user_id, event.clone()));
    }
}

/// Fresh in-memory database with the given users, wired to a recording sink.
pub async fn setup(user_ids: &[UserId]) -> (Engine, Arc<RecordingSink>, Database) {
    let db = Database::connect("sqlite::memory:").await.expect("connect");
    db.migrate().await.expect("migrate");
    for id in user_ids {
        sqlx::query("INSERT INTO users (id, created_at) VALUES (?, ?)")
            .bind(id)
            .bind(now_millis())
            .execute(&db.pool)
            .await
            .expect("insert user");
    }
    let sink = RecordingSink::new();
    let engine = Engine::new(db.clone(), sink.clone(), 2048);
    (engine, sink, db)
}

/// Like in both directions and return the chat id of the resulting match.
pub async fn matched_pair(engine: &Engine, a: UserId, b: UserId) -> i64 {
    engine.like(a, b).await.expect("first like");
    let outcome = engine.like(b, a).await.expect("reciprocal like");
    assert!(outcome.matched);
    outcome.chat_id.expect("match creates a chat")
}
