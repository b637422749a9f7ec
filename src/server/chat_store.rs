use crate::common::models::{now_millis, Chat, ChatEvent, ChatMessage, UserId};
use crate::server::database::Database;
use crate::server::error::EngineResult;
use sqlx::Row;

/// Canonical key for the unordered user pair, smaller id first.
pub fn pair_key(a: UserId, b: UserId) -> String {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    format!("{}:{}", lo, hi)
}

/// Durable Chat, ChatMessage and ChatEvent entities.
#[derive(Debug, Clone)]
pub struct ChatStore {
    db: Database,
}

impl ChatStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn members(&self, chat_id: i64) -> EngineResult<Vec<UserId>> {
        let rows = sqlx::query("SELECT user_id FROM chat_members WHERE chat_id = ? ORDER BY user_id")
            .bind(chat_id)
            .fetch_all(&self.db.pool)
            .await?;
        Ok(rows.iter().map(|r| r.get::<i64, _>("user_id")).collect())
    }

    pub async fn get_chat(&self, chat_id: i64) -> EngineResult<Option<Chat>> {
        let row = sqlx::query("SELECT id, created_at FROM chats WHERE id = ?")
            .bind(chat_id)
            .fetch_optional(&self.db.pool)
            .await?;
        let row = match row {
            Some(r) => r,
            None => return Ok(None),
        };
        let users = self.members(chat_id).await?;
        let event = self.event_of(chat_id).await?;
        Ok(Some(Chat {
            id: row.get("id"),
            users,
            event,
            created_at: row.get("created_at"),
        }))
    }

    pub async fn list_chats(&self, user_id: UserId) -> EngineResult<Vec<Chat>> {
        let rows = sqlx::query(
            "SELECT c.id FROM chats c JOIN chat_members m ON m.chat_id = c.id \
             WHERE m.user_id = ? ORDER BY c.created_at DESC, c.id DESC",
        )
        .bind(user_id)
        .fetch_all(&self.db.pool)
        .await?;
        let mut chats = Vec::with_capacity(rows.len());
        for row in rows {
            if let Some(chat) = self.get_chat(row.get::<i64, _>("id")).await? {
                chats.push(chat);
            }
        }
        Ok(chats)
    }

    pub async fn insert_message(
        &self,
        chat_id: i64,
        sender_id: UserId,
        content: &str,
    ) -> EngineResult<ChatMessage> {
        let created_at = now_millis();
        let res = sqlx::query(
            "INSERT INTO chat_messages (chat_id, sender_id, content, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(chat_id)
        .bind(sender_id)
        .bind(content)
        .bind(created_at)
        .execute(&self.db.pool)
        .await?;
        Ok(ChatMessage {
            id: res.last_insert_rowid(),
            chat_id,
            sender_id,
            content: content.to_string(),
            created_at,
        })
    }

    /// Newest-first window `[from, to]` inclusive, hiding messages whose
    /// sender the requester blocked after they were sent. Messages from
    /// before the block stay visible.
    pub async fn messages_window(
        &self,
        chat_id: i64,
        requester_id: UserId,
        from: i64,
        to: i64,
    ) -> EngineResult<Vec<ChatMessage>> {
        let limit = to - from + 1;
        let rows = sqlx::query(
            "SELECT id, chat_id, sender_id, content, created_at FROM chat_messages m \
             WHERE m.chat_id = ? \
               AND NOT EXISTS (SELECT 1 FROM blocks b \
                               WHERE b.blocker_id = ? AND b.blocked_id = m.sender_id \
                                 AND m.created_at > b.created_at) \
             ORDER BY m.created_at DESC, m.id DESC LIMIT ? OFFSET ?",
        )
        .bind(chat_id)
        .bind(requester_id)
        .bind(limit)
        .bind(from)
        .fetch_all(&self.db.pool)
        .await?;
        Ok(rows
            .iter()
            .map(|r| ChatMessage {
                id: r.get("id"),
                chat_id: r.get("chat_id"),
                sender_id: r.get("sender_id"),
                content: r.get("content"),
                created_at: r.get("created_at"),
            })
            .collect())
    }

    pub async fn event_of(&self, chat_id: i64) -> EngineResult<Option<ChatEvent>> {
        let row = sqlx::query(
            "SELECT id, chat_id, title, lat, lng, date, created_at FROM chat_events WHERE chat_id = ?",
        )
        .bind(chat_id)
        .fetch_optional(&self.db.pool)
        .await?;
        Ok(row.map(|r| ChatEvent {
            id: r.get("id"),
            chat_id: r.get("chat_id"),
            title: r.get("title"),
            lat: r.get("lat"),
            lng: r.get("lng"),
            date: r.get("date"),
            created_at: r.get("created_at"),
        }))
    }

    pub async fn insert_event(
        &self,
        chat_id: i64,
        title: &str,
        lat: f64,
        lng: f64,
        date: i64,
    ) -> EngineResult<ChatEvent> {
        let created_at = now_millis();
        let res = sqlx::query(
            "INSERT INTO chat_events (chat_id, title, lat, lng, date, created_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(chat_id)
        .bind(title)
        .bind(lat)
        .bind(lng)
        .bind(date)
        .bind(created_at)
        .execute(&self.db.pool)
        .await?;
        Ok(ChatEvent {
            id: res.last_insert_rowid(),
            chat_id,
            title: title.to_string(),
            lat,
            lng,
            date,
            created_at,
        })
    }

    /// Returns false if the chat had no event.
    pub async fn delete_event(&self, chat_id: i64) -> EngineResult<bool> {
        let res = sqlx::query("DELETE FROM chat_events WHERE chat_id = ?")
            .bind(chat_id)
            .execute(&self.db.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }
}
