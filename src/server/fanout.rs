use crate::common::models::{now_millis, LiveEvent, Notification, NotificationKind, UserId};
use crate::server::database::Database;
use crate::server::error::EngineResult;
use crate::server::registry::EventSink;
use log::warn;
use serde_json::{Map, Value};
use sqlx::Row;
use std::sync::Arc;

/// Single facade through which every component persists and pushes
/// notifications. The ledger write is authoritative; the live push is a
/// best-effort hint.
#[derive(Clone)]
pub struct NotificationFanout {
    db: Database,
    sink: Arc<dyn EventSink>,
}

impl NotificationFanout {
    pub fn new(db: Database, sink: Arc<dyn EventSink>) -> Self {
        Self { db, sink }
    }

    pub async fn notify(
        &self,
        recipient_id: UserId,
        author_id: UserId,
        kind: NotificationKind,
        target_id: i64,
    ) -> EngineResult<()> {
        self.notify_with(recipient_id, author_id, kind, target_id, Map::new())
            .await
    }

    /// `extra` is merged into the live payload on top of the persisted
    /// fields (e.g. chat id for `like_back`, content for `message`).
    pub async fn notify_with(
        &self,
        recipient_id: UserId,
        author_id: UserId,
        kind: NotificationKind,
        target_id: i64,
        extra: Map<String, Value>,
    ) -> EngineResult<()> {
        // The one dedup rule in the system: at most one view notification
        // per ordered (author, recipient) pair. A single INSERT OR IGNORE
        // against the partial unique index keeps check and write atomic,
        // so concurrent views cannot both land.
        let sql = if kind == NotificationKind::View {
            "INSERT OR IGNORE INTO notifications (user_id, author_id, kind, target_id, created_at) VALUES (?, ?, ?, ?, ?)"
        } else {
            "INSERT INTO notifications (user_id, author_id, kind, target_id, created_at) VALUES (?, ?, ?, ?, ?)"
        };
        let created_at = now_millis();
        let res = sqlx::query(sql)
            .bind(recipient_id)
            .bind(author_id)
            .bind(kind.as_str())
            .bind(target_id)
            .bind(created_at)
            .execute(&self.db.pool)
            .await?;
        if res.rows_affected() == 0 {
            // Duplicate view: no ledger write happened, suppress the push.
            return Ok(());
        }

        let mut data = Map::new();
        data.insert("id".into(), res.last_insert_rowid().into());
        data.insert("user_id".into(), recipient_id.into());
        data.insert("author_id".into(), author_id.into());
        data.insert("target_id".into(), target_id.into());
        data.insert("created_at".into(), created_at.into());
        data.extend(extra);

        let event = LiveEvent {
            kind,
            data: Value::Object(data),
        };
        self.sink.send(recipient_id, &event).await;
        Ok(())
    }

    /// Per-user ledger, newest first, ties broken by insertion order.
    pub async fn get_notifications(&self, user_id: UserId) -> EngineResult<Vec<Notification>> {
        let rows = sqlx::query(
            "SELECT id, user_id, author_id, kind, target_id, created_at FROM notifications \
             WHERE user_id = ? ORDER BY created_at DESC, id DESC",
        )
        .bind(user_id)
        .fetch_all(&self.db.pool)
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for r in rows {
            let kind_str: String = r.get("kind");
            let kind = match NotificationKind::parse(&kind_str) {
                Some(k) => k,
                None => {
                    warn!("Skipping notification with unknown kind '{}'", kind_str);
                    continue;
                }
            };
            out.push(Notification {
                id: r.get("id"),
                user_id: r.get("user_id"),
                author_id: r.get("author_id"),
                kind,
                target_id: r.get("target_id"),
                created_at: r.get("created_at"),
            });
        }
        Ok(out)
    }
}
