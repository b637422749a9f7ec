use crate::common::models::{now_millis, UserId};
use crate::server::database::Database;
use crate::server::error::EngineResult;
use sqlx::Row;

/// Snapshot of everything the matching transition table needs for one
/// ordered (actor, target) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairState {
    pub target_exists: bool,
    /// A block exists in either direction.
    pub blocked: bool,
    /// Like(actor -> target) exists.
    pub like_out: bool,
    /// Like(target -> actor) exists.
    pub like_in: bool,
    pub chat_id: Option<i64>,
}

/// Durable Like/Block/View relations and their queries.
#[derive(Debug, Clone)]
pub struct SocialGraphStore {
    db: Database,
}

impl SocialGraphStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn user_exists(&self, user_id: UserId) -> EngineResult<bool> {
        let row = sqlx::query("SELECT 1 FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(&self.db.pool)
            .await?;
        Ok(row.is_some())
    }

    pub async fn like_exists(&self, liker_id: UserId, liked_id: UserId) -> EngineResult<bool> {
        let row = sqlx::query("SELECT 1 FROM likes WHERE liker_id = ? AND liked_id = ?")
            .bind(liker_id)
            .bind(liked_id)
            .fetch_optional(&self.db.pool)
            .await?;
        Ok(row.is_some())
    }

    pub async fn blocked_either(&self, a: UserId, b: UserId) -> EngineResult<bool> {
        let row = sqlx::query(
            "SELECT 1 FROM blocks WHERE (blocker_id = ? AND blocked_id = ?) OR (blocker_id = ? AND blocked_id = ?)",
        )
        .bind(a)
        .bind(b)
        .bind(b)
        .bind(a)
        .fetch_optional(&self.db.pool)
        .await?;
        Ok(row.is_some())
    }

    pub async fn insert_block(&self, blocker_id: UserId, blocked_id: UserId) -> EngineResult<()> {
        sqlx::query("INSERT OR IGNORE INTO blocks (blocker_id, blocked_id, created_at) VALUES (?, ?, ?)")
            .bind(blocker_id)
            .bind(blocked_id)
            .bind(now_millis())
            .execute(&self.db.pool)
            .await?;
        Ok(())
    }

    /// Returns false if no such block existed.
    pub async fn delete_block(&self, blocker_id: UserId, blocked_id: UserId) -> EngineResult<bool> {
        let res = sqlx::query("DELETE FROM blocks WHERE blocker_id = ? AND blocked_id = ?")
            .bind(blocker_id)
            .bind(blocked_id)
            .execute(&self.db.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    /// Append-only: repeat views insert repeat rows.
    pub async fn insert_view(&self, viewer_id: UserId, viewed_id: UserId) -> EngineResult<()> {
        sqlx::query("INSERT INTO views (viewer_id, viewed_id, created_at) VALUES (?, ?, ?)")
            .bind(viewer_id)
            .bind(viewed_id)
            .bind(now_millis())
            .execute(&self.db.pool)
            .await?;
        Ok(())
    }

    /// Distinct viewers: repeat views by the same user count once.
    pub async fn count_views_of(&self, user_id: UserId) -> EngineResult<i64> {
        let row = sqlx::query("SELECT COUNT(DISTINCT viewer_id) AS n FROM views WHERE viewed_id = ?")
            .bind(user_id)
            .fetch_one(&self.db.pool)
            .await?;
        Ok(row.get::<i64, _>("n"))
    }

    pub async fn count_likes_of(&self, user_id: UserId) -> EngineResult<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM likes WHERE liked_id = ?")
            .bind(user_id)
            .fetch_one(&self.db.pool)
            .await?;
        Ok(row.get::<i64, _>("n"))
    }

    /// Assemble the pair snapshot the matching engine decides on. Callers
    /// hold the per-pair lock, so the snapshot cannot race another
    /// like/unlike on the same pair.
    pub async fn pair_snapshot(&self, actor_id: UserId, target_id: UserId) -> EngineResult<PairState> {
        let target_exists = self.user_exists(target_id).await?;
        let blocked = self.blocked_either(actor_id, target_id).await?;
        let like_out = self.like_exists(actor_id, target_id).await?;
        let like_in = self.like_exists(target_id, actor_id).await?;
        let chat_id = {
            let key = crate::server::chat_store::pair_key(actor_id, target_id);
            let row = sqlx::query("SELECT id FROM chats WHERE pair_key = ?")
                .bind(&key)
                .fetch_optional(&self.db.pool)
                .await?;
            row.map(|r| r.get::<i64, _>("id"))
        };
        Ok(PairState {
            target_exists,
            blocked,
            like_out,
            like_in,
            chat_id,
        })
    }
}
