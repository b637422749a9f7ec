use crate::common::models::{now_millis, NotificationKind, UserId};
use crate::server::chat_store::pair_key;
use crate::server::database::Database;
use crate::server::error::{EngineError, EngineResult};
use crate::server::fanout::NotificationFanout;
use crate::server::social_graph::{PairState, SocialGraphStore};
use log::info;
use serde_json::Map;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Outcome of a successful like, returned synchronously to the actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LikeOutcome {
    pub matched: bool,
    pub chat_id: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LikeDecision {
    /// The reciprocal like exists, so this like completes a match.
    pub matched: bool,
    /// A chat must be created (matched and no chat exists yet).
    pub create_chat: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnlikeDecision {
    /// The reciprocal like and a chat exist, so removing this like breaks
    /// the match and the chat must go.
    pub breaks_match: bool,
    pub chat_id: Option<i64>,
}

/// The like transition table as a pure function over the pair snapshot.
pub fn decide_like(actor_id: UserId, target_id: UserId, state: &PairState) -> EngineResult<LikeDecision> {
    if actor_id == target_id {
        return Err(EngineError::BadRequest("cannot like yourself".into()));
    }
    // A block in either direction masks as not-found so callers cannot
    // probe for block state.
    if !state.target_exists || state.blocked {
        return Err(EngineError::NotFound);
    }
    if state.like_out {
        return Err(EngineError::Forbidden("already liked this user".into()));
    }
    Ok(LikeDecision {
        matched: state.like_in,
        create_chat: state.like_in && state.chat_id.is_none(),
    })
}

pub fn decide_unlike(actor_id: UserId, target_id: UserId, state: &PairState) -> EngineResult<UnlikeDecision> {
    if actor_id == target_id {
        return Err(EngineError::BadRequest("cannot unlike yourself".into()));
    }
    if !state.like_out {
        return Err(EngineError::NotFound);
    }
    Ok(UnlikeDecision {
        breaks_match: state.like_in && state.chat_id.is_some(),
        chat_id: state.chat_id,
    })
}

/// Keyed async mutexes making like/unlike linearizable per unordered pair.
/// Grows with the set of pairs ever touched; entries are tiny.
#[derive(Clone, Default)]
pub struct PairLocks {
    inner: Arc<Mutex<HashMap<(UserId, UserId), Arc<Mutex<()>>>>>,
}

impl PairLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, a: UserId, b: UserId) -> OwnedMutexGuard<()> {
        let key = if a <= b { (a, b) } else { (b, a) };
        let pair_mutex = {
            let mut map = self.inner.lock().await;
            map.entry(key).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
        };
        pair_mutex.lock_owned().await
    }
}

/// Drives Like/Unlike transitions: snapshot the pair, run the pure
/// decision, apply the side effects in one transaction, then fan out.
#[derive(Clone)]
pub struct MatchingEngine {
    db: Database,
    graph: SocialGraphStore,
    fanout: NotificationFanout,
    locks: PairLocks,
}

impl MatchingEngine {
    pub fn new(db: Database, graph: SocialGraphStore, fanout: NotificationFanout, locks: PairLocks) -> Self {
        Self { db, graph, fanout, locks }
    }

    pub async fn like(&self, actor_id: UserId, target_id: UserId) -> EngineResult<LikeOutcome> {
        let _pair = self.locks.lock(actor_id, target_id).await;

        let state = self.graph.pair_snapshot(actor_id, target_id).await?;
        let decision = decide_like(actor_id, target_id, &state)?;

        let now = now_millis();
        let mut tx = self.db.pool.begin().await?;
        sqlx::query("INSERT INTO likes (liker_id, liked_id, created_at) VALUES (?, ?, ?)")
            .bind(actor_id)
            .bind(target_id)
            .bind(now)
            .execute(&mut *tx)
            .await?;

        let chat_id = if decision.matched {
            match state.chat_id {
                Some(id) => Some(id),
                None => {
                    let res = sqlx::query("INSERT INTO chats (pair_key, created_at) VALUES (?, ?)")
                        .bind(pair_key(actor_id, target_id))
                        .bind(now)
                        .execute(&mut *tx)
                        .await?;
                    let id = res.last_insert_rowid();
                    for user in [actor_id, target_id] {
                        sqlx::query("INSERT INTO chat_members (chat_id, user_id) VALUES (?, ?)")
                            .bind(id)
                            .bind(user)
                            .execute(&mut *tx)
                            .await?;
                    }
                    Some(id)
                }
            }
        } else {
            None
        };
        tx.commit().await?;

        if let Some(chat_id) = chat_id {
            info!("Match: users {} and {} now share chat {}", actor_id, target_id, chat_id);
            let mut extra = Map::new();
            extra.insert("chat_id".into(), chat_id.into());
            self.fanout
                .notify_with(target_id, actor_id, NotificationKind::LikeBack, chat_id, extra)
                .await?;
        }
        self.fanout
            .notify(target_id, actor_id, NotificationKind::Like, actor_id)
            .await?;

        Ok(LikeOutcome {
            matched: decision.matched,
            chat_id,
        })
    }

    pub async fn unlike(&self, actor_id: UserId, target_id: UserId) -> EngineResult<()> {
        let _pair = self.locks.lock(actor_id, target_id).await;

        let state = self.graph.pair_snapshot(actor_id, target_id).await?;
        let decision = decide_unlike(actor_id, target_id, &state)?;

        let mut tx = self.db.pool.begin().await?;
        sqlx::query("DELETE FROM likes WHERE liker_id = ? AND liked_id = ?")
            .bind(actor_id)
            .bind(target_id)
            .execute(&mut *tx)
            .await?;
        if decision.breaks_match {
            let chat_id = decision.chat_id.unwrap_or_default();
            // Cascade: the chat takes its event, messages and membership
            // with it.
            sqlx::query("DELETE FROM chat_events WHERE chat_id = ?")
                .bind(chat_id)
                .execute(&mut *tx)
                .await?;
            sqlx::query("DELETE FROM chat_messages WHERE chat_id = ?")
                .bind(chat_id)
                .execute(&mut *tx)
                .await?;
            sqlx::query("DELETE FROM chat_members WHERE chat_id = ?")
                .bind(chat_id)
                .execute(&mut *tx)
                .await?;
            sqlx::query("DELETE FROM chats WHERE id = ?")
                .bind(chat_id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        if decision.breaks_match {
            info!("Unmatch: user {} unliked {}, chat removed", actor_id, target_id);
            self.fanout
                .notify(target_id, actor_id, NotificationKind::Unlike, actor_id)
                .await?;
        }
        Ok(())
    }
}
