use crate::common::models::{now_millis, UserId};
use crate::server::database::Database;
use sqlx::Row;

/// Resolve a session token to a user id. Tokens are minted by the identity
/// service; this core only reads them to tag live connections.
pub async fn validate_session(db: &Database, session_token: &str) -> Option<UserId> {
    let now = now_millis();
    let row = sqlx::query("SELECT user_id FROM sessions WHERE token = ? AND expires_at > ?")
        .bind(session_token)
        .bind(now)
        .fetch_optional(&db.pool)
        .await
        .ok()?;
    row.map(|r| r.get::<i64, _>("user_id"))
}
