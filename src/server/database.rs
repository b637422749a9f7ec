use log::{debug, info};
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};

#[derive(Debug, Clone)]
pub struct Database {
    pub pool: SqlitePool,
}

impl Database {
    pub async fn connect(database_url: &str) -> Result<Self, sqlx::Error> {
        debug!("Connecting to database: {}", database_url);

        // Strip the sqlite prefix / query string to get the on-disk path,
        // creating the parent directory when needed.
        let file_path = if let Some(rest) = database_url.strip_prefix("sqlite://") {
            rest.split('?').next().unwrap_or(rest)
        } else if let Some(rest) = database_url.strip_prefix("sqlite:") {
            rest.split('?').next().unwrap_or(rest)
        } else {
            database_url
        };

        if file_path != ":memory:" {
            if let Some(parent) = std::path::Path::new(file_path).parent() {
                if !parent.as_os_str().is_empty() && !parent.exists() {
                    std::fs::create_dir_all(parent)
                        .map_err(|e| sqlx::Error::Configuration(Box::new(e)))?;
                    debug!("Created database directory {:?}", parent);
                }
            }
        }

        // An in-memory SQLite database exists per connection, so the pool
        // must not hand out more than one.
        let max_connections = if file_path == ":memory:" { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        info!("Database connection established ({})", database_url);
        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<(), sqlx::Error> {
        // Users: minimal mirror of the external identity service, existence
        // checks only.
        sqlx::query(r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY,
                created_at INTEGER NOT NULL
            );
        "#).execute(&self.pool).await?;

        // Sessions: written by the identity collaborator, read here to
        // resolve live connections.
        sqlx::query(r#"
            CREATE TABLE IF NOT EXISTS sessions (
                token TEXT PRIMARY KEY,
                user_id INTEGER NOT NULL,
                expires_at INTEGER NOT NULL
            );
        "#).execute(&self.pool).await?;

        // Likes
        sqlx::query(r#"
            CREATE TABLE IF NOT EXISTS likes (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                liker_id INTEGER NOT NULL,
                liked_id INTEGER NOT NULL,
                created_at INTEGER NOT NULL,
                UNIQUE (liker_id, liked_id),
                CHECK (liker_id != liked_id)
            );
        "#).execute(&self.pool).await?;

        // Blocks (directed)
        sqlx::query(r#"
            CREATE TABLE IF NOT EXISTS blocks (
                blocker_id INTEGER NOT NULL,
                blocked_id INTEGER NOT NULL,
                created_at INTEGER NOT NULL,
                PRIMARY KEY (blocker_id, blocked_id)
            );
        "#).execute(&self.pool).await?;

        // Views: append-only, repeat views insert repeat rows
        sqlx::query(r#"
            CREATE TABLE IF NOT EXISTS views (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                viewer_id INTEGER NOT NULL,
                viewed_id INTEGER NOT NULL,
                created_at INTEGER NOT NULL
            );
        "#).execute(&self.pool).await?;

        // Chats: pair_key is the sorted "lo:hi" user pair, so at most one
        // chat can exist per unordered pair.
        sqlx::query(r#"
            CREATE TABLE IF NOT EXISTS chats (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                pair_key TEXT NOT NULL UNIQUE,
                created_at INTEGER NOT NULL
            );
        "#).execute(&self.pool).await?;

        // Chat members
        sqlx::query(r#"
            CREATE TABLE IF NOT EXISTS chat_members (
                chat_id INTEGER NOT NULL,
                user_id INTEGER NOT NULL,
                PRIMARY KEY (chat_id, user_id)
            );
        "#).execute(&self.pool).await?;

        // Chat messages (immutable once created)
        sqlx::query(r#"
            CREATE TABLE IF NOT EXISTS chat_messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                chat_id INTEGER NOT NULL,
                sender_id INTEGER NOT NULL,
                content TEXT NOT NULL,
                created_at INTEGER NOT NULL
            );
        "#).execute(&self.pool).await?;

        // Chat events: UNIQUE(chat_id) enforces at most one per chat
        sqlx::query(r#"
            CREATE TABLE IF NOT EXISTS chat_events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                chat_id INTEGER NOT NULL UNIQUE,
                title TEXT NOT NULL,
                lat REAL NOT NULL,
                lng REAL NOT NULL,
                date INTEGER NOT NULL,
                created_at INTEGER NOT NULL
            );
        "#).execute(&self.pool).await?;

        // Notification ledger (append-only)
        sqlx::query(r#"
            CREATE TABLE IF NOT EXISTS notifications (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                author_id INTEGER NOT NULL,
                kind TEXT NOT NULL,
                target_id INTEGER NOT NULL,
                created_at INTEGER NOT NULL
            );
        "#).execute(&self.pool).await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_notifications_user ON notifications (user_id, created_at);")
            .execute(&self.pool).await?;
        // At most one view notification per ordered (author, recipient)
        // pair; backs the fan-out's INSERT OR IGNORE under concurrency.
        sqlx::query("CREATE UNIQUE INDEX IF NOT EXISTS idx_notifications_view_once ON notifications (user_id, author_id) WHERE kind = 'view';")
            .execute(&self.pool).await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_messages_chat ON chat_messages (chat_id, created_at);")
            .execute(&self.pool).await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_views_viewed ON views (viewed_id);")
            .execute(&self.pool).await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_likes_liked ON likes (liked_id);")
            .execute(&self.pool).await?;

        Ok(())
    }
}
