// Entry point for the scintilla server
use log::{error, info};
use scintilla::server::config::ServerConfig;
use scintilla::server::database::Database;
use scintilla::server::engine::Engine;
use scintilla::server::registry::ConnectionRegistry;
use scintilla::server::websocket;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    std::env::set_var("RUST_LOG", &log_level);
    env_logger::init();

    let config = ServerConfig::from_env();

    let database = Database::connect(&config.database_url).await?;
    info!("Running database migrations...");
    database.migrate().await.map_err(|e| {
        error!("Database migration failed: {}", e);
        e
    })?;
    info!("Database migrations completed");

    let registry = ConnectionRegistry::new();
    let engine = Engine::new(
        database.clone(),
        Arc::new(registry.clone()),
        config.max_message_length,
    );

    let addr = format!("{}:{}", config.host, config.port);
    websocket::start_websocket_server(&addr, registry, engine, database, config).await
}
