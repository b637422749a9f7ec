use crate::common::models::UserId;
use crate::server::auth;
use crate::server::config::ServerConfig;
use crate::server::database::Database;
use crate::server::engine::Engine;
use crate::server::error::EngineError;
use crate::server::registry::{ConnectionHandle, ConnectionRegistry};
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info};
use serde::{Deserialize, Serialize};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
struct AuthFrame {
    #[serde(rename = "type")]
    kind: String,
    session_token: String,
}

#[derive(Debug, Serialize)]
struct AuthResponse {
    #[serde(rename = "type")]
    kind: &'static str,
    success: bool,
    user_id: Option<UserId>,
    code: Option<&'static str>,
    error: Option<String>,
}

impl AuthResponse {
    fn ok(user_id: UserId) -> Self {
        Self { kind: "auth_response", success: true, user_id: Some(user_id), code: None, error: None }
    }

    fn rejected(err: &EngineError) -> Self {
        Self {
            kind: "auth_response",
            success: false,
            user_id: None,
            code: Some(err.code()),
            error: Some(err.to_string()),
        }
    }
}

/// Frames a live client may push after authenticating.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum InboundFrame {
    SendMessage { chat_id: i64, content: String },
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum OutboundFrame {
    MessageSent { message_id: i64, chat_id: i64 },
    Error { code: &'static str, message: String },
}

pub async fn start_websocket_server(
    addr: &str,
    registry: ConnectionRegistry,
    engine: Engine,
    db: Database,
    config: ServerConfig,
) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("WebSocket server listening on {}", addr);

    while let Ok((stream, peer)) = listener.accept().await {
        debug!("New WebSocket connection from {}", peer);
        let registry = registry.clone();
        let engine = engine.clone();
        let db = db.clone();
        let config = config.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, registry, engine, db, config).await {
                error!("WebSocket connection error ({}): {}", peer, e);
            }
        });
    }
    Ok(())
}

async fn handle_connection(
    stream: TcpStream,
    registry: ConnectionRegistry,
    engine: Engine,
    db: Database,
    config: ServerConfig,
) -> anyhow::Result<()> {
    let mut ws_stream = accept_async(stream).await?;

    // The first frame must authenticate the connection; the identity
    // service minted the token, we only resolve it to a user id.
    let auth_wait = tokio::time::timeout(
        tokio::time::Duration::from_secs(config.auth_timeout_secs),
        ws_stream.next(),
    )
    .await;

    let token = match auth_wait {
        Ok(Some(Ok(Message::Text(text)))) => match serde_json::from_str::<AuthFrame>(&text) {
            Ok(frame) if frame.kind == "auth" => frame.session_token,
            Ok(_) | Err(_) => {
                let cause = EngineError::BadRequest("expected auth frame".into());
                let reply = serde_json::to_string(&AuthResponse::rejected(&cause))?;
                let _ = ws_stream.send(Message::Text(reply)).await;
                return Err(anyhow::anyhow!("invalid auth frame"));
            }
        },
        Ok(Some(Ok(Message::Close(_)))) | Ok(None) => return Ok(()),
        Ok(Some(Ok(_))) => {
            let cause = EngineError::BadRequest("expected text auth frame".into());
            let reply = serde_json::to_string(&AuthResponse::rejected(&cause))?;
            let _ = ws_stream.send(Message::Text(reply)).await;
            return Err(anyhow::anyhow!("unexpected frame during auth"));
        }
        Ok(Some(Err(e))) => return Err(e.into()),
        Err(_) => {
            let reply = serde_json::to_string(&AuthResponse::rejected(&EngineError::Unauthorized))?;
            let _ = ws_stream.send(Message::Text(reply)).await;
            return Err(anyhow::anyhow!("authentication timeout"));
        }
    };

    let user_id = match auth::validate_session(&db, &token).await {
        Some(user_id) => user_id,
        None => {
            let reply = serde_json::to_string(&AuthResponse::rejected(&EngineError::Unauthorized))?;
            let _ = ws_stream.send(Message::Text(reply)).await;
            return Err(anyhow::anyhow!("authentication failed"));
        }
    };
    let reply = serde_json::to_string(&AuthResponse::ok(user_id))?;
    ws_stream.send(Message::Text(reply)).await?;
    info!("Live connection authenticated for user {}", user_id);

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();
    let connection_id = Uuid::new_v4();
    let (tx, mut rx) = mpsc::unbounded_channel();
    registry
        .register(user_id, ConnectionHandle { id: connection_id, sender: tx.clone() })
        .await;

    // Pump task: drain the registry channel into the socket.
    let send_task = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            let closing = matches!(message, Message::Close(_));
            if ws_sender.send(message).await.is_err() || closing {
                break;
            }
        }
    });

    // Read loop: inbound frames from the client.
    let receive_task = tokio::spawn(async move {
        while let Some(message) = ws_receiver.next().await {
            match message {
                Ok(Message::Text(text)) => {
                    let frame = match serde_json::from_str::<InboundFrame>(&text) {
                        Ok(frame) => frame,
                        Err(e) => {
                            debug!("Ignoring malformed frame from user {}: {}", user_id, e);
                            continue;
                        }
                    };
                    match frame {
                        InboundFrame::SendMessage { chat_id, content } => {
                            let reply = match engine.send_message(user_id, chat_id, &content).await {
                                Ok(msg) => OutboundFrame::MessageSent { message_id: msg.id, chat_id },
                                Err(e) => OutboundFrame::Error { code: e.code(), message: e.to_string() },
                            };
                            if let Ok(json) = serde_json::to_string(&reply) {
                                let _ = tx.send(Message::Text(json));
                            }
                        }
                    }
                }
                Ok(Message::Close(_)) => break,
                Err(_) => break,
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = send_task => {},
        _ = receive_task => {},
    }

    registry.unregister(user_id, connection_id).await;
    debug!("Live connection closed for user {}", user_id);
    Ok(())
}
