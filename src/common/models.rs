use serde::{Deserialize, Serialize};

pub type UserId = i64;

/// Millisecond timestamps everywhere; SQLite stores them as INTEGER.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chat {
    pub id: i64,
    pub users: Vec<UserId>,
    pub event: Option<ChatEvent>,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: i64,
    pub chat_id: i64,
    pub sender_id: UserId,
    pub content: String,
    pub created_at: i64,
}

/// A scheduled meetup attached to a chat. At most one per chat.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatEvent {
    pub id: i64,
    pub chat_id: i64,
    pub title: String,
    pub lat: f64,
    pub lng: f64,
    pub date: i64,
    pub created_at: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Like,
    LikeBack,
    Unlike,
    View,
    Message,
    ChatEvent,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Like => "like",
            NotificationKind::LikeBack => "like_back",
            NotificationKind::Unlike => "unlike",
            NotificationKind::View => "view",
            NotificationKind::Message => "message",
            NotificationKind::ChatEvent => "chat_event",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "like" => Some(NotificationKind::Like),
            "like_back" => Some(NotificationKind::LikeBack),
            "unlike" => Some(NotificationKind::Unlike),
            "view" => Some(NotificationKind::View),
            "message" => Some(NotificationKind::Message),
            "chat_event" => Some(NotificationKind::ChatEvent),
            _ => None,
        }
    }
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: i64,
    pub user_id: UserId,
    pub author_id: UserId,
    pub kind: NotificationKind,
    pub target_id: i64,
    pub created_at: i64,
}

/// Payload pushed over a live connection: the persisted notification fields
/// plus type-specific extras (chat id for `like_back`, content for `message`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveEvent {
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub data: serde_json::Value,
}
