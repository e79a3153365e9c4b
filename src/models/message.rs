use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Who produced a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageSender {
    Customer,
    Agent,
    Ai,
}

impl MessageSender {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageSender::Customer => "customer",
            MessageSender::Agent => "agent",
            MessageSender::Ai => "ai",
        }
    }
}

/// A stored message. Append-only except for the metadata map, which the
/// async tagger later enriches with `{sentiment, tags, tagged_at}`.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StoredMessage {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub content: String,
    pub sender: String,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}
