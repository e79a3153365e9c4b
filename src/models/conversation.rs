use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Conversation lifecycle status, stored as text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationStatus {
    Active,
    Closed,
}

impl ConversationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConversationStatus::Active => "active",
            ConversationStatus::Closed => "closed",
        }
    }
}

/// A thread of messages between one tenant and one customer.
///
/// At most one open (non-closed) conversation per (store, customer) is used
/// as the destination for inbound messages; a partial unique index enforces
/// this at the database level.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Conversation {
    pub id: Uuid,
    pub store_id: Uuid,
    pub customer_id: Uuid,
    pub channel: String,
    pub status: String,
    pub unread_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    pub fn is_open(&self) -> bool {
        self.status != ConversationStatus::Closed.as_str()
    }
}
