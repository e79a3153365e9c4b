use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Placeholder display name used when the platform profile lookup fails or
/// cannot be attempted (no access token).
pub const PLACEHOLDER_NAME: &str = "Хэрэглэгч";

/// A customer of one tenant, keyed by the channel-specific external id.
/// Unique per (store, channel id); created lazily on first inbound message.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Customer {
    pub id: Uuid,
    pub store_id: Uuid,
    pub messenger_id: Option<String>,
    pub instagram_id: Option<String>,
    pub name: String,
    /// Channel the customer was acquired on ("messenger" | "instagram").
    pub channel: String,
    pub created_at: DateTime<Utc>,
}
