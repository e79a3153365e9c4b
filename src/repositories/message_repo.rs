use sqlx::PgPool;
use uuid::Uuid;

use crate::middleware::error_handling::Result;
use crate::models::{MessageSender, StoredMessage};

#[derive(Clone)]
pub struct MessageRepository {
    pool: PgPool,
}

impl MessageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert(
        &self,
        conversation_id: Uuid,
        content: &str,
        sender: MessageSender,
        metadata: serde_json::Value,
    ) -> Result<StoredMessage> {
        let message = sqlx::query_as::<_, StoredMessage>(
            r#"
            INSERT INTO messages (id, conversation_id, content, sender, metadata)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(conversation_id)
        .bind(content)
        .bind(sender.as_str())
        .bind(metadata)
        .fetch_one(&self.pool)
        .await?;

        Ok(message)
    }

    /// The last `limit` customer messages in the conversation before
    /// `exclude_id`, oldest first. Feeds the escalation history window.
    pub async fn recent_customer_contents(
        &self,
        conversation_id: Uuid,
        exclude_id: Uuid,
        limit: i64,
    ) -> Result<Vec<String>> {
        let mut contents = sqlx::query_scalar::<_, String>(
            r#"
            SELECT content FROM messages
            WHERE conversation_id = $1 AND id <> $2 AND sender = 'customer'
            ORDER BY created_at DESC
            LIMIT $3
            "#,
        )
        .bind(conversation_id)
        .bind(exclude_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        contents.reverse();
        Ok(contents)
    }

    /// Merge a patch into the message metadata map. The jsonb `||` operator
    /// keeps existing keys not present in the patch (quick-reply payload
    /// recorded at creation survives the tagger's enrichment).
    pub async fn merge_metadata(
        &self,
        message_id: Uuid,
        patch: serde_json::Value,
    ) -> Result<()> {
        sqlx::query("UPDATE messages SET metadata = metadata || $2 WHERE id = $1")
            .bind(message_id)
            .bind(patch)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
