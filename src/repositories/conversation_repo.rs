use sqlx::PgPool;
use uuid::Uuid;

use crate::middleware::error_handling::{AppError, Result};
use crate::models::{Channel, Conversation};

#[derive(Clone)]
pub struct ConversationRepository {
    pool: PgPool,
}

impl ConversationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Most recently updated open conversation for the pair, if any.
    pub async fn find_open(
        &self,
        store_id: Uuid,
        customer_id: Uuid,
    ) -> Result<Option<Conversation>> {
        let conversation = sqlx::query_as::<_, Conversation>(
            r#"
            SELECT * FROM conversations
            WHERE store_id = $1 AND customer_id = $2 AND status <> 'closed'
            ORDER BY updated_at DESC
            LIMIT 1
            "#,
        )
        .bind(store_id)
        .bind(customer_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(conversation)
    }

    /// Find the open conversation or create one. Returns `(conversation,
    /// is_new)`.
    ///
    /// Concurrent deliveries for the same customer race here; the partial
    /// unique index on (store_id, customer_id) WHERE status = 'active' makes
    /// the insert conflict instead of producing a second open conversation,
    /// and the loser refetches the winner's row.
    pub async fn find_or_create_open(
        &self,
        store_id: Uuid,
        customer_id: Uuid,
        channel: Channel,
    ) -> Result<(Conversation, bool)> {
        if let Some(existing) = self.find_open(store_id, customer_id).await? {
            return Ok((existing, false));
        }

        let inserted = sqlx::query_as::<_, Conversation>(
            r#"
            INSERT INTO conversations (id, store_id, customer_id, channel, status, unread_count)
            VALUES ($1, $2, $3, $4, 'active', 0)
            ON CONFLICT (store_id, customer_id) WHERE status = 'active' DO NOTHING
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(store_id)
        .bind(customer_id)
        .bind(channel.as_str())
        .fetch_optional(&self.pool)
        .await?;

        match inserted {
            Some(conversation) => Ok((conversation, true)),
            None => {
                let existing = self.find_open(store_id, customer_id).await?.ok_or_else(|| {
                    AppError::Internal(anyhow::anyhow!(
                        "conversation insert conflicted but no open row found"
                    ))
                })?;
                Ok((existing, false))
            }
        }
    }

    /// Atomic unread increment plus updated_at touch. There is no
    /// reset-to-one fallback: if this fails it is reported as an error, the
    /// stored message remains the source of truth.
    pub async fn bump_unread(&self, conversation_id: Uuid) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE conversations
            SET unread_count = unread_count + 1, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(conversation_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
