use sqlx::PgPool;
use uuid::Uuid;

use crate::middleware::error_handling::{AppError, Result};
use crate::models::{Channel, Customer};

#[derive(Clone)]
pub struct CustomerRepository {
    pool: PgPool,
}

impl CustomerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Look up a customer by the channel-specific external id.
    pub async fn find_by_external_id(
        &self,
        store_id: Uuid,
        channel: Channel,
        external_id: &str,
    ) -> Result<Option<Customer>> {
        let query = match channel {
            Channel::Messenger => {
                "SELECT * FROM customers WHERE store_id = $1 AND messenger_id = $2"
            }
            Channel::Instagram => {
                "SELECT * FROM customers WHERE store_id = $1 AND instagram_id = $2"
            }
        };

        let customer = sqlx::query_as::<_, Customer>(query)
            .bind(store_id)
            .bind(external_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(customer)
    }

    /// Insert a customer, tolerating a concurrent insert of the same
    /// (store, channel id). Partial unique indexes on
    /// (store_id, messenger_id) and (store_id, instagram_id) guarantee a
    /// single row; on conflict the existing row is returned.
    pub async fn insert(
        &self,
        store_id: Uuid,
        channel: Channel,
        external_id: &str,
        name: &str,
    ) -> Result<Customer> {
        let (messenger_id, instagram_id) = match channel {
            Channel::Messenger => (Some(external_id), None),
            Channel::Instagram => (None, Some(external_id)),
        };

        let inserted = sqlx::query_as::<_, Customer>(
            r#"
            INSERT INTO customers (id, store_id, messenger_id, instagram_id, name, channel)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT DO NOTHING
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(store_id)
        .bind(messenger_id)
        .bind(instagram_id)
        .bind(name)
        .bind(channel.as_str())
        .fetch_optional(&self.pool)
        .await?;

        match inserted {
            Some(customer) => Ok(customer),
            // Lost the race; the winner's row must exist now.
            None => self
                .find_by_external_id(store_id, channel, external_id)
                .await?
                .ok_or_else(|| {
                    AppError::Internal(anyhow::anyhow!(
                        "customer insert conflicted but no row found"
                    ))
                }),
        }
    }
}
