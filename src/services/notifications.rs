//! Notification dispatch.
//!
//! Side-channel alerts (new customer, new message) for the tenant's
//! dashboard. Always fire-and-forget relative to the pipeline: the caller
//! runs dispatch detached, so a failure here is logged and dropped, never
//! surfaced to the customer or the webhook response.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::middleware::error_handling::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationEvent {
    NewCustomer,
    NewMessage,
}

impl NotificationEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationEvent::NewCustomer => "new_customer",
            NotificationEvent::NewMessage => "new_message",
        }
    }
}

#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn dispatch(
        &self,
        store_id: Uuid,
        event: NotificationEvent,
        payload: serde_json::Value,
    ) -> Result<()>;
}

/// Records notifications per tenant; in-app delivery reads this table.
pub struct PgNotificationSink {
    pool: PgPool,
}

impl PgNotificationSink {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationSink for PgNotificationSink {
    async fn dispatch(
        &self,
        store_id: Uuid,
        event: NotificationEvent,
        payload: serde_json::Value,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO notifications (id, store_id, event_type, payload)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(store_id)
        .bind(event.as_str())
        .bind(payload)
        .execute(&self.pool)
        .await?;

        tracing::info!(%store_id, event = event.as_str(), "Notification recorded");

        Ok(())
    }
}
