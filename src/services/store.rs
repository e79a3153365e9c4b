//! Persistence seam for the pipeline.
//!
//! The pipeline talks to customers/conversations/messages through this
//! trait so its branching logic is testable without Postgres. Production
//! uses [`PgConversationStore`], which delegates to the repositories.

use async_trait::async_trait;
use uuid::Uuid;

use crate::middleware::error_handling::Result;
use crate::models::{Channel, Conversation, Customer, MessageSender, StoredMessage};
use crate::repositories::{ConversationRepository, CustomerRepository, MessageRepository};

#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn find_customer(
        &self,
        store_id: Uuid,
        channel: Channel,
        external_id: &str,
    ) -> Result<Option<Customer>>;

    async fn insert_customer(
        &self,
        store_id: Uuid,
        channel: Channel,
        external_id: &str,
        name: &str,
    ) -> Result<Customer>;

    /// Returns `(conversation, is_new)`.
    async fn find_or_create_conversation(
        &self,
        store_id: Uuid,
        customer_id: Uuid,
        channel: Channel,
    ) -> Result<(Conversation, bool)>;

    async fn insert_message(
        &self,
        conversation_id: Uuid,
        content: &str,
        sender: MessageSender,
        metadata: serde_json::Value,
    ) -> Result<StoredMessage>;

    async fn bump_unread(&self, conversation_id: Uuid) -> Result<()>;

    /// The last `limit` customer messages before `exclude_message_id`,
    /// oldest first. Used as the escalation history window.
    async fn recent_messages(
        &self,
        conversation_id: Uuid,
        exclude_message_id: Uuid,
        limit: i64,
    ) -> Result<Vec<String>>;

    async fn merge_message_metadata(
        &self,
        message_id: Uuid,
        patch: serde_json::Value,
    ) -> Result<()>;
}

pub struct PgConversationStore {
    customers: CustomerRepository,
    conversations: ConversationRepository,
    messages: MessageRepository,
}

impl PgConversationStore {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self {
            customers: CustomerRepository::new(pool.clone()),
            conversations: ConversationRepository::new(pool.clone()),
            messages: MessageRepository::new(pool),
        }
    }
}

#[async_trait]
impl ConversationStore for PgConversationStore {
    async fn find_customer(
        &self,
        store_id: Uuid,
        channel: Channel,
        external_id: &str,
    ) -> Result<Option<Customer>> {
        self.customers
            .find_by_external_id(store_id, channel, external_id)
            .await
    }

    async fn insert_customer(
        &self,
        store_id: Uuid,
        channel: Channel,
        external_id: &str,
        name: &str,
    ) -> Result<Customer> {
        self.customers
            .insert(store_id, channel, external_id, name)
            .await
    }

    async fn find_or_create_conversation(
        &self,
        store_id: Uuid,
        customer_id: Uuid,
        channel: Channel,
    ) -> Result<(Conversation, bool)> {
        self.conversations
            .find_or_create_open(store_id, customer_id, channel)
            .await
    }

    async fn insert_message(
        &self,
        conversation_id: Uuid,
        content: &str,
        sender: MessageSender,
        metadata: serde_json::Value,
    ) -> Result<StoredMessage> {
        self.messages
            .insert(conversation_id, content, sender, metadata)
            .await
    }

    async fn bump_unread(&self, conversation_id: Uuid) -> Result<()> {
        self.conversations.bump_unread(conversation_id).await
    }

    async fn recent_messages(
        &self,
        conversation_id: Uuid,
        exclude_message_id: Uuid,
        limit: i64,
    ) -> Result<Vec<String>> {
        self.messages
            .recent_customer_contents(conversation_id, exclude_message_id, limit)
            .await
    }

    async fn merge_message_metadata(
        &self,
        message_id: Uuid,
        patch: serde_json::Value,
    ) -> Result<()> {
        self.messages.merge_metadata(message_id, patch).await
    }
}
