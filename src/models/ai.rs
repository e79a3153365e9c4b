use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::product::Product;

/// Per-invocation context handed to the AI engine.
#[derive(Debug, Clone, Serialize)]
pub struct AiContext {
    pub store_id: Uuid,
    pub conversation_id: Uuid,
    pub customer_id: Uuid,
    pub customer_name: String,
    pub message: String,
    pub tone: String,
}

/// Intent tag assigned by the AI engine to a customer message. Used only to
/// select the outbound message shape; unrecognized tags degrade to plain
/// text.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum Intent {
    ProductSearch,
    OrderCreated,
    OrderCollection,
    Greeting,
    General,
    Other(String),
}

impl From<String> for Intent {
    fn from(s: String) -> Self {
        match s.as_str() {
            "product_search" => Intent::ProductSearch,
            "order_created" => Intent::OrderCreated,
            "order_collection" => Intent::OrderCollection,
            "greeting" => Intent::Greeting,
            "general" => Intent::General,
            _ => Intent::Other(s),
        }
    }
}

/// One AI engine result. Transient; only its derived text/metadata ever
/// reaches storage or the customer.
#[derive(Debug, Clone, Deserialize)]
pub struct AiReply {
    #[serde(default)]
    pub response: Option<String>,
    pub intent: Intent,
    #[serde(default)]
    pub products: Vec<Product>,
    #[serde(default)]
    pub order_step: Option<String>,
}

/// Sentiment/topic classification of one message.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TagResult {
    pub sentiment: String,
    #[serde(default)]
    pub tags: Vec<String>,
}
