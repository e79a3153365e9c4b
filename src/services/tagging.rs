//! Asynchronous sentiment/topic tagging.
//!
//! Runs detached after a message is persisted; never blocks or delays the
//! reply path. The remote classifier is preferred; when it errors the
//! deterministic keyword classifier takes over, which always succeeds.
//! Results are merged into the message's metadata map.

use std::sync::Arc;

use chrono::Utc;
use once_cell::sync::Lazy;
use serde_json::json;
use uuid::Uuid;

use crate::middleware::error_handling::Result;
use crate::models::TagResult;
use crate::services::ai_engine::AiEngine;
use crate::services::store::ConversationStore;

static NEGATIVE_WORDS: Lazy<Vec<&'static str>> = Lazy::new(|| {
    vec![
        "муу", "гомдол", "буцаах", "удаан", "хуурамч", "залилан",
        "bad", "terrible", "awful", "refund", "scam", "broken", "complaint",
    ]
});

static POSITIVE_WORDS: Lazy<Vec<&'static str>> = Lazy::new(|| {
    vec![
        "баярлалаа", "гоё", "сайхан", "таалагдлаа",
        "thanks", "thank you", "great", "love", "perfect", "awesome",
    ]
});

static TOPIC_KEYWORDS: Lazy<Vec<(&'static str, &'static [&'static str])>> = Lazy::new(|| {
    vec![
        ("order", &["захиалга", "захиалах", "order", "авъя", "авья"][..]),
        ("shipping", &["хүргэлт", "хүргэх", "shipping", "delivery", "хэзээ ирэх"][..]),
        ("price", &["үнэ", "хэд вэ", "price", "cost", "хямдрал", "discount"][..]),
        ("complaint", &["гомдол", "буцаах", "refund", "complaint", "солих"][..]),
    ]
});

/// Deterministic fallback classifier. Substring matching over small
/// bilingual keyword lists; neutral when nothing matches.
pub fn keyword_classify(text: &str) -> TagResult {
    let lowered = text.to_lowercase();

    let negative = NEGATIVE_WORDS.iter().any(|w| lowered.contains(w));
    let positive = POSITIVE_WORDS.iter().any(|w| lowered.contains(w));

    let sentiment = match (negative, positive) {
        (true, _) => "negative",
        (false, true) => "positive",
        (false, false) => "neutral",
    };

    let tags = TOPIC_KEYWORDS
        .iter()
        .filter(|(_, words)| words.iter().any(|w| lowered.contains(w)))
        .map(|(tag, _)| tag.to_string())
        .collect();

    TagResult {
        sentiment: sentiment.to_string(),
        tags,
    }
}

pub struct TaggingService {
    engine: Arc<dyn AiEngine>,
    store: Arc<dyn ConversationStore>,
}

impl TaggingService {
    pub fn new(engine: Arc<dyn AiEngine>, store: Arc<dyn ConversationStore>) -> Self {
        Self { engine, store }
    }

    /// Classify and merge `{sentiment, tags, tagged_at}` into the message
    /// metadata. Classifier failures downgrade to the keyword fallback;
    /// only the metadata write itself can fail, and the caller runs this
    /// detached so that failure is logged and dropped.
    pub async fn tag_message(&self, message_id: Uuid, text: &str) -> Result<()> {
        let result = match self.engine.classify(text).await {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(
                    %message_id,
                    error = %e,
                    "Classifier unavailable, using keyword fallback"
                );
                keyword_classify(text)
            }
        };

        let patch = json!({
            "sentiment": result.sentiment,
            "tags": result.tags,
            "tagged_at": Utc::now(),
        });

        self.store.merge_message_metadata(message_id, patch).await
    }
}
