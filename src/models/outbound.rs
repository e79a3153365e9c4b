use serde::Serialize;

/// A suggested-reply button attached to an outbound message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuickReplyOption {
    pub title: String,
    pub payload: String,
}

impl QuickReplyOption {
    pub fn new(title: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            payload: payload.into(),
        }
    }
}

/// One card of a product carousel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductCard {
    pub title: String,
    pub subtitle: String,
    pub image_url: Option<String>,
}

/// The shapes the pipeline can send back through a channel. At most one
/// inbound message produces at most one reply, but a reply may consist of a
/// text message followed by a card carousel.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundMessage {
    Text { text: String },
    QuickReplies { text: String, options: Vec<QuickReplyOption> },
    Cards { cards: Vec<ProductCard> },
}

impl OutboundMessage {
    /// Stable label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            OutboundMessage::Text { .. } => "text",
            OutboundMessage::QuickReplies { .. } => "quick_replies",
            OutboundMessage::Cards { .. } => "cards",
        }
    }
}
