//! Intent-to-shape mapping for AI replies.
//!
//! Pure planning step: given an AI result, decide which outbound messages
//! to send. Priority order:
//!   1. product_search with matches -> response text + card carousel
//!   2. order_step "confirm"        -> quick replies (confirm / decline)
//!   3. order narration intents     -> plain text
//!   4. greeting / general          -> quick replies (3 suggestions)
//!   5. anything else               -> plain text
//! An empty response means nothing is sent at all.

use crate::models::{AiReply, Intent, OutboundMessage, Product, ProductCard, QuickReplyOption};
use crate::utils::text::{format_price, truncate_chars};

pub const MAX_CARDS: usize = 10;
pub const DESCRIPTION_LIMIT: usize = 60;

// Quick-reply payloads understood by the flow interceptor.
pub const PAYLOAD_ORDER_START: &str = "ORDER_START";
pub const PAYLOAD_ORDER_CONFIRM: &str = "ORDER_CONFIRM";
pub const PAYLOAD_ORDER_DECLINE: &str = "ORDER_DECLINE";
pub const PAYLOAD_BROWSE_PRODUCTS: &str = "BROWSE_PRODUCTS";
pub const PAYLOAD_CHECK_ORDER: &str = "CHECK_ORDER";
pub const PAYLOAD_SHIPPING_INFO: &str = "SHIPPING_INFO";

pub fn confirm_options() -> Vec<QuickReplyOption> {
    vec![
        QuickReplyOption::new("Баталгаажуулах", PAYLOAD_ORDER_CONFIRM),
        QuickReplyOption::new("Цуцлах", PAYLOAD_ORDER_DECLINE),
    ]
}

pub fn suggestion_options() -> Vec<QuickReplyOption> {
    vec![
        QuickReplyOption::new("Бараа үзэх", PAYLOAD_BROWSE_PRODUCTS),
        QuickReplyOption::new("Захиалга шалгах", PAYLOAD_CHECK_ORDER),
        QuickReplyOption::new("Хүргэлтийн мэдээлэл", PAYLOAD_SHIPPING_INFO),
    ]
}

/// Build one carousel card from an already-fetched product.
pub fn product_card(product: &Product) -> ProductCard {
    let mut subtitle = format_price(&product.price);
    if let Some(description) = product
        .description
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty())
    {
        subtitle.push_str(" · ");
        subtitle.push_str(&truncate_chars(description, DESCRIPTION_LIMIT));
    }

    ProductCard {
        title: product.name.clone(),
        subtitle,
        image_url: product.image_urls.first().cloned(),
    }
}

/// Plan the outbound messages for one AI reply. An empty vec means "send
/// nothing" (logged by the caller as a no-response case, not an error).
pub fn plan_messages(reply: &AiReply) -> Vec<OutboundMessage> {
    let Some(response) = reply
        .response
        .as_deref()
        .map(str::trim)
        .filter(|r| !r.is_empty())
    else {
        return Vec::new();
    };
    let response = response.to_string();

    if reply.intent == Intent::ProductSearch && !reply.products.is_empty() {
        let cards = reply
            .products
            .iter()
            .take(MAX_CARDS)
            .map(product_card)
            .collect();
        return vec![
            OutboundMessage::Text { text: response },
            OutboundMessage::Cards { cards },
        ];
    }

    if reply.order_step.as_deref() == Some("confirm") {
        return vec![OutboundMessage::QuickReplies {
            text: response,
            options: confirm_options(),
        }];
    }

    match reply.intent {
        Intent::OrderCreated | Intent::OrderCollection => {
            vec![OutboundMessage::Text { text: response }]
        }
        Intent::Greeting | Intent::General => vec![OutboundMessage::QuickReplies {
            text: response,
            options: suggestion_options(),
        }],
        _ => vec![OutboundMessage::Text { text: response }],
    }
}
