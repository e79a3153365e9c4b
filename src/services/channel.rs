//! Outbound channel adapter.
//!
//! Sends text, quick-reply, and card-carousel messages through the Graph
//! `/me/messages` API, authorized by the tenant's access token. Messenger
//! and Instagram DMs both go through the same endpoint; the channel only
//! affects logging and metrics labels.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::middleware::error_handling::{AppError, Result};
use crate::middleware::metrics::OUTBOUND_SENDS;
use crate::models::{Channel, OutboundMessage};

/// Cosmetic sender actions; always fire-and-forget.
#[derive(Debug, Clone, Copy)]
pub enum SenderAction {
    TypingOn,
    TypingOff,
    MarkSeen,
}

impl SenderAction {
    fn as_str(&self) -> &'static str {
        match self {
            SenderAction::TypingOn => "typing_on",
            SenderAction::TypingOff => "typing_off",
            SenderAction::MarkSeen => "mark_seen",
        }
    }
}

#[async_trait]
pub trait ChannelSender: Send + Sync {
    /// Deliver an outbound message. Failures are logged by the caller with
    /// recipient/tenant/kind context; there is no automatic retry.
    async fn send(
        &self,
        channel: Channel,
        recipient_id: &str,
        access_token: &str,
        message: &OutboundMessage,
    ) -> Result<()>;

    async fn sender_action(
        &self,
        channel: Channel,
        recipient_id: &str,
        access_token: &str,
        action: SenderAction,
    ) -> Result<()>;

    /// Best-effort profile name lookup for new customers.
    async fn fetch_profile_name(
        &self,
        channel: Channel,
        external_id: &str,
        access_token: &str,
    ) -> Result<Option<String>>;
}

pub struct GraphApiSender {
    http_client: reqwest::Client,
    base_url: String,
}

impl GraphApiSender {
    pub fn new(base_url: String) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .expect("reqwest client");
        Self {
            http_client,
            base_url,
        }
    }

    fn message_body(message: &OutboundMessage) -> Value {
        match message {
            OutboundMessage::Text { text } => json!({ "text": text }),
            OutboundMessage::QuickReplies { text, options } => {
                let quick_replies: Vec<Value> = options
                    .iter()
                    .map(|opt| {
                        json!({
                            "content_type": "text",
                            "title": opt.title,
                            "payload": opt.payload,
                        })
                    })
                    .collect();
                json!({ "text": text, "quick_replies": quick_replies })
            }
            OutboundMessage::Cards { cards } => {
                let elements: Vec<Value> = cards
                    .iter()
                    .map(|card| {
                        let mut element = json!({
                            "title": card.title,
                            "subtitle": card.subtitle,
                        });
                        if let Some(url) = &card.image_url {
                            element["image_url"] = json!(url);
                        }
                        element
                    })
                    .collect();
                json!({
                    "attachment": {
                        "type": "template",
                        "payload": {
                            "template_type": "generic",
                            "elements": elements,
                        }
                    }
                })
            }
        }
    }

    async fn post_messages(&self, access_token: &str, body: Value) -> Result<()> {
        let url = format!("{}/me/messages", self.base_url);
        let response = self
            .http_client
            .post(&url)
            .query(&[("access_token", access_token)])
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            tracing::error!("Graph API send failed ({}): {}", status, error_body);
            return Err(AppError::Upstream(format!(
                "Graph API returned {}",
                status
            )));
        }

        Ok(())
    }
}

#[async_trait]
impl ChannelSender for GraphApiSender {
    async fn send(
        &self,
        channel: Channel,
        recipient_id: &str,
        access_token: &str,
        message: &OutboundMessage,
    ) -> Result<()> {
        let body = json!({
            "recipient": { "id": recipient_id },
            "messaging_type": "RESPONSE",
            "message": Self::message_body(message),
        });

        let result = self.post_messages(access_token, body).await;
        OUTBOUND_SENDS
            .with_label_values(&[
                channel.as_str(),
                message.kind(),
                if result.is_ok() { "ok" } else { "error" },
            ])
            .inc();
        result
    }

    async fn sender_action(
        &self,
        channel: Channel,
        recipient_id: &str,
        access_token: &str,
        action: SenderAction,
    ) -> Result<()> {
        let _ = channel;
        let body = json!({
            "recipient": { "id": recipient_id },
            "sender_action": action.as_str(),
        });
        self.post_messages(access_token, body).await
    }

    async fn fetch_profile_name(
        &self,
        channel: Channel,
        external_id: &str,
        access_token: &str,
    ) -> Result<Option<String>> {
        let _ = channel;
        let url = format!("{}/{}", self.base_url, external_id);
        let response = self
            .http_client
            .get(&url)
            .query(&[("fields", "name"), ("access_token", access_token)])
            .timeout(std::time::Duration::from_secs(5))
            .send()
            .await?;

        if !response.status().is_success() {
            return Ok(None);
        }

        #[derive(serde::Deserialize)]
        struct Profile {
            name: Option<String>,
        }

        let profile: Profile = response.json().await?;
        Ok(profile.name.filter(|n| !n.trim().is_empty()))
    }
}
