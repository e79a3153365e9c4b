//! Inbound Meta webhook payload types.
//!
//! The envelope carries `object: "page" | "instagram"` and a list of
//! entries; each entry holds either DM events (`messaging[]`) or feed
//! change events (`changes[]`). Feed changes belong to the comment
//! auto-reply collaborator and are skipped here.

use serde::Deserialize;

/// Maximum accepted length of an inbound message text, in characters.
/// Longer events are skipped, not failed.
pub const MAX_TEXT_CHARS: usize = 2000;

/// Query parameters of the GET verification sub-flow.
#[derive(Debug, Deserialize)]
pub struct VerifyParams {
    #[serde(rename = "hub.mode")]
    pub mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    pub verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    pub challenge: Option<String>,
}

/// Top-level webhook delivery envelope.
#[derive(Debug, Deserialize)]
pub struct WebhookEnvelope {
    #[serde(default)]
    pub object: String,
    #[serde(default)]
    pub entry: Vec<WebhookEntry>,
}

/// A single entry, scoped to one page/account id.
#[derive(Debug, Deserialize)]
pub struct WebhookEntry {
    /// Platform page or Instagram business-account id.
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub messaging: Vec<MessagingEvent>,
    #[serde(default)]
    pub changes: Vec<serde_json::Value>,
}

/// Discriminated view of an entry's payload.
#[derive(Debug)]
pub enum EntryKind<'a> {
    /// Direct-message events.
    Messaging(&'a [MessagingEvent]),
    /// Feed/comment change events (handled elsewhere).
    Feed(&'a [serde_json::Value]),
    /// Nothing actionable.
    Empty,
}

impl WebhookEntry {
    pub fn kind(&self) -> EntryKind<'_> {
        if !self.messaging.is_empty() {
            EntryKind::Messaging(&self.messaging)
        } else if !self.changes.is_empty() {
            EntryKind::Feed(&self.changes)
        } else {
            EntryKind::Empty
        }
    }
}

/// One DM event within an entry.
#[derive(Debug, Clone, Deserialize)]
pub struct MessagingEvent {
    #[serde(default)]
    pub sender: Option<EventParty>,
    #[serde(default)]
    pub recipient: Option<EventParty>,
    #[serde(default)]
    pub timestamp: Option<i64>,
    #[serde(default)]
    pub message: Option<InboundMessage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventParty {
    #[serde(default)]
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InboundMessage {
    #[serde(default)]
    pub mid: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub quick_reply: Option<QuickReplyEcho>,
}

/// Echo of the quick-reply button the customer tapped.
#[derive(Debug, Clone, Deserialize)]
pub struct QuickReplyEcho {
    #[serde(default)]
    pub payload: String,
}

impl MessagingEvent {
    /// Text accepted for processing: present, non-blank, and within the
    /// length limit. Anything else means "skip this event".
    pub fn accepted_text(&self) -> Option<&str> {
        let text = self.message.as_ref()?.text.as_deref()?;
        let trimmed = text.trim();
        if trimmed.is_empty() || trimmed.chars().count() > MAX_TEXT_CHARS {
            return None;
        }
        Some(trimmed)
    }

    pub fn quick_reply_payload(&self) -> Option<&str> {
        self.message
            .as_ref()?
            .quick_reply
            .as_ref()
            .map(|qr| qr.payload.as_str())
    }
}
