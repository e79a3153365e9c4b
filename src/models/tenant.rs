use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A tenant business ("store") using the platform. Owns its customers,
/// conversations, and messages. Created by the signup flow; this pipeline
/// only reads it.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Store {
    pub id: Uuid,
    pub name: String,
    /// Facebook page id this store is connected to (Messenger channel).
    pub page_id: Option<String>,
    /// Instagram business account id (Instagram channel).
    pub instagram_id: Option<String>,
    /// Per-tenant page access token. Pre-migration tenants may have none
    /// and fall back to the global token.
    pub page_access_token: Option<String>,
    pub ai_auto_reply: bool,
    /// Raw chatbot settings blob as stored; parse with
    /// [`ChatbotSettings::from_value`] at the tenant-resolution boundary.
    pub chatbot_settings: Option<serde_json::Value>,
    pub connected: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The messaging surface a customer reached the tenant through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Messenger,
    Instagram,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Messenger => "messenger",
            Channel::Instagram => "instagram",
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed view of the per-tenant `chatbot_settings` blob.
///
/// Unknown keys are ignored; missing keys take defaults. Parsed once at
/// tenant resolution rather than ad hoc at each consumption site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatbotSettings {
    /// Keywords that force a handoff to a human agent.
    pub escalation_keywords: Vec<String>,
    /// Phrases that mean "I want to talk to a person".
    pub human_request_phrases: Vec<String>,
    /// Text sent to the customer when a conversation is escalated.
    pub escalation_message: Option<String>,
    /// Free-form tone hint passed through to the AI engine.
    pub tone: String,
}

impl Default for ChatbotSettings {
    fn default() -> Self {
        Self {
            escalation_keywords: Vec::new(),
            human_request_phrases: vec![
                "talk to human".to_string(),
                "talk to a person".to_string(),
                "real person".to_string(),
                "хүнтэй ярих".to_string(),
                "ажилтантай холбогдох".to_string(),
            ],
            escalation_message: None,
            tone: "friendly".to_string(),
        }
    }
}

impl ChatbotSettings {
    /// Parse the stored blob, falling back to defaults on any malformed or
    /// absent value. A broken settings blob must never break the pipeline.
    pub fn from_value(value: Option<&serde_json::Value>) -> Self {
        match value {
            Some(v) => serde_json::from_value(v.clone()).unwrap_or_else(|e| {
                tracing::warn!("Malformed chatbot_settings, using defaults: {}", e);
                Self::default()
            }),
            None => Self::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn settings_default_when_absent() {
        let settings = ChatbotSettings::from_value(None);
        assert_eq!(settings.tone, "friendly");
        assert!(settings.escalation_keywords.is_empty());
        assert!(!settings.human_request_phrases.is_empty());
    }

    #[test]
    fn settings_parse_known_keys_and_ignore_unknown() {
        let blob = json!({
            "escalation_keywords": ["refund", "гомдол"],
            "tone": "formal",
            "some_future_key": {"nested": true}
        });
        let settings = ChatbotSettings::from_value(Some(&blob));
        assert_eq!(settings.escalation_keywords, vec!["refund", "гомдол"]);
        assert_eq!(settings.tone, "formal");
    }

    #[test]
    fn settings_default_on_malformed_blob() {
        let blob = json!(["not", "an", "object"]);
        let settings = ChatbotSettings::from_value(Some(&blob));
        assert_eq!(settings, ChatbotSettings::default());
    }
}
