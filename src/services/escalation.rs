//! Escalation decision step.
//!
//! Pure function of (message text, tenant settings). Runs synchronously
//! before any auto-reply logic so a distressed customer is never caught in
//! a scripted flow or handed to the AI. Highest-priority branch: if this
//! fires, no flow interception and no AI reply happen for the message.

use crate::models::ChatbotSettings;

/// Sent when a trigger fires and the tenant configured no handoff text.
pub const DEFAULT_ESCALATION_MESSAGE: &str =
    "Таныг манай ажилтантай холбож байна. Түр хүлээнэ үү.";

#[derive(Debug, Clone, PartialEq)]
pub struct EscalationDecision {
    pub escalated: bool,
    /// Handoff text to send when escalated, if any.
    pub message: Option<String>,
}

impl EscalationDecision {
    fn pass() -> Self {
        Self {
            escalated: false,
            message: None,
        }
    }
}

/// Evaluate tenant-configured triggers against the current message plus a
/// bounded window of recent customer messages (chronological, current
/// message excluded). Matching is case-insensitive substring containment
/// over both the escalation keyword list and the human-request phrases; the
/// window is joined with spaces so a phrase split across consecutive
/// messages still triggers.
pub fn evaluate(
    message_text: &str,
    recent_messages: &[String],
    settings: &ChatbotSettings,
) -> EscalationDecision {
    let mut window = recent_messages.join(" ");
    if !window.is_empty() {
        window.push(' ');
    }
    window.push_str(message_text);
    let text = window.to_lowercase();

    let triggered = settings
        .escalation_keywords
        .iter()
        .chain(settings.human_request_phrases.iter())
        .filter(|t| !t.trim().is_empty())
        .any(|trigger| text.contains(&trigger.to_lowercase()));

    if !triggered {
        return EscalationDecision::pass();
    }

    EscalationDecision {
        escalated: true,
        message: Some(
            settings
                .escalation_message
                .clone()
                .unwrap_or_else(|| DEFAULT_ESCALATION_MESSAGE.to_string()),
        ),
    }
}
