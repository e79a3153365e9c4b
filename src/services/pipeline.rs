//! The per-event processing pipeline.
//!
//! For each inbound messaging event: upsert customer and conversation,
//! persist the message and bump the unread counter concurrently, fire
//! detached tagging/notification work, then pick exactly one reply branch
//! in priority order: escalation, flow interception, AI reply. At most one
//! outbound reply is produced per inbound message.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use crate::middleware::error_handling::Result;
use crate::middleware::metrics::WEBHOOK_EVENTS;
use crate::models::customer::PLACEHOLDER_NAME;
use crate::models::{AiContext, MessageSender, MessagingEvent, OutboundMessage};
use crate::services::ai_engine::AiEngine;
use crate::services::channel::{ChannelSender, SenderAction};
use crate::services::escalation;
use crate::services::flow::{FlowContext, FlowInterceptor, FlowResult};
use crate::services::notifications::{NotificationEvent, NotificationSink};
use crate::services::responder;
use crate::services::store::ConversationStore;
use crate::services::tagging::TaggingService;
use crate::services::tenant_resolver::ResolvedTenant;
use crate::utils::detach::spawn_detached;

/// Bound on the AI engine call, the longest-latency step. A timeout is
/// handled exactly like any other AI failure: logged, nothing sent.
const AI_TIMEOUT: Duration = Duration::from_secs(12);

/// How many prior customer messages the escalation evaluator sees.
const ESCALATION_HISTORY: i64 = 5;

/// Terminal state of one event's processing, for logs and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    /// Validation skip: no sender, no/blank/oversized text.
    Skipped,
    /// Escalation trigger fired; handed to a human.
    Escalated,
    /// A scripted flow produced the reply.
    Intercepted,
    /// AI reply sent.
    Replied,
    /// AI returned an empty response; nothing sent.
    NoResponse,
    /// Tenant has ai_auto_reply off; stored but not answered.
    AutoReplyDisabled,
}

impl EventOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventOutcome::Skipped => "skipped",
            EventOutcome::Escalated => "escalated",
            EventOutcome::Intercepted => "intercepted",
            EventOutcome::Replied => "replied",
            EventOutcome::NoResponse => "no_response",
            EventOutcome::AutoReplyDisabled => "auto_reply_disabled",
        }
    }
}

pub struct WebhookPipeline {
    store: Arc<dyn ConversationStore>,
    channel: Arc<dyn ChannelSender>,
    ai: Arc<dyn AiEngine>,
    flow: Arc<dyn FlowInterceptor>,
    notifications: Arc<dyn NotificationSink>,
    tagger: Arc<TaggingService>,
}

impl WebhookPipeline {
    pub fn new(
        store: Arc<dyn ConversationStore>,
        channel: Arc<dyn ChannelSender>,
        ai: Arc<dyn AiEngine>,
        flow: Arc<dyn FlowInterceptor>,
        notifications: Arc<dyn NotificationSink>,
    ) -> Self {
        let tagger = Arc::new(TaggingService::new(ai.clone(), store.clone()));
        Self {
            store,
            channel,
            ai,
            flow,
            notifications,
            tagger,
        }
    }

    /// Process one messaging event for an already-resolved tenant.
    pub async fn handle_event(
        &self,
        tenant: &ResolvedTenant,
        event: &MessagingEvent,
    ) -> Result<EventOutcome> {
        let outcome = self.process_event(tenant, event).await;
        let label = match &outcome {
            Ok(o) => o.as_str(),
            Err(_) => "error",
        };
        WEBHOOK_EVENTS.with_label_values(&[label]).inc();
        outcome
    }

    async fn process_event(
        &self,
        tenant: &ResolvedTenant,
        event: &MessagingEvent,
    ) -> Result<EventOutcome> {
        let Some(sender_id) = event
            .sender
            .as_ref()
            .map(|s| s.id.trim())
            .filter(|id| !id.is_empty())
        else {
            tracing::debug!(store_id = %tenant.store.id, "Event without sender, skipping");
            return Ok(EventOutcome::Skipped);
        };

        let Some(text) = event.accepted_text() else {
            tracing::debug!(
                store_id = %tenant.store.id,
                sender = sender_id,
                "Event without acceptable text, skipping"
            );
            return Ok(EventOutcome::Skipped);
        };

        let quick_reply_payload = event.quick_reply_payload().map(String::from);

        // Customer upsert. The profile lookup is best-effort: one network
        // call, failure falls back to the placeholder name.
        let (customer, is_new_customer) = match self
            .store
            .find_customer(tenant.store.id, tenant.channel, sender_id)
            .await?
        {
            Some(existing) => (existing, false),
            None => {
                let name = match tenant.access_token.as_deref() {
                    Some(token) => self
                        .channel
                        .fetch_profile_name(tenant.channel, sender_id, token)
                        .await
                        .unwrap_or_else(|e| {
                            tracing::info!(sender = sender_id, error = %e, "Profile fetch failed");
                            None
                        }),
                    None => None,
                };
                let name = name.unwrap_or_else(|| PLACEHOLDER_NAME.to_string());
                let created = self
                    .store
                    .insert_customer(tenant.store.id, tenant.channel, sender_id, &name)
                    .await?;
                (created, true)
            }
        };

        if is_new_customer {
            let sink = self.notifications.clone();
            let store_id = tenant.store.id;
            let payload = json!({
                "customer_id": customer.id,
                "name": customer.name,
                "channel": tenant.channel.as_str(),
            });
            spawn_detached("notify_new_customer", async move {
                sink.dispatch(store_id, NotificationEvent::NewCustomer, payload).await
            });
        }

        let (conversation, is_new_conversation) = self
            .store
            .find_or_create_conversation(tenant.store.id, customer.id, tenant.channel)
            .await?;

        // Persist and bump the unread counter concurrently; proceed only
        // once both have settled. The bump is atomic server-side; if it
        // fails the stored message remains the source of truth, so the
        // failure is logged and processing continues.
        let metadata = match &quick_reply_payload {
            Some(payload) => json!({ "quick_reply_payload": payload }),
            None => json!({}),
        };
        let (message_result, bump_result) = tokio::join!(
            self.store
                .insert_message(conversation.id, text, MessageSender::Customer, metadata),
            self.store.bump_unread(conversation.id),
        );
        let message = message_result?;
        if let Err(e) = bump_result {
            tracing::error!(
                conversation_id = %conversation.id,
                error = %e,
                "Unread counter update failed"
            );
        }

        // Detached enrichment and side-channel work; the reply path does
        // not wait for either.
        {
            let tagger = self.tagger.clone();
            let message_id = message.id;
            let text_owned = text.to_string();
            spawn_detached("tag_message", async move {
                tagger.tag_message(message_id, &text_owned).await
            });
        }
        {
            let sink = self.notifications.clone();
            let store_id = tenant.store.id;
            let payload = json!({
                "conversation_id": conversation.id,
                "customer_id": customer.id,
                "message_id": message.id,
            });
            spawn_detached("notify_new_message", async move {
                sink.dispatch(store_id, NotificationEvent::NewMessage, payload).await
            });
        }

        // Branch 1: escalation. Runs before flow interception so a
        // distressed customer is never caught in a scripted flow. Triggers
        // are matched over the current message plus a bounded history
        // window, so a request split across consecutive messages still
        // escalates. A failed history read degrades to the current message.
        let recent = self
            .store
            .recent_messages(conversation.id, message.id, ESCALATION_HISTORY)
            .await
            .unwrap_or_else(|e| {
                tracing::warn!(
                    conversation_id = %conversation.id,
                    error = %e,
                    "History read failed, evaluating current message only"
                );
                Vec::new()
            });
        let decision = escalation::evaluate(text, &recent, &tenant.settings);
        if decision.escalated {
            tracing::info!(
                conversation_id = %conversation.id,
                "Escalation trigger fired, handing off to human"
            );
            if let Some(handoff) = decision.message {
                self.deliver(tenant, sender_id, &OutboundMessage::Text { text: handoff })
                    .await;
            }
            return Ok(EventOutcome::Escalated);
        }

        // Branch 2: flow interception. Fails open: a broken script must
        // never block all customer replies.
        let flow_context = FlowContext {
            is_new_conversation,
            quick_reply_payload,
        };
        match self
            .flow
            .intercept(conversation.id, tenant.store.id, text, &flow_context)
            .await
        {
            Ok(Some(result)) => {
                self.send_flow_result(tenant, sender_id, result).await;
                return Ok(EventOutcome::Intercepted);
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(
                    conversation_id = %conversation.id,
                    error = %e,
                    "Flow interceptor failed, falling through to AI"
                );
            }
        }

        // Branch 3: AI reply.
        if !tenant.store.ai_auto_reply {
            return Ok(EventOutcome::AutoReplyDisabled);
        }

        self.cosmetic(tenant, sender_id, SenderAction::MarkSeen);
        self.cosmetic(tenant, sender_id, SenderAction::TypingOn);

        let context = AiContext {
            store_id: tenant.store.id,
            conversation_id: conversation.id,
            customer_id: customer.id,
            customer_name: customer.name.clone(),
            message: text.to_string(),
            tone: tenant.settings.tone.clone(),
        };
        let ai_result = tokio::time::timeout(AI_TIMEOUT, self.ai.respond(&context)).await;

        self.cosmetic(tenant, sender_id, SenderAction::TypingOff);

        // The broadest catch boundary in the pipeline: any AI failure,
        // timeout included, degrades to silence rather than an error
        // message to the customer.
        let reply = match ai_result {
            Ok(Ok(reply)) => reply,
            Ok(Err(e)) => {
                tracing::error!(conversation_id = %conversation.id, error = %e, "AI reply failed");
                return Ok(EventOutcome::NoResponse);
            }
            Err(_) => {
                tracing::error!(conversation_id = %conversation.id, "AI reply timed out");
                return Ok(EventOutcome::NoResponse);
            }
        };

        let planned = responder::plan_messages(&reply);
        if planned.is_empty() {
            tracing::info!(
                conversation_id = %conversation.id,
                intent = ?reply.intent,
                "AI produced no response, nothing sent"
            );
            return Ok(EventOutcome::NoResponse);
        }

        for outbound in &planned {
            self.deliver(tenant, sender_id, outbound).await;
        }

        Ok(EventOutcome::Replied)
    }

    /// Output shape selection for a flow result: quick replies when any are
    /// present, plain text when only a response exists, silent no-op when
    /// both are empty.
    async fn send_flow_result(
        &self,
        tenant: &ResolvedTenant,
        recipient_id: &str,
        result: FlowResult,
    ) {
        let outbound = if !result.quick_replies.is_empty() {
            OutboundMessage::QuickReplies {
                text: result.response.unwrap_or_default(),
                options: result.quick_replies,
            }
        } else if let Some(response) = result.response {
            OutboundMessage::Text { text: response }
        } else {
            return;
        };
        self.deliver(tenant, recipient_id, &outbound).await;
    }

    /// Send one deliverable message. Without an access token the send is
    /// skipped (inbound processing already happened). Failures are logged
    /// with enough context for manual inspection; no automatic retry.
    async fn deliver(&self, tenant: &ResolvedTenant, recipient_id: &str, message: &OutboundMessage) {
        let Some(token) = tenant.access_token.as_deref() else {
            tracing::debug!(
                store_id = %tenant.store.id,
                kind = message.kind(),
                "No access token, skipping send"
            );
            return;
        };

        if let Err(e) = self
            .channel
            .send(tenant.channel, recipient_id, token, message)
            .await
        {
            tracing::error!(
                store_id = %tenant.store.id,
                recipient = recipient_id,
                kind = message.kind(),
                error = %e,
                "Outbound send failed"
            );
        }
    }

    /// Fire-and-forget sender action (typing indicator, mark seen).
    fn cosmetic(&self, tenant: &ResolvedTenant, recipient_id: &str, action: SenderAction) {
        let Some(token) = tenant.access_token.clone() else {
            return;
        };
        let channel_sender = self.channel.clone();
        let channel = tenant.channel;
        let recipient = recipient_id.to_string();
        spawn_detached("sender_action", async move {
            channel_sender
                .sender_action(channel, &recipient, &token, action)
                .await
        });
    }
}
