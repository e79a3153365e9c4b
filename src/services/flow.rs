//! Flow interception.
//!
//! A flow is a deterministic scripted sub-dialogue that preempts free-form
//! AI generation. The canonical flow here is structured order collection:
//! once a conversation enters it, each inbound message answers the current
//! step until the customer confirms or declines. The interceptor returning
//! `None` means "not applicable, fall through to the AI"; any error from it
//! is caught at the pipeline boundary and treated as `None` (fail open) so
//! a broken script never blocks all replies.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::middleware::error_handling::Result;
use crate::models::QuickReplyOption;
use crate::services::responder::{
    confirm_options, PAYLOAD_CHECK_ORDER, PAYLOAD_ORDER_CONFIRM, PAYLOAD_ORDER_DECLINE,
    PAYLOAD_ORDER_START, PAYLOAD_SHIPPING_INFO,
};

/// Context the pipeline hands to the interceptor.
#[derive(Debug, Clone)]
pub struct FlowContext {
    pub is_new_conversation: bool,
    pub quick_reply_payload: Option<String>,
}

/// A complete scripted reply. Empty `quick_replies` with a `response` means
/// plain text; both empty is a silent no-op that still counts as
/// intercepted.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowResult {
    pub response: Option<String>,
    pub quick_replies: Vec<QuickReplyOption>,
}

impl FlowResult {
    pub fn text(response: impl Into<String>) -> Self {
        Self {
            response: Some(response.into()),
            quick_replies: Vec::new(),
        }
    }

    pub fn with_quick_replies(response: impl Into<String>, options: Vec<QuickReplyOption>) -> Self {
        Self {
            response: Some(response.into()),
            quick_replies: options,
        }
    }
}

#[async_trait]
pub trait FlowInterceptor: Send + Sync {
    async fn intercept(
        &self,
        conversation_id: Uuid,
        store_id: Uuid,
        message_text: &str,
        context: &FlowContext,
    ) -> Result<Option<FlowResult>>;
}

// ----------------------------------------------------------------------------
// Order-collection flow
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, sqlx::FromRow)]
struct FlowSession {
    conversation_id: Uuid,
    step: String,
    collected: serde_json::Value,
    #[allow(dead_code)]
    updated_at: DateTime<Utc>,
}

const STEP_NAME: &str = "name";
const STEP_ADDRESS: &str = "address";
const STEP_PHONE: &str = "phone";
const STEP_CONFIRM: &str = "confirm";

/// Order-collection script backed by the `flow_sessions` table: one row per
/// conversation currently mid-script, keyed by conversation id.
pub struct OrderFlowInterceptor {
    pool: PgPool,
}

impl OrderFlowInterceptor {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn find_session(&self, conversation_id: Uuid) -> Result<Option<FlowSession>> {
        let session = sqlx::query_as::<_, FlowSession>(
            "SELECT * FROM flow_sessions WHERE conversation_id = $1",
        )
        .bind(conversation_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(session)
    }

    async fn start_session(&self, conversation_id: Uuid) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO flow_sessions (conversation_id, step, collected)
            VALUES ($1, $2, '{}'::jsonb)
            ON CONFLICT (conversation_id) DO UPDATE
            SET step = EXCLUDED.step, collected = '{}'::jsonb, updated_at = NOW()
            "#,
        )
        .bind(conversation_id)
        .bind(STEP_NAME)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn advance(
        &self,
        session: &FlowSession,
        next_step: &str,
        answer_key: &str,
        answer: &str,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE flow_sessions
            SET step = $2, collected = collected || $3, updated_at = NOW()
            WHERE conversation_id = $1
            "#,
        )
        .bind(session.conversation_id)
        .bind(next_step)
        .bind(json!({ answer_key: answer }))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn end_session(&self, conversation_id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM flow_sessions WHERE conversation_id = $1")
            .bind(conversation_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    fn summary(collected: &serde_json::Value) -> String {
        let field = |key: &str| {
            collected
                .get(key)
                .and_then(|v| v.as_str())
                .unwrap_or("-")
                .to_string()
        };
        format!(
            "Захиалгын мэдээлэл:\nНэр: {}\nХаяг: {}\nУтас: {}\nБаталгаажуулах уу?",
            field("name"),
            field("address"),
            field("phone"),
        )
    }

    /// Advance a live session by one step using the inbound text as the
    /// answer to the current question.
    async fn step_session(
        &self,
        session: FlowSession,
        message_text: &str,
        payload: Option<&str>,
    ) -> Result<FlowResult> {
        match session.step.as_str() {
            STEP_NAME => {
                self.advance(&session, STEP_ADDRESS, "name", message_text).await?;
                Ok(FlowResult::text("Хүргэлтийн хаягаа бичнэ үү."))
            }
            STEP_ADDRESS => {
                self.advance(&session, STEP_PHONE, "address", message_text).await?;
                Ok(FlowResult::text("Холбогдох утасны дугаараа бичнэ үү."))
            }
            STEP_PHONE => {
                self.advance(&session, STEP_CONFIRM, "phone", message_text).await?;
                let collected = session.collected.clone();
                let mut merged = collected;
                merged["phone"] = json!(message_text);
                Ok(FlowResult::with_quick_replies(
                    Self::summary(&merged),
                    confirm_options(),
                ))
            }
            STEP_CONFIRM => match payload {
                Some(PAYLOAD_ORDER_CONFIRM) => {
                    self.end_session(session.conversation_id).await?;
                    Ok(FlowResult::text(
                        "Захиалга баталгаажлаа. Бид тантай удахгүй холбогдоно. Баярлалаа!",
                    ))
                }
                Some(PAYLOAD_ORDER_DECLINE) => {
                    self.end_session(session.conversation_id).await?;
                    Ok(FlowResult::text("Захиалга цуцлагдлаа."))
                }
                // Free-form answer at the confirm step: re-ask with buttons.
                _ => Ok(FlowResult::with_quick_replies(
                    Self::summary(&session.collected),
                    confirm_options(),
                )),
            },
            unknown => {
                // Corrupt state; drop the session rather than trap the
                // customer in it.
                tracing::warn!(
                    conversation_id = %session.conversation_id,
                    step = unknown,
                    "Unknown flow step, ending session"
                );
                self.end_session(session.conversation_id).await?;
                Ok(FlowResult {
                    response: None,
                    quick_replies: Vec::new(),
                })
            }
        }
    }
}

#[async_trait]
impl FlowInterceptor for OrderFlowInterceptor {
    async fn intercept(
        &self,
        conversation_id: Uuid,
        _store_id: Uuid,
        message_text: &str,
        context: &FlowContext,
    ) -> Result<Option<FlowResult>> {
        let payload = context.quick_reply_payload.as_deref();

        // Deterministic button payloads, handled whether or not a session
        // is live.
        match payload {
            Some(PAYLOAD_ORDER_START) => {
                self.start_session(conversation_id).await?;
                return Ok(Some(FlowResult::text(
                    "Захиалга эхэллээ. Хүлээн авагчийн нэрээ бичнэ үү.",
                )));
            }
            Some(PAYLOAD_SHIPPING_INFO) => {
                return Ok(Some(FlowResult::text(
                    "Улаанбаатар хот дотор 24-48 цагт, орон нутагт 2-5 хоногт хүргэнэ.",
                )));
            }
            Some(PAYLOAD_CHECK_ORDER) => {
                return Ok(Some(FlowResult::text(
                    "Захиалгын дугаараа бичвэл бид шалгаад хариу өгье.",
                )));
            }
            _ => {}
        }

        match self.find_session(conversation_id).await? {
            Some(session) => Ok(Some(self.step_session(session, message_text, payload).await?)),
            None => Ok(None),
        }
    }
}
