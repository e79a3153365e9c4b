//! Meta webhook endpoint.
//!
//! GET  /webhook/messenger: subscription verification (hub.challenge echo)
//! POST /webhook/messenger: signed delivery of messaging/feed events
//!
//! Response taxonomy: 403 for a bad signature or failed verification, 500
//! for missing configuration or an unexpected processing failure (generic
//! body, no internals leaked), `{status:"ignored"}` for unrecognized
//! platform objects, `{status:"ok"}` otherwise, even when individual
//! events were skipped.

use std::time::Instant;

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::middleware::error_handling::Result;
use crate::middleware::metrics::WEBHOOK_DELIVERIES;
use crate::models::{EntryKind, VerifyParams, WebhookEnvelope};
use crate::services::signature;
use crate::AppState;

const SIGNATURE_HEADER: &str = "x-hub-signature-256";

/// GET verification sub-flow. Meta sends `hub.mode=subscribe` with the
/// configured verify token; respond with the raw challenge on a match.
pub async fn verify_webhook(
    State(state): State<AppState>,
    Query(params): Query<VerifyParams>,
) -> Response {
    let mode_ok = params.mode.as_deref() == Some("subscribe");
    let token_ok = params.verify_token.as_deref() == Some(state.verify_token.as_str());

    if mode_ok && token_ok {
        if let Some(challenge) = params.challenge {
            tracing::info!("Webhook subscription verified");
            return (StatusCode::OK, challenge).into_response();
        }
    }

    tracing::warn!("Webhook verification rejected");
    (
        StatusCode::FORBIDDEN,
        Json(json!({ "error": "Verification failed" })),
    )
        .into_response()
}

/// POST delivery sub-flow.
pub async fn receive_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let started = Instant::now();

    if state.app_secret.is_empty() {
        tracing::error!("META_APP_SECRET is not configured, rejecting delivery");
        WEBHOOK_DELIVERIES.with_label_values(&["unknown", "error"]).inc();
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "Webhook processing failed" })),
        )
            .into_response();
    }

    // 🔒 SECURITY: verify against the untouched raw bytes before any JSON
    // parsing; re-serialization would invalidate the signature. On
    // rejection, log only the fact of rejection, never payload contents.
    let signature_header = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());
    if !signature::verify(&body, signature_header, &state.app_secret) {
        tracing::warn!("Webhook delivery rejected: invalid signature");
        WEBHOOK_DELIVERIES.with_label_values(&["unknown", "rejected"]).inc();
        return (
            StatusCode::FORBIDDEN,
            Json(json!({ "error": "Invalid signature" })),
        )
            .into_response();
    }

    let envelope: WebhookEnvelope = match serde_json::from_slice(&body) {
        Ok(envelope) => envelope,
        Err(e) => {
            tracing::warn!("Signed delivery with unparseable body: {}", e);
            WEBHOOK_DELIVERIES.with_label_values(&["unknown", "error"]).inc();
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "Invalid payload" })),
            )
                .into_response();
        }
    };

    let object = envelope.object.clone();
    if object != "page" && object != "instagram" {
        tracing::debug!(object = %object, "Unrecognized webhook object, ignoring");
        WEBHOOK_DELIVERIES.with_label_values(&[object.as_str(), "ignored"]).inc();
        return Json(json!({ "status": "ignored" })).into_response();
    }

    match process_delivery(&state, &envelope).await {
        Ok(()) => {
            WEBHOOK_DELIVERIES.with_label_values(&[object.as_str(), "ok"]).inc();
            tracing::info!(
                object = %object,
                entries = envelope.entry.len(),
                duration_ms = started.elapsed().as_millis() as u64,
                "Webhook delivery processed"
            );
            Json(json!({ "status": "ok" })).into_response()
        }
        Err(e) => {
            WEBHOOK_DELIVERIES.with_label_values(&[object.as_str(), "error"]).inc();
            tracing::error!(
                object = %object,
                duration_ms = started.elapsed().as_millis() as u64,
                error = %e,
                "Webhook delivery failed"
            );
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Webhook processing failed" })),
            )
                .into_response()
        }
    }
}

/// Walk entries and events. One bad entry or event never fails the batch:
/// unrecognized tenants are routine, and per-event failures are logged and
/// skipped.
async fn process_delivery(state: &AppState, envelope: &WebhookEnvelope) -> Result<()> {
    for entry in &envelope.entry {
        match entry.kind() {
            EntryKind::Feed(changes) => {
                // Feed/comment events belong to the comment auto-reply
                // collaborator, not this pipeline.
                tracing::debug!(
                    entry_id = %entry.id,
                    changes = changes.len(),
                    "Skipping feed change events"
                );
            }
            EntryKind::Empty => {
                tracing::debug!(entry_id = %entry.id, "Entry with no events");
            }
            EntryKind::Messaging(events) => {
                let tenant = match state.resolver.resolve(&entry.id).await {
                    Ok(Some(tenant)) => tenant,
                    Ok(None) => {
                        tracing::debug!(entry_id = %entry.id, "No tenant for entry, skipping");
                        continue;
                    }
                    Err(e) => {
                        tracing::warn!(entry_id = %entry.id, error = %e, "Tenant resolution failed");
                        continue;
                    }
                };

                for event in events {
                    match state.pipeline.handle_event(&tenant, event).await {
                        Ok(outcome) => {
                            tracing::debug!(
                                store_id = %tenant.store.id,
                                outcome = outcome.as_str(),
                                "Event processed"
                            );
                        }
                        Err(e) => {
                            tracing::error!(
                                store_id = %tenant.store.id,
                                error = %e,
                                "Event processing failed, continuing batch"
                            );
                        }
                    }
                }
            }
        }
    }

    Ok(())
}
