// ============================================================================
// Prometheus Metrics - Webhook Pipeline Observability
// ============================================================================
//
// Series:
//   chatdesk_webhook_deliveries_total{object, status}
//       One per POST delivery. status: ok | ignored | rejected | error
//   chatdesk_webhook_events_total{outcome}
//       One per messaging event. outcome: replied | escalated | intercepted |
//       no_response | skipped | auto_reply_disabled | error
//   chatdesk_outbound_sends_total{channel, kind, result}
//       One per text/quick-reply/card send attempt.
//
// Scrape endpoint: GET /metrics
//
// ============================================================================

use axum::{http::StatusCode, response::IntoResponse};
use lazy_static::lazy_static;
use prometheus::{register_counter_vec, CounterVec, Encoder, TextEncoder};

lazy_static! {
    pub static ref WEBHOOK_DELIVERIES: CounterVec = register_counter_vec!(
        "chatdesk_webhook_deliveries_total",
        "Webhook POST deliveries by platform object and outcome",
        &["object", "status"]
    )
    .unwrap();

    pub static ref WEBHOOK_EVENTS: CounterVec = register_counter_vec!(
        "chatdesk_webhook_events_total",
        "Individual messaging events by pipeline outcome",
        &["outcome"]
    )
    .unwrap();

    pub static ref OUTBOUND_SENDS: CounterVec = register_counter_vec!(
        "chatdesk_outbound_sends_total",
        "Outbound platform sends by channel, message kind, and result",
        &["channel", "kind", "result"]
    )
    .unwrap();
}

/// GET /metrics - Prometheus scrape endpoint
pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return (StatusCode::INTERNAL_SERVER_ERROR, String::new()).into_response();
    }

    (
        StatusCode::OK,
        [("content-type", prometheus::TEXT_FORMAT)],
        buffer,
    )
        .into_response()
}
