pub mod config;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod repositories;
pub mod services;
pub mod utils;

use std::sync::Arc;

use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;

use crate::config::AppConfig;
use crate::repositories::StoreRepository;
use crate::services::{
    AiEngine, ChannelSender, ConversationStore, FlowInterceptor, GraphApiSender, HttpAiEngine,
    NotificationSink, OrderFlowInterceptor, PgConversationStore, PgNotificationSink,
    TenantResolver, WebhookPipeline,
};

#[derive(Clone)]
pub struct AppState {
    pub app_secret: String,
    pub verify_token: String,
    pub resolver: Arc<TenantResolver>,
    pub pipeline: Arc<WebhookPipeline>,
}

impl AppState {
    /// Wire the production collaborators: Postgres persistence, Graph API
    /// sends, HTTP AI engine, order-collection flow, Postgres notifications.
    pub fn from_config(config: &AppConfig) -> Self {
        let pool = config.database_pool.clone();

        let store: Arc<dyn ConversationStore> = Arc::new(PgConversationStore::new(pool.clone()));
        let channel: Arc<dyn ChannelSender> =
            Arc::new(GraphApiSender::new(config.graph_api_base.clone()));
        let ai: Arc<dyn AiEngine> = Arc::new(HttpAiEngine::new(
            config.ai_engine_base.clone(),
            config.ai_engine_key.clone(),
        ));
        let flow: Arc<dyn FlowInterceptor> = Arc::new(OrderFlowInterceptor::new(pool.clone()));
        let notifications: Arc<dyn NotificationSink> =
            Arc::new(PgNotificationSink::new(pool.clone()));

        let pipeline = Arc::new(WebhookPipeline::new(
            store,
            channel,
            ai,
            flow,
            notifications,
        ));
        let resolver = Arc::new(TenantResolver::new(
            StoreRepository::new(pool),
            config.fallback_page_token.clone(),
        ));

        Self {
            app_secret: config.app_secret.clone(),
            verify_token: config.verify_token.clone(),
            resolver,
            pipeline,
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(middleware::metrics::metrics_handler))
        .route(
            "/webhook/messenger",
            get(handlers::webhook::verify_webhook).post(handlers::webhook::receive_webhook),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
