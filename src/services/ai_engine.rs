//! AI chat/classifier engine client.
//!
//! The engine is an opaque collaborator reached over HTTP: `/chat` turns a
//! customer message plus context into a tagged reply (intent, matched
//! products, order-collection step), `/classify` assigns sentiment/topic
//! tags. Both are consumed via a request/response contract only; model
//! internals are out of scope.

use std::time::Instant;

use async_trait::async_trait;

use crate::middleware::error_handling::{AppError, Result};
use crate::models::{AiContext, AiReply, TagResult};

#[async_trait]
pub trait AiEngine: Send + Sync {
    async fn respond(&self, context: &AiContext) -> Result<AiReply>;

    async fn classify(&self, text: &str) -> Result<TagResult>;
}

pub struct HttpAiEngine {
    http_client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpAiEngine {
    pub fn new(base_url: String, api_key: Option<String>) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            base_url,
            api_key,
        }
    }

    fn request(&self, path: &str) -> reqwest::RequestBuilder {
        let mut builder = self
            .http_client
            .post(format!("{}{}", self.base_url, path))
            .header("content-type", "application/json");
        if let Some(key) = &self.api_key {
            builder = builder.header("x-api-key", key);
        }
        builder
    }
}

#[async_trait]
impl AiEngine for HttpAiEngine {
    async fn respond(&self, context: &AiContext) -> Result<AiReply> {
        let start_time = Instant::now();

        let response = self.request("/chat").json(context).send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            tracing::error!("AI engine error ({}): {}", status, error_body);
            return Err(AppError::Upstream(format!(
                "AI engine returned {}",
                status
            )));
        }

        let reply: AiReply = response.json().await.map_err(|e| {
            AppError::Internal(anyhow::anyhow!("Failed to parse AI engine response: {}", e))
        })?;

        tracing::info!(
            conversation_id = %context.conversation_id,
            intent = ?reply.intent,
            products = reply.products.len(),
            latency_ms = start_time.elapsed().as_millis() as u64,
            "AI engine reply"
        );

        Ok(reply)
    }

    async fn classify(&self, text: &str) -> Result<TagResult> {
        let response = self
            .request("/classify")
            .json(&serde_json::json!({ "text": text }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Upstream(format!(
                "Classifier returned {}",
                status
            )));
        }

        let result: TagResult = response.json().await.map_err(|e| {
            AppError::Internal(anyhow::anyhow!("Failed to parse classifier response: {}", e))
        })?;

        Ok(result)
    }
}
