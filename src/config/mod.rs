use std::env;

use anyhow::Result;
use sqlx::PgPool;

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub database: String,
    pub ssl_mode: String,
}

impl DatabaseConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            host: env::var("DATABASE_HOST").unwrap_or_else(|_| "localhost".to_string()),
            port: env::var("DATABASE_PORT")
                .unwrap_or_else(|_| "5432".to_string())
                .parse()?,
            username: env::var("DATABASE_USER").unwrap_or_else(|_| "postgres".to_string()),
            password: env::var("DATABASE_PASSWORD")?,
            database: env::var("DATABASE_NAME").unwrap_or_else(|_| "chatdesk".to_string()),
            ssl_mode: env::var("DATABASE_SSL_MODE").unwrap_or_else(|_| "prefer".to_string()),
        })
    }

    pub fn connection_string(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}?sslmode={}",
            self.username, self.password, self.host, self.port, self.database, self.ssl_mode
        )
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub database_pool: PgPool,
    pub server_host: String,
    pub server_port: u16,
    /// Meta app secret used to verify X-Hub-Signature-256. Tenant-independent.
    pub app_secret: String,
    /// Token Meta echoes back during the GET verification sub-flow.
    pub verify_token: String,
    /// Global page access token for tenants created before per-tenant tokens.
    pub fallback_page_token: Option<String>,
    /// Graph API base, overridable for tests/proxies.
    pub graph_api_base: String,
    /// Base URL of the AI chat/classifier engine.
    pub ai_engine_base: String,
    pub ai_engine_key: Option<String>,
}

impl AppConfig {
    pub async fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let database = DatabaseConfig::from_env()?;
        let database_pool = sqlx::PgPool::connect(&database.connection_string()).await?;

        Ok(Self {
            database,
            database_pool,
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            app_secret: env::var("META_APP_SECRET")?,
            verify_token: env::var("WEBHOOK_VERIFY_TOKEN")?,
            fallback_page_token: env::var("FALLBACK_PAGE_TOKEN").ok(),
            graph_api_base: env::var("GRAPH_API_BASE")
                .unwrap_or_else(|_| "https://graph.facebook.com/v18.0".to_string()),
            ai_engine_base: env::var("AI_ENGINE_URL")
                .unwrap_or_else(|_| "http://localhost:9100".to_string()),
            ai_engine_key: env::var("AI_ENGINE_KEY").ok(),
        })
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}
