use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use chatdesk::config::AppConfig;
use chatdesk::{create_router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Default to INFO; override with RUST_LOG for debugging.
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "chatdesk=info,tower_http=info,sqlx=warn".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env().await?;

    sqlx::migrate!("./migrations")
        .run(&config.database_pool)
        .await?;

    let addr = config.server_address();
    let app = create_router(AppState::from_config(&config));

    tracing::info!("Starting chatdesk webhook service on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
