//! Chatline Backend
//! Mission: Session & token lifecycle service for the Chatline application

use anyhow::{Context, Result};
use chatline_backend::{
    api::build_router,
    auth::{SessionService, TokenCodec, UserStore},
    config::AppConfig,
};
use dotenv::dotenv;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenv();
    init_tracing();

    let config = AppConfig::from_env();

    let store = Arc::new(UserStore::new(&config.auth_db_path)?);
    let codec = Arc::new(TokenCodec::new(config.tokens.clone()));
    let service = Arc::new(SessionService::new(store.clone(), codec.clone()));

    info!("🔐 Auth store initialized at: {}", config.auth_db_path);

    let app = build_router(service, codec, store, config.default_picture_path.clone());

    let listener = TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    info!("🎯 API server listening on {}", config.bind_addr);

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chatline_backend=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
