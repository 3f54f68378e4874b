mod categorizer;
mod config;
mod db;
mod deals;
mod delivery;
mod errors;
mod favorites;
mod geo;
mod llm_client;
mod matching;
mod membership;
mod models;
mod routes;
mod state;
mod store;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::categorizer::fallback::{CategoryFallback, LlmCategoryFallback, NoFallback};
use crate::categorizer::{Categorizer, CategoryTable};
use crate::config::{Config, StoreBackend};
use crate::db::create_pool;
use crate::llm_client::LlmClient;
use crate::membership::RetryPolicy;
use crate::routes::build_router;
use crate::state::AppState;
use crate::store::{MemoryStore, PgStore, Store};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting DealShaq API v{}", env!("CARGO_PKG_VERSION"));

    let store = build_store(&config).await?;

    // Keyword table is immutable and shared; the LLM fallback is optional
    let fallback: Arc<dyn CategoryFallback> = match &config.anthropic_api_key {
        Some(key) => {
            let llm = LlmClient::new(key.clone())?;
            info!("LLM category fallback enabled (model: {})", llm_client::MODEL);
            Arc::new(LlmCategoryFallback(llm))
        }
        None => {
            warn!("ANTHROPIC_API_KEY not set; unmatched names resolve to Miscellaneous");
            Arc::new(NoFallback)
        }
    };
    let categorizer = Categorizer::new(Arc::new(CategoryTable::builtin()), fallback);

    let retry = RetryPolicy {
        max_attempts: config.sync_max_attempts,
        base_delay: config.sync_base_delay,
    };
    info!(
        "Mirrored list writes: {} attempts, {}ms base backoff",
        retry.max_attempts,
        retry.base_delay.as_millis()
    );

    let state = AppState::new(store, categorizer, retry, config.live_channel_capacity);

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict origins once the web client's domain is fixed

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn build_store(config: &Config) -> Result<Arc<dyn Store>> {
    match config.store_backend {
        StoreBackend::Postgres => {
            let url = config
                .database_url
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("DATABASE_URL is required for STORE=postgres"))?;
            let pool = create_pool(url).await?;
            Ok(Arc::new(PgStore::new(pool)))
        }
        StoreBackend::Memory => {
            warn!("Using in-memory store; data is lost on restart");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}
