mod analysis;
mod ats;
mod config;
mod db;
mod errors;
mod llm_client;
mod models;
mod resume;
mod routes;
mod state;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::analysis::manager::{start_scan_worker, AnalysisManager, ScanWorker};
use crate::analysis::sections::RedisSectionCache;
use crate::analysis::store::PgAnalysisStore;
use crate::config::Config;
use crate::db::create_pool;
use crate::llm_client::LlmClient;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting ATS API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL (runs migrations)
    let db = create_pool(&config.database_url).await?;

    // Initialize Redis
    let redis = redis::Client::open(config.redis_url.clone())?;
    let section_cache = Arc::new(RedisSectionCache::new(redis, config.section_cache_ttl_secs));
    info!(
        "Redis section cache initialized (ttl {}s)",
        config.section_cache_ttl_secs
    );

    // Initialize LLM client
    let llm = Arc::new(LlmClient::new(config.anthropic_api_key.clone())?);
    info!("LLM client initialized (model: {})", llm_client::MODEL);

    // Analysis lifecycle: request-side manager + background scan worker
    let store = Arc::new(PgAnalysisStore::new(db.clone()));
    let (analyses, scan_rx) = AnalysisManager::new(store.clone());
    let worker = start_scan_worker(
        Arc::new(ScanWorker {
            store,
            llm: llm.clone(),
            disagreement_threshold: config.score_disagreement_threshold,
        }),
        scan_rx,
    );
    info!(
        "Score disagreement threshold: {} points",
        config.score_disagreement_threshold
    );

    let state = AppState {
        db,
        llm,
        section_cache,
        analyses,
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict origins once the frontend domain is fixed

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // The router (and every queue sender) is gone; let in-flight scans finish.
    info!("Server stopped; draining scan worker");
    worker.await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
    }
}
