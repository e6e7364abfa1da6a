use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use recruit_api::backend::BackendClient;
use recruit_api::config::Config;
use recruit_api::pipeline::{PipelineCoordinator, StageCache};
use recruit_api::routes::build_router;
use recruit_api::state::AppState;

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

    info!("Starting recruit API v{}", env!("CARGO_PKG_VERSION"));

    // System-of-record client backs both the pipeline store and conversion flow
    let backend = Arc::new(BackendClient::new(
        &config.backend_url,
        config.backend_token.clone(),
        Duration::from_secs(config.backend_timeout_secs),
    ));
    info!(
        "Backend client initialized ({}; timeout {}s)",
        config.backend_url, config.backend_timeout_secs
    );

    let coordinator = PipelineCoordinator::new(backend.clone(), backend, StageCache::new());
    let state = AppState { coordinator };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict CORS to the CRM front-end origin

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
