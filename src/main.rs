//! Dispatch core - AI emergency dispatcher chat service
//!
//! Runs one dispatcher session backed by a generative model and exposes it
//! over HTTP with a live event stream.

mod api;
mod config;
mod context;
mod error;
mod interpreter;
mod llm;
mod message;
mod prompt;
mod report;
mod session;
mod state_machine;

use api::{create_router, AppState};
use config::Config;
use llm::{GeminiService, LlmService, LoggingService};
use session::{LogOnlyNotifier, SessionFactory};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dispatch_core=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    // Configuration; a missing key stops startup here
    let config = Config::from_env()?;
    tracing::info!(?config, "Configuration loaded");

    // Backend client
    let gemini = GeminiService::new(
        config.api_key.clone(),
        &config.model,
        config.base_url.as_deref(),
    )?;
    let llm: Arc<dyn LlmService> = Arc::new(LoggingService::new(Arc::new(gemini)));
    tracing::info!(model = %llm.model_id(), "Backend client initialized");

    // Create application state
    let factory = SessionFactory::new(
        config.session_settings(),
        llm,
        Arc::new(LogOnlyNotifier),
    );
    let state = AppState::new(factory);

    // Create router
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let compression = CompressionLayer::new()
        .gzip(true)
        .br(true)
        .deflate(true)
        .zstd(true);

    let app = create_router(state)
        .layer(cors)
        .layer(compression)
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Dispatch server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
