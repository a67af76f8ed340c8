mod config;
mod errors;
mod evaluation;
mod generation;
mod llm_client;
mod models;
mod parsing;
mod routes;
mod segmentation;
mod state;

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::evaluation::prompts::PromptSet;
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
            EnvFilter::new(format!(
                "{}={}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Interview API v{}", env!("CARGO_PKG_VERSION"));

    // Prompt resources are the one fatal configuration dependency
    let prompts = PromptSet::load(&config.prompts_dir)?;
    info!("Prompts loaded from {}", config.prompts_dir.display());

    // Initialize LLM client
    let llm = LlmClient::new(config.llm.clone()).context("Failed to build LLM HTTP client")?;
    info!(
        "LLM client initialized (provider: {:?}, model: {})",
        config.llm.provider,
        llm.model()
    );

    let state = AppState {
        llm: Arc::new(llm),
        prompts: Arc::new(prompts),
        config: config.clone(),
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
