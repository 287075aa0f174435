//! Travel agent HTTP Server
//!
//! Axum-based server exposing the travel planning loop over REST.

mod config;
mod handlers;
mod state;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use agent_core::{CancellationToken, LlmProvider};
use agent_runtime::OllamaProvider;

use crate::config::ServerConfig;
use crate::handlers::{health_check, list_models, list_tools, plan_trip_handler, query_handler};
use crate::state::{AppState, build_registry};

/// Routes shared by the binary and the handler tests
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health & info
        .route("/health", get(health_check))
        .route("/api/models", get(list_models))
        .route("/api/tools", get(list_tools))
        // Agent API
        .route("/query", post(query_handler))
        .route("/plan-trip", post(plan_trip_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env()?;

    // Initialize LLM provider
    let provider = Arc::new(OllamaProvider::from_config(config.model.ollama()));

    match provider.health_check().await {
        Ok(true) => {
            tracing::info!("✓ Connected to Ollama at {}", provider.config().url());
            if let Ok(models) = provider.list_models().await {
                for model in models {
                    tracing::info!("  Model: {}", model.id);
                }
            }
        }
        Ok(false) | Err(_) => {
            tracing::warn!("⚠ Ollama not available - answers will be degraded");
            tracing::warn!("  Make sure Ollama is running: ollama serve");
        }
    }

    // Initialize tools
    let clients = config.tools.clients()?;
    let tools = build_registry(&config, &clients)?;

    tracing::info!("Registered {} tools:", tools.len());
    for name in tools.names() {
        tracing::info!("  • {}", name);
    }

    let shutdown = CancellationToken::new();
    let state = AppState::new(&config, provider, tools, shutdown.clone())?;
    let app = router(state);

    // Start server
    let addr = config.bind_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("🚀 travel agent running on http://{}", addr);
    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!(
        model = %config.model.name,
        max_iterations = config.agent.max_iterations,
        request_timeout_secs = config.agent.request_timeout_secs,
        rate_limit = config.rate_limit.max_requests,
        rate_window_secs = config.rate_limit.window_secs,
        "Agent settings"
    );
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health      - Health check");
    tracing::info!("  GET  /api/models  - List available models");
    tracing::info!("  GET  /api/tools   - List registered tools");
    tracing::info!("  POST /query       - Ask a travel question");
    tracing::info!("  POST /plan-trip   - Plan a trip from structured fields");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

/// Resolves on Ctrl-C and cancels every in-flight run
async fn shutdown_signal(token: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested, cancelling in-flight requests");
    token.cancel();
}
