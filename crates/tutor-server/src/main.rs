//! ai-tutor HTTP Server
//!
//! Axum-based REST API around the tool-calling orchestrator. Tools are
//! confined to the working directory (`TUTOR_WORKDIR`, default: the process
//! working directory).

mod handlers;
mod state;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tutor_core::{ConfigFile, PromptLibrary, SandboxedFileTool};
use tutor_runtime::{HttpProviderFactory, ProviderSelector};

use crate::handlers::{
    chat_handler, clear_conversation, export_transcript, get_config, get_conversation,
    get_provider, health_check, import_transcript, switch_provider, undo_last, update_config,
};
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health & info
        .route("/health", get(health_check))
        // Conversation turns
        .route("/api/chat", post(chat_handler))
        .route(
            "/api/conversations/{id}",
            get(get_conversation).delete(clear_conversation),
        )
        .route("/api/conversations/{id}/undo", post(undo_last))
        .route(
            "/api/conversations/{id}/transcript",
            get(export_transcript).put(import_transcript),
        )
        // Provider & settings
        .route("/api/provider", get(get_provider).post(switch_provider))
        .route("/api/config", get(get_config).patch(update_config))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment
    dotenvy::dotenv().ok();

    let config = ConfigFile::load_default();
    if let Some(path) = config.path() {
        tracing::info!(path = %path.display(), "Configuration loaded");
    }

    // Sandbox root for the file tools
    let workdir = match std::env::var("TUTOR_WORKDIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(_) => std::env::current_dir().context("cannot determine working directory")?,
    };
    let tools = SandboxedFileTool::new(&workdir)
        .with_context(|| format!("invalid working directory {}", workdir.display()))?
        .into_catalog();
    tracing::info!(root = %workdir.display(), tools = ?tools.names(), "File tools ready");

    // Provider selection; nothing usable is fatal
    let selector = match ProviderSelector::new(Arc::new(HttpProviderFactory::from_env()), config) {
        Ok(selector) => selector,
        Err(e) => {
            tracing::error!(error = %e, "No AI provider available");
            return Err(e.into());
        }
    };
    let active = selector.active();
    tracing::info!(provider = %active.kind, model = %active.provider.model(), "Using provider");

    let prompts_dir = std::env::var("TUTOR_PROMPTS_DIR").unwrap_or_else(|_| "prompts".into());
    let prompts = PromptLibrary::new(prompts_dir);

    let state = AppState::new(selector, tools, prompts);
    let shutdown = state.shutdown.clone();
    let app = router(state);

    // Start server
    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:3000".into());
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("ai-tutor server running on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
            }
            tracing::info!("Shutting down, cancelling in-flight turns");
            shutdown.notify_waiters();
        })
        .await?;

    Ok(())
}
