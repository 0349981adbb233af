mod assets;
mod error;
mod handlers;

use anyhow::{Context, Result};
use axum::{routing::get, Router};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

use crate::config::Config;
use crate::mirror::MessageMirror;
use crate::store::MessageStore;

/// Shared application state
pub struct AppState {
    pub config: Config,
    pub store: MessageStore,
    /// None when no remote repository is configured.
    pub mirror: Option<Arc<dyn MessageMirror>>,
}

impl AppState {
    pub fn new(config: Config, store: MessageStore, mirror: Option<Arc<dyn MessageMirror>>) -> Self {
        Self {
            config,
            store,
            mirror,
        }
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(assets::index))
        .route("/static/{*path}", get(assets::static_file))
        .route(
            "/messages",
            get(handlers::list_messages).post(handlers::create_message),
        )
        .route("/messages/{id}", get(handlers::get_message))
        .route("/messages/{id}/mirror", get(handlers::get_mirrored_message))
        .route("/health", get(handlers::health))
        .fallback(handlers::not_found)
        .method_not_allowed_fallback(handlers::not_found)
        .with_state(state)
}

/// Serve until Ctrl-C.
pub async fn run(state: Arc<AppState>) -> Result<()> {
    let addr = state.config.server.bind_address.clone();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;

    info!("Server running on http://{}", listener.local_addr()?);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down server...");
        })
        .await
        .context("Server error")?;

    Ok(())
}
