//! HTTP server wiring for Streambox.
//!
//! Builds the router over shared [`AppState`] and runs it until ctrl-c, then
//! tears the content engine down so cached content is purged.

use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::routing::{get, post};
use streambox_core::{
    ContentEngineHandle, SettingsStore, StreamboxConfig, SwarmEngine, spawn_content_engine,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{
    end_session, get_settings, health, list_torrents, post_session, reset_settings, status,
    stream_content, torrent_files, update_settings,
};

/// State shared by every request handler.
#[derive(Clone)]
pub struct AppState {
    pub engine: ContentEngineHandle,
    pub settings: Arc<SettingsStore>,
    pub server_started_at: Instant,
}

impl AppState {
    pub fn new(engine: ContentEngineHandle, settings: Arc<SettingsStore>) -> Self {
        Self {
            engine,
            settings,
            server_started_at: Instant::now(),
        }
    }
}

/// Builds the API router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Viewer sessions
        .route("/session", post(post_session).delete(end_session))
        // Streaming
        .route("/stream/{content_hash}", get(stream_content))
        // Status and monitoring
        .route("/status", get(status))
        .route("/torrents", get(list_torrents))
        .route("/torrent/files", post(torrent_files))
        .route("/health", get(health))
        // Runtime settings
        .route(
            "/settings",
            get(get_settings).put(update_settings).delete(reset_settings),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Runs the server until ctrl-c.
///
/// Settings are loaded from `<data_dir>/settings.json`, created with defaults
/// when missing. On shutdown the engine destroys all content and purges its
/// storage before this returns.
///
/// # Errors
/// - Settings file is unreadable or invalid
/// - Bind address is unavailable
pub async fn run_server(
    config: StreamboxConfig,
    swarm: Arc<dyn SwarmEngine>,
) -> Result<(), Box<dyn std::error::Error>> {
    let settings = Arc::new(SettingsStore::open(config.storage.settings_path())?);
    if let Some(path) = settings.path() {
        tracing::info!("Loaded settings from {}", path.display());
    }

    let engine = spawn_content_engine(swarm, Arc::clone(&settings));
    let state = AppState::new(engine.clone(), settings);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(config.server.bind_address).await?;
    tracing::info!("Streambox server running on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("HTTP server stopped, releasing content");
    if let Err(e) = engine.shutdown().await {
        tracing::warn!("Content engine teardown failed: {}", e);
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}
