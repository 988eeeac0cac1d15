//! Enhancement backend proxy.
//!
//! A single stateless route that validates the payload, calls the upstream
//! model with the server-held credential, and relays the first image.

mod handler;

use crate::config::ServerConfig;
use crate::error::Result;
use crate::model::{GeminiEditor, ImageEditor};
use axum::extract::DefaultBodyLimit;
use axum::routing::post;
use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Path of the enhancement route.
pub const ENHANCE_PATH: &str = "/api/enhance";

/// Immutable state shared by all requests.
#[derive(Clone, Default)]
pub struct AppState {
    editor: Option<Arc<dyn ImageEditor>>,
}

impl AppState {
    /// State backed by `editor`.
    pub fn new(editor: Arc<dyn ImageEditor>) -> Self {
        Self {
            editor: Some(editor),
        }
    }

    /// State without a credential; every request fails with a configuration
    /// error.
    pub fn unconfigured() -> Self {
        Self::default()
    }

    /// Builds a Gemini-backed state from `config`.
    pub fn from_config(config: &ServerConfig) -> Result<Self> {
        let Some(api_key) = config.api_key.as_deref() else {
            tracing::warn!("no API key configured; enhancement requests will fail");
            return Ok(Self::unconfigured());
        };

        let editor = GeminiEditor::builder()
            .api_key(api_key)
            .model(config.model)
            .base_url(&config.upstream_url)
            .timeout(config.timeout)
            .build()?;
        Ok(Self::new(Arc::new(editor)))
    }

    /// Returns true when an upstream editor is available.
    pub fn is_configured(&self) -> bool {
        self.editor.is_some()
    }
}

/// Builds the proxy router.
pub fn router(state: AppState, max_body_bytes: usize) -> Router {
    Router::new()
        .route(
            ENHANCE_PATH,
            post(handler::enhance).fallback(handler::method_not_allowed),
        )
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Binds `config.bind` and serves until Ctrl-C.
pub async fn serve(config: ServerConfig) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    serve_on(listener, config, shutdown_signal()).await
}

/// Serves on an already-bound listener until `shutdown` resolves.
pub async fn serve_on<F>(
    listener: tokio::net::TcpListener,
    config: ServerConfig,
    shutdown: F,
) -> Result<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    let state = AppState::from_config(&config)?;
    serve_with_state(listener, state, config.max_body_bytes, shutdown).await
}

/// Serves a prepared state on an already-bound listener.
pub async fn serve_with_state<F>(
    listener: tokio::net::TcpListener,
    state: AppState,
    max_body_bytes: usize,
    shutdown: F,
) -> Result<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    tracing::info!(
        addr = %listener.local_addr()?,
        configured = state.is_configured(),
        "enhancement proxy listening"
    );
    axum::serve(listener, router(state, max_body_bytes))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
