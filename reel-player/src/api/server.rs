//! HTTP server setup and routing
//!
//! Axum router for the control triggers, preloaded asset serving, dashboard
//! reads and the SSE stream.

use crate::config::DashboardConfig;
use crate::error::{Error, Result};
use crate::gate::PassphraseGate;
use crate::playback::engine::EngineHandle;
use crate::state::SharedState;
use axum::{
    routing::{get, post},
    Router,
};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Shared application context passed to all handlers
#[derive(Clone)]
pub struct AppContext {
    pub state: Arc<SharedState>,
    pub engine: EngineHandle,
    pub gate: Arc<PassphraseGate>,
    pub dashboard: Arc<DashboardConfig>,
}

/// Build the router with all routes attached
pub fn router(ctx: AppContext) -> Router {
    Router::new()
        // Health and build information
        .route("/health", get(super::handlers::health))

        // Engine state and triggers
        .route("/state", get(super::handlers::get_state))
        .route("/auth", post(super::handlers::authenticate))
        .route("/start", post(super::handlers::start))
        .route("/skip", post(super::handlers::skip))
        .route("/advance", post(super::handlers::advance))

        // Preloaded media
        .route("/assets/:id", get(super::handlers::get_asset))

        // Dashboard reads (dashboard stage only)
        .route("/dashboard/summary", get(super::handlers::dashboard_summary))
        .route("/dashboard/search", get(super::handlers::dashboard_search))
        .route("/dashboard/on-this-day", get(super::handlers::dashboard_on_this_day))
        .route("/dashboard/gallery", get(super::handlers::dashboard_gallery))

        // SSE event stream
        .route("/events", get(super::sse::event_stream))

        .with_state(ctx)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
}

/// Serve the API until `shutdown` resolves
pub async fn run(
    port: u16,
    ctx: AppContext,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let app = router(ctx);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| Error::Http(format!("Failed to bind to {}: {}", addr, e)))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| Error::Http(format!("Server error: {}", e)))?;

    Ok(())
}
