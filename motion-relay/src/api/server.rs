//! HTTP server setup and routing
//!
//! Routes:
//! - `GET /`        live tag viewer
//! - `GET /health`  liveness
//! - `GET /tags`    published snapshot as JSON
//! - `GET /events`  SSE push channel (`update` events)

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{routing::get, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::error::{Error, Result};
use crate::state::SharedState;

/// Shared application context passed to all handlers
#[derive(Clone)]
pub struct AppContext {
    pub state: Arc<SharedState>,
}

/// Build the router over `state`
pub fn build_router(state: Arc<SharedState>) -> Router {
    let ctx = AppContext { state };

    Router::new()
        .route("/", get(super::handlers::viewer))
        .route("/health", get(super::handlers::health))
        .route("/tags", get(super::handlers::get_tags))
        .route("/events", get(super::sse::event_stream))
        .with_state(ctx)
        .layer(TraceLayer::new_for_http())
        // Enable CORS for dashboards served elsewhere
        .layer(CorsLayer::permissive())
}

/// Serve HTTP until `shutdown` resolves
pub async fn run<F>(bind_addr: &str, port: u16, state: Arc<SharedState>, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr: SocketAddr = format!("{}:{}", bind_addr, port)
        .parse()
        .map_err(|e| Error::Config(format!("Invalid bind address {}:{}: {}", bind_addr, port, e)))?;

    let app = build_router(state);

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
