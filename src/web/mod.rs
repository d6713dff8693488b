//! HTTP server exposing the metrics endpoint for Prometheus scraping.
//!
//! One route that matters (`/metrics`) plus a `/health` probe. The gauge set
//! is the only shared state; its storage is atomic, so the scrape handler
//! needs no coordination with the poll loop.

pub mod config;

pub use config::WebConfig;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use tokio::sync::watch;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

use crate::error::{ExporterError, Result};
use crate::metrics::RoomMetrics;

const OPENMETRICS_CONTENT_TYPE: &str = "application/openmetrics-text; version=1.0.0; charset=utf-8";

/// Application state shared across handlers.
#[derive(Clone)]
struct AppState {
    metrics: Arc<RoomMetrics>,
}

/// Create the HTTP router.
fn create_router(metrics: Arc<RoomMetrics>, enable_cors: bool) -> Router {
    let state = AppState { metrics };

    let mut router = Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_handler));

    if enable_cors {
        router = router.layer(CorsLayer::permissive());
    }

    router.with_state(state)
}

/// Handler for the /metrics endpoint.
async fn metrics_handler(State(state): State<AppState>) -> Response {
    match state.metrics.render() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", OPENMETRICS_CONTENT_TYPE)],
            body,
        )
            .into_response(),
        Err(err) => {
            error!("Failed to encode metrics: {}", err);
            (StatusCode::INTERNAL_SERVER_ERROR, "encoding error\n").into_response()
        }
    }
}

/// Handler for the /health endpoint.
async fn health_handler() -> Response {
    Json(serde_json::json!({ "status": "ok" })).into_response()
}

/// Bind the metrics listener.
///
/// Called before any task is spawned so that an invalid address or an
/// occupied port fails startup instead of leaving the poll loop running
/// against a dead endpoint.
pub async fn bind(config: &WebConfig) -> Result<tokio::net::TcpListener> {
    let addr = config
        .bind_address()
        .parse::<SocketAddr>()
        .map_err(|e| ExporterError::web_server_error(format!("Invalid bind address: {}", e)))?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    Ok(listener)
}

/// Serve the metrics endpoint on a bound listener until the shutdown
/// signal flips.
pub async fn serve(
    listener: tokio::net::TcpListener,
    config: WebConfig,
    metrics: Arc<RoomMetrics>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let router = create_router(metrics, config.enable_cors);

    if let Ok(addr) = listener.local_addr() {
        info!("Metrics endpoint listening on http://{}/metrics", addr);
    }

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            loop {
                if shutdown.changed().await.is_err() {
                    break;
                }
                if *shutdown.borrow() {
                    break;
                }
            }
            info!("Metrics endpoint shutting down");
        })
        .await
        .map_err(|e| ExporterError::web_server_error(format!("Server error: {}", e)))?;

    Ok(())
}
