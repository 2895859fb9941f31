//! HTTP API: landing page, metrics, health and readiness

use crate::collector::CollectionEngine;
use crate::health::ComponentStatus;
use crate::registry::{encode_text, text_content_type, MetricDescriptors};
use crate::snapshot::emit;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use std::sync::Arc;
use tracing::{error, info};

/// Default path for the metrics endpoint
pub const DEFAULT_METRICS_PATH: &str = "/metrics";

/// Default listen address
pub const DEFAULT_LISTEN_ADDRESS: &str = ":9954";

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<CollectionEngine>,
    pub descriptors: Arc<MetricDescriptors>,
    pub metrics_path: String,
}

impl AppState {
    pub fn new(
        engine: Arc<CollectionEngine>,
        descriptors: Arc<MetricDescriptors>,
        metrics_path: impl Into<String>,
    ) -> Self {
        Self {
            engine,
            descriptors,
            metrics_path: metrics_path.into(),
        }
    }
}

/// Static landing page linking to the metrics path
async fn landing(State(state): State<Arc<AppState>>) -> Html<String> {
    Html(format!(
        "<html>
             <head><title>Cmon Exporter</title></head>
             <body>
             <h1>Cmon Exporter</h1>
             <p><a href='{}'>Metrics</a></p>
             </body>
             </html>",
        state.metrics_path
    ))
}

/// Run one collection cycle and expose it together with the exporter's own metrics
async fn metrics(State(state): State<Arc<AppState>>) -> Response {
    let snapshot = state.engine.run_cycle().await;
    let samples = emit(&snapshot);

    let rendered = state.descriptors.render(&samples).and_then(|mut families| {
        families.extend(prometheus::gather());
        encode_text(&families)
    });

    match rendered {
        Ok(buffer) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, text_content_type())],
            buffer,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to render metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("failed to render metrics: {}", e),
            )
                .into_response()
        }
    }
}

/// Health check response - 200 if healthy or degraded, 503 if unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.engine.health().health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy | ComponentStatus::Degraded => StatusCode::OK,
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

/// Readiness check response - 200 once a cycle has completed
async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.engine.health().readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    let metrics_path = state.metrics_path.clone();

    Router::new()
        .route("/", get(landing))
        .route(&metrics_path, get(metrics))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .with_state(state)
}

/// Turn `:9954` style addresses into something bindable
pub fn bind_address(listen_address: &str) -> String {
    if listen_address.starts_with(':') {
        format!("0.0.0.0{}", listen_address)
    } else {
        listen_address.to_string()
    }
}

/// Start the API server; returns only when the listener fails
pub async fn serve(listen_address: &str, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = bind_address(listen_address);
    info!(addr = %addr, "Starting HTTP server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_address() {
        assert_eq!(bind_address(":9954"), "0.0.0.0:9954");
        assert_eq!(bind_address("127.0.0.1:9954"), "127.0.0.1:9954");
        assert_eq!(bind_address("[::1]:9954"), "[::1]:9954");
    }
}
