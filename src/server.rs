use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tower_http::trace::TraceLayer;
// Request spans of the trace layer reach the logger through the `log` feature
use tracing as _;

use crate::exporter::Exporter;
use crate::metrics::exposition;

/// Path of the liveness endpoint
pub const HEALTH_PATH: &str = "/health";

/// Build the HTTP routes serving the metrics at `metrics_path`
pub fn router(exporter: Arc<Exporter>, metrics_path: &str) -> Router {
    Router::new()
        .route(metrics_path, get(metrics))
        .route(HEALTH_PATH, get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(exporter)
}

/// Collect the analytics and render them for Prometheus
async fn metrics(State(exporter): State<Arc<Exporter>>) -> Response {
    let samples = exporter.collect().await;

    match exposition::encode(exporter.descriptors(), &samples) {
        Ok(body) => ([(header::CONTENT_TYPE, exposition::CONTENT_TYPE)], body).into_response(),
        Err(err) => {
            log::error!("Could not encode metrics: {err}");
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response()
        }
    }
}

async fn health() -> &'static str {
    "OK"
}
