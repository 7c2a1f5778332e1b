//! Prometheus metrics exporter
//!
//! The relay serves `/metrics` from its own listener instead of a separate
//! exporter port, so this module only installs the recorder and renders it.

use crate::metrics::recorder::init_metrics;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, MethodRouter};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;

const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

#[derive(Debug, Clone)]
pub struct MetricsConfig {
    /// Install the recorder and mount the route
    pub enabled: bool,

    /// Route path (default: "/metrics")
    pub endpoint: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: "/metrics".to_string(),
        }
    }
}

/// Install the Prometheus recorder as the global `metrics` recorder.
///
/// Idempotent within a process: later calls return the handle installed by
/// the first one.
pub fn install_recorder() -> Result<&'static PrometheusHandle, MetricsError> {
    if let Some(handle) = PROMETHEUS_HANDLE.get() {
        return Ok(handle);
    }

    init_metrics();
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| MetricsError::SetupFailed(e.to_string()))?;

    // Losing a set race leaves the winner's handle in place
    let _ = PROMETHEUS_HANDLE.set(handle);
    PROMETHEUS_HANDLE.get().ok_or(MetricsError::AlreadyInitialized)
}

/// Current exposition text, if the recorder is installed
pub fn render_metrics() -> Option<String> {
    PROMETHEUS_HANDLE.get().map(PrometheusHandle::render)
}

#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    #[error("Failed to install Prometheus recorder: {0}")]
    SetupFailed(String),

    #[error("Prometheus recorder already installed elsewhere")]
    AlreadyInitialized,
}

async fn serve_metrics() -> Response {
    match render_metrics() {
        Some(body) => ([(header::CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE)], body).into_response(),
        None => (StatusCode::SERVICE_UNAVAILABLE, "Metrics recorder not installed").into_response(),
    }
}

/// GET handler for mounting on the relay router
pub fn metrics_route() -> MethodRouter {
    get(serve_metrics)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use axum::Router;
    use tower::ServiceExt;

    #[test]
    fn test_metrics_config_default() {
        let config = MetricsConfig::default();
        assert_eq!(config.endpoint, "/metrics");
        assert!(!config.enabled);
    }

    // The unit test binary never installs the recorder; installation is
    // process-global and covered by tests/integration_test.rs
    #[tokio::test]
    async fn test_route_unavailable_without_recorder() {
        let app = Router::new().route("/metrics", metrics_route());
        let response = app
            .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(render_metrics().is_none());
    }
}
