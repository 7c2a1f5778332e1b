mod error;
mod rest;
mod types;

pub use error::{ApiError, ApiResult};
pub use rest::RestApi;
pub use types::*;

use crate::metrics::{metrics_route, MetricsConfig};
use crate::relay::RelayEngine;
use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Create the inbound HTTP server: event intake, liveness, stats and
/// (when enabled) Prometheus metrics
pub fn create_api_server(
    engine: Arc<RelayEngine>,
    auth: InboundAuth,
    metrics: &MetricsConfig,
) -> Router {
    let mut router = RestApi::new(engine, auth).router();
    if metrics.enabled {
        router = router.route(&metrics.endpoint, metrics_route());
    }

    router.layer(TraceLayer::new_for_http())
}
